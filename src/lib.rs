//! Prescription verification service.
//!
//! Accepts an uploaded document (image or PDF), extracts its text with
//! OCR, and applies a keyword heuristic to decide whether the text looks
//! like a medical prescription.

pub mod classifier;
pub mod commands;
pub mod extract;
pub mod ocr;
pub mod prelude;
pub mod rasterize;
pub mod server;

use tokio::net::TcpListener;

use crate::{
    prelude::*,
    server::{create_router, state::AppState},
};

/// Serve the API on `listener` until the process is stopped.
pub async fn run(listener: TcpListener, state: AppState) -> Result<()> {
    let app = create_router(state);
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
