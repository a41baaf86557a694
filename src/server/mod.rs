//! HTTP plumbing around the extraction pipeline and the classifier.

pub mod errors;
pub mod handlers;
pub mod state;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use self::state::AppState;

/// The largest upload we accept, in bytes.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/verify",
            post(handlers::verify_prescription)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
