//! Shared application state.

use std::sync::Arc;

use crate::extract::Extractor;

/// State shared by all request handlers. The extractor owns the one
/// process-wide OCR engine; everything else is request-scoped.
#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<Extractor>,
}

impl AppState {
    pub fn new(extractor: Extractor) -> Self {
        Self {
            extractor: Arc::new(extractor),
        }
    }
}
