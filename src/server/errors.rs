//! Conversion of internal failures into caller-visible responses.

use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

/// Everything that can go wrong while handling a verification request.
///
/// The handler is the sole boundary where these become HTTP responses;
/// the extraction pipeline below it speaks plain [`anyhow::Result`].
pub enum AppError {
    /// The request had no `prescription` field.
    NoFileUploaded,
    /// The upload was not an image or a PDF, or OCR recognized nothing.
    NoTextExtracted,
    /// The multipart body could not be decoded.
    InvalidMultipart(MultipartError),
    /// An unexpected internal failure, e.g. from OCR or rasterization.
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::InvalidMultipart(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status_code, error_message) = match self {
            AppError::NoFileUploaded => {
                (StatusCode::BAD_REQUEST, "No file uploaded".to_string())
            }
            AppError::NoTextExtracted => {
                (StatusCode::BAD_REQUEST, "Unable to extract text".to_string())
            }
            AppError::InvalidMultipart(err) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid multipart request: {err}"),
            ),
            AppError::Internal(err) => {
                // Log the full error chain for debugging.
                error!("Internal server error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
            }
        };

        let body = Json(json!({
            "verified": false,
            "error": error_message,
        }));
        (status_code, body).into_response()
    }
}
