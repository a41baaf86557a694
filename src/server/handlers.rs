//! Request handlers.

use axum::{
    Json,
    extract::{Multipart, State},
};
use serde::Serialize;

use crate::{classifier, prelude::*};

use super::{errors::AppError, state::AppState};

/// The multipart field name carrying the uploaded document.
const UPLOAD_FIELD: &str = "prescription";

/// A successful verification response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// Did the extracted text look like a prescription?
    pub verified: bool,
    /// The full text we extracted.
    pub extracted_text: String,
}

/// Basic health check.
pub async fn health_check() -> &'static str {
    "OK"
}

/// `POST /verify`: OCR the uploaded document and classify the text.
#[instrument(level = "debug", skip_all)]
pub async fn verify_prescription(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<VerifyResponse>, AppError> {
    // Find the document field. Other fields are ignored.
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(UPLOAD_FIELD) {
            let declared_mime = field.content_type().map(str::to_owned);
            let data = field.bytes().await?;
            upload = Some((data, declared_mime));
            break;
        }
    }
    let Some((data, declared_mime)) = upload else {
        return Err(AppError::NoFileUploaded);
    };

    let text = state
        .extractor
        .extract_text(&data, declared_mime.as_deref())
        .await?;
    let text = match text {
        Some(text) if !text.is_empty() => text,
        // "Unsupported file type" and "OCR found nothing" both surface as
        // the same client error, matching the API contract.
        _ => return Err(AppError::NoTextExtracted),
    };

    let verified = match classifier::matching_rule(&text) {
        Some(rule) => {
            debug!(rule, "prescription marker found");
            true
        }
        None => false,
    };
    Ok(Json(VerifyResponse {
        verified,
        extracted_text: text,
    }))
}
