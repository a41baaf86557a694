//! OCR engine interface.
//!
//! The OCR engine is an external capability: given an encoded page image,
//! produce an ordered sequence of recognized text lines. One engine value
//! is constructed at process startup and shared between all requests
//! behind an `Arc`. The subprocess-based [`tesseract::TesseractOcrEngine`]
//! is safe for concurrent callers because every invocation runs in a fresh
//! process with a private scratch directory; an engine wrapping a stateful
//! in-process API must add its own locking behind this trait.

use async_trait::async_trait;

use crate::prelude::*;

pub mod tesseract;

/// An encoded in-memory page image, ready for OCR. One per page of a PDF,
/// or one total for a direct image upload.
#[derive(Debug)]
pub struct PageImage {
    /// The MIME type of `data`.
    pub mime_type: String,
    /// The encoded image bytes.
    pub data: Vec<u8>,
}

/// A single line of text recognized on a page, in reading order.
#[derive(Clone, Debug)]
pub struct RecognizedLine {
    /// The recognized text.
    pub text: String,
    /// Mean word confidence for this line, 0-100, if the engine reports
    /// one. Unused by the verification pipeline, but cheap to carry.
    pub confidence: Option<f32>,
}

/// Interface to an OCR engine.
#[async_trait]
pub trait OcrEngine: Send + Sync + 'static {
    /// OCR a single page, returning recognized lines in reading order.
    async fn ocr_page(&self, page: &PageImage) -> Result<Vec<RecognizedLine>>;
}
