//! The document-to-text extraction pipeline.
//!
//! Given an uploaded document, figure out what it is, turn it into one
//! page image per page, OCR each page, and concatenate the results in
//! page order.

use std::{io::Cursor, io::Write as _, sync::Arc};

use image::{DynamicImage, ImageFormat};

use crate::{
    ocr::{OcrEngine, PageImage},
    prelude::*,
    rasterize::rasterize_pdf,
};

/// How many leading bytes we hand to the MIME sniffer. Signature-based
/// detection only needs a small prefix.
const SNIFF_PREFIX_LEN: usize = 2048;

/// Resolve a document's MIME type.
///
/// We prefer sniffing the content itself; the caller-declared type is only
/// a fallback for formats the sniffer doesn't know. Returns `None` when
/// neither source gives us an answer.
pub fn detect_mime_type(data: &[u8], declared: Option<&str>) -> Option<String> {
    let prefix = &data[..data.len().min(SNIFF_PREFIX_LEN)];
    infer::get(prefix)
        .map(|kind| kind.mime_type().to_owned())
        .or_else(|| declared.map(str::to_owned))
}

/// Options for the extraction pipeline.
#[derive(Clone, Debug)]
pub struct ExtractOptions {
    /// The DPI to use when rasterizing PDF pages. 300 balances OCR
    /// accuracy against processing time and memory.
    pub rasterize_dpi: u32,
    /// Parent directory for per-request scratch files. Defaults to the
    /// system temporary directory.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            rasterize_dpi: 300,
            scratch_dir: None,
        }
    }
}

/// The extraction pipeline. One of these is built at startup and shared by
/// every request; all per-request state lives on the stack or in
/// per-request scratch files.
pub struct Extractor {
    /// Our shared OCR engine.
    engine: Arc<dyn OcrEngine>,
    options: ExtractOptions,
}

impl Extractor {
    /// Create a new extractor around the given OCR engine.
    pub fn new(engine: Arc<dyn OcrEngine>, options: ExtractOptions) -> Self {
        Self { engine, options }
    }

    /// Extract the text of an uploaded document.
    ///
    /// Returns `Ok(None)` when the document is not an image or a PDF; this
    /// is a normal outcome for malformed or irrelevant uploads, distinct
    /// from `Ok(Some(""))`, which means OCR ran and recognized nothing.
    /// OCR and rasterization faults propagate as errors.
    #[instrument(level = "debug", skip_all, fields(size = data.len()))]
    pub async fn extract_text(
        &self,
        data: &[u8],
        declared_mime: Option<&str>,
    ) -> Result<Option<String>> {
        let Some(mime_type) = detect_mime_type(data, declared_mime) else {
            debug!("could not determine a content type");
            return Ok(None);
        };

        let text = if mime_type.starts_with("image/") {
            self.extract_from_image(data.to_vec()).await?
        } else if mime_type == "application/pdf" {
            self.extract_from_pdf(data).await?
        } else {
            debug!(mime_type, "unsupported content type");
            return Ok(None);
        };
        Ok(Some(text.trim().to_owned()))
    }

    /// OCR a single uploaded image.
    async fn extract_from_image(&self, data: Vec<u8>) -> Result<String> {
        // Decoding and re-encoding is CPU-bound, so keep it off the
        // async worker threads.
        let page = tokio::task::spawn_blocking(move || normalize_image(&data))
            .await
            .context("image normalization task failed")??;
        self.ocr_page_text(&page).await
    }

    /// Rasterize a PDF and OCR every page, in page order.
    async fn extract_from_pdf(&self, data: &[u8]) -> Result<String> {
        // pdftocairo works on a named file, not a byte stream, so stage
        // the upload in a uniquely named scratch file. The file and the
        // rasterizer's page directory are both deleted on drop, on every
        // exit path.
        let mut builder = tempfile::Builder::new();
        builder.prefix("prescription").suffix(".pdf");
        let mut scratch = match &self.options.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .context("cannot create scratch file for PDF")?;
        scratch
            .write_all(data)
            .context("cannot write scratch file for PDF")?;
        scratch
            .flush()
            .context("cannot flush scratch file for PDF")?;

        let rasterized = rasterize_pdf(
            scratch.path(),
            self.options.rasterize_dpi,
            self.options.scratch_dir.as_deref(),
        )
        .await?;
        let mut page_texts = vec![];
        for path in rasterized.page_paths() {
            let data = tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read page image {:?}", path.display()))?;
            let page = PageImage {
                mime_type: "image/png".to_owned(),
                data,
            };
            page_texts.push(self.ocr_page_text(&page).await?);
        }
        Ok(page_texts.join(" "))
    }

    /// OCR one page and join the recognized lines with single spaces.
    async fn ocr_page_text(&self, page: &PageImage) -> Result<String> {
        let lines = self.engine.ocr_page(page).await?;
        Ok(lines
            .into_iter()
            .map(|line| line.text)
            .collect::<Vec<_>>()
            .join(" "))
    }
}

/// Decode an image and flatten it to plain 3-channel RGB, re-encoded as
/// PNG for the OCR engine. Alpha, grayscale, and palette images all come
/// out the same way.
fn normalize_image(data: &[u8]) -> Result<PageImage> {
    let decoded = image::load_from_memory(data).context("failed to decode image")?;
    let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());
    let mut png = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .context("failed to encode normalized page image")?;
    Ok(PageImage {
        mime_type: "image/png".to_owned(),
        data: png,
    })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use crate::ocr::RecognizedLine;

    use super::*;

    /// An OCR engine that returns a fixed set of lines.
    struct FixedLinesEngine {
        lines: Vec<&'static str>,
    }

    #[async_trait]
    impl OcrEngine for FixedLinesEngine {
        async fn ocr_page(&self, _page: &PageImage) -> Result<Vec<RecognizedLine>> {
            Ok(self
                .lines
                .iter()
                .map(|text| RecognizedLine {
                    text: (*text).to_owned(),
                    confidence: Some(90.0),
                })
                .collect())
        }
    }

    fn tiny_png() -> Vec<u8> {
        let image = DynamicImage::ImageRgba8(image::RgbaImage::new(4, 4));
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        png
    }

    #[test]
    fn sniffing_beats_the_declared_type() {
        let png = tiny_png();
        assert_eq!(
            detect_mime_type(&png, Some("application/octet-stream")),
            Some("image/png".to_owned())
        );
        assert_eq!(
            detect_mime_type(b"%PDF-1.4\n...", None),
            Some("application/pdf".to_owned())
        );
    }

    #[test]
    fn declared_type_is_a_fallback() {
        assert_eq!(
            detect_mime_type(b"just some text", Some("text/plain")),
            Some("text/plain".to_owned())
        );
        assert_eq!(detect_mime_type(b"just some text", None), None);
    }

    #[tokio::test]
    async fn image_text_joins_recognized_lines() {
        let engine = Arc::new(FixedLinesEngine {
            lines: vec!["Rx", "Amoxicillin 500mg"],
        });
        let extractor = Extractor::new(engine, ExtractOptions::default());
        let text = extractor.extract_text(&tiny_png(), None).await.unwrap();
        assert_eq!(text.as_deref(), Some("Rx Amoxicillin 500mg"));
    }

    #[tokio::test]
    async fn bmp_and_tiff_uploads_are_decoded() {
        // BMP and TIFF are part of the image family the service accepts,
        // even though rasterized PDF pages are always PNG.
        for format in [ImageFormat::Bmp, ImageFormat::Tiff] {
            let image = DynamicImage::ImageRgb8(image::RgbImage::new(4, 4));
            let mut data = Vec::new();
            image.write_to(&mut Cursor::new(&mut data), format).unwrap();

            let mime = detect_mime_type(&data, None).unwrap();
            assert!(mime.starts_with("image/"), "sniffed {mime} for {format:?}");

            let engine = Arc::new(FixedLinesEngine {
                lines: vec!["Rx", "500mg"],
            });
            let extractor = Extractor::new(engine, ExtractOptions::default());
            let text = extractor.extract_text(&data, None).await.unwrap();
            assert_eq!(text.as_deref(), Some("Rx 500mg"), "for {format:?}");
        }
    }

    #[tokio::test]
    async fn unsupported_types_signal_no_text() {
        let engine = Arc::new(FixedLinesEngine { lines: vec!["Rx"] });
        let extractor = Extractor::new(engine, ExtractOptions::default());
        let text = extractor
            .extract_text(b"hello world", Some("text/plain"))
            .await
            .unwrap();
        assert_eq!(text, None);

        // Undetectable types behave the same way.
        let engine = Arc::new(FixedLinesEngine { lines: vec![] });
        let extractor = Extractor::new(engine, ExtractOptions::default());
        let text = extractor.extract_text(b"\x00\x01\x02", None).await.unwrap();
        assert_eq!(text, None);
    }

    #[tokio::test]
    async fn recognizing_nothing_yields_empty_text() {
        let engine = Arc::new(FixedLinesEngine { lines: vec![] });
        let extractor = Extractor::new(engine, ExtractOptions::default());
        let text = extractor.extract_text(&tiny_png(), None).await.unwrap();
        assert_eq!(text.as_deref(), Some(""));
    }
}
