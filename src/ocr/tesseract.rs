//! OCR engine wrapping the `tesseract` CLI tool.

use std::{fs, io::Write as _, sync::Arc};

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::process::Command;

use crate::{
    commands::{check_for_command_failure, with_cpu_semaphore},
    prelude::*,
};

use super::{OcrEngine, PageImage, RecognizedLine};

/// OCR engine shelling out to the `tesseract` CLI tool.
///
/// We ask for TSV output, which gives us per-word confidences and the
/// block/paragraph/line structure we need to reassemble recognized lines.
/// Page segmentation mode 1 enables orientation and script detection, so
/// rotated scans still come out readable.
pub struct TesseractOcrEngine {
    /// The tesseract language code, e.g. `eng`. Fixed at startup.
    lang: String,
}

impl TesseractOcrEngine {
    /// Create a new `tesseract` engine for the given language.
    pub fn new(lang: &str) -> Arc<dyn OcrEngine> {
        Arc::new(Self {
            lang: lang.to_owned(),
        })
    }
}

#[async_trait]
impl OcrEngine for TesseractOcrEngine {
    #[instrument(level = "debug", skip_all, fields(mime_type = %page.mime_type))]
    async fn ocr_page(&self, page: &PageImage) -> Result<Vec<RecognizedLine>> {
        let extension = mime_guess::get_mime_extensions_str(&page.mime_type)
            .and_then(|extensions| extensions.first())
            .ok_or_else(|| {
                anyhow!("cannot determine extension for {}", page.mime_type)
            })?;

        // Write our input to a temporary file. The directory name is unique
        // per invocation, so concurrent requests cannot collide.
        let tmpdir = tempfile::TempDir::with_prefix("tesseract")?;
        let input_path = tmpdir.path().join(format!("input.{}", extension));
        let output_base = tmpdir.path().join("output");
        let mut input_file =
            fs::File::create(&input_path).context("cannot create tesseract input file")?;
        input_file
            .write_all(&page.data)
            .context("cannot write tesseract input file")?;
        input_file
            .flush()
            .context("cannot flush tesseract input file")?;

        // Run tesseract on the input file, holding a CPU permit.
        let output = with_cpu_semaphore(|| async {
            Command::new("tesseract")
                .arg(&input_path)
                .arg(&output_base)
                .arg("-l")
                .arg(&self.lang)
                .arg("--psm")
                .arg("1")
                .arg("tsv")
                .output()
                .await
                .context("cannot run tesseract")
        })
        .await?;
        check_for_command_failure("tesseract", &output, false)?;

        // Read and parse the TSV output.
        let tsv = fs::read_to_string(output_base.with_extension("tsv"))
            .context("cannot read tesseract output file")?;
        Ok(parse_tsv(&tsv))
    }
}

/// Reassemble tesseract's per-word TSV rows into recognized lines.
///
/// TSV columns are: level, page_num, block_num, par_num, line_num,
/// word_num, left, top, width, height, conf, text. Words carry level 5;
/// consecutive words sharing (page, block, paragraph, line) numbers belong
/// to the same line.
fn parse_tsv(tsv: &str) -> Vec<RecognizedLine> {
    let mut lines: Vec<RecognizedLine> = vec![];
    let mut current_key: Option<[u32; 4]> = None;
    let mut words: Vec<String> = vec![];
    let mut confidences: Vec<f32> = vec![];

    let mut flush =
        |words: &mut Vec<String>, confidences: &mut Vec<f32>| {
            if !words.is_empty() {
                let confidence = if confidences.is_empty() {
                    None
                } else {
                    Some(confidences.iter().sum::<f32>() / confidences.len() as f32)
                };
                lines.push(RecognizedLine {
                    text: words.join(" "),
                    confidence,
                });
                words.clear();
                confidences.clear();
            }
        };

    for row in tsv.lines().skip(1) {
        let fields = row.split('\t').collect::<Vec<_>>();
        if fields.len() < 12 || fields[0] != "5" {
            continue;
        }
        let text = fields[11].trim();
        if text.is_empty() {
            continue;
        }
        let mut key = [0u32; 4];
        for (slot, field) in key.iter_mut().zip(&fields[1..5]) {
            *slot = field.parse().unwrap_or(0);
        }
        if current_key != Some(key) {
            flush(&mut words, &mut confidences);
            current_key = Some(key);
        }
        words.push(text.to_owned());
        if let Ok(conf) = fields[10].parse::<f32>()
            && conf >= 0.0
        {
            confidences.push(conf);
        }
    }
    flush(&mut words, &mut confidences);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A TSV fragment in the shape tesseract actually emits, covering two
    /// lines in the same paragraph plus a non-word structural row.
    const SAMPLE_TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
4\t1\t1\t1\t1\t0\t10\t10\t200\t20\t-1\t\n\
5\t1\t1\t1\t1\t1\t10\t10\t40\t20\t96.5\tTake\n\
5\t1\t1\t1\t1\t2\t60\t10\t40\t20\t93.5\tonce\n\
5\t1\t1\t1\t2\t1\t10\t40\t40\t20\t88.0\tdaily\n";

    #[test]
    fn words_are_grouped_into_lines() {
        let lines = parse_tsv(SAMPLE_TSV);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "Take once");
        assert_eq!(lines[0].confidence, Some(95.0));
        assert_eq!(lines[1].text, "daily");
    }

    #[test]
    fn empty_tsv_yields_no_lines() {
        assert!(parse_tsv("").is_empty());
        // Header only.
        assert!(parse_tsv("level\tpage_num\n").is_empty());
    }
}
