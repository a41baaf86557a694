//! PDF page rasterization, using Poppler's `pdftocairo` CLI tool.

use std::collections::BTreeMap;

use anyhow::anyhow;
use tokio::process::Command;

use crate::{
    commands::{check_for_command_failure, with_cpu_semaphore},
    prelude::*,
};

/// The pages of a rasterized PDF, as PNG files in page order.
///
/// The backing temporary directory is deleted when this value is dropped,
/// so page images never outlive the request that produced them.
pub struct RasterizedPdf {
    /// Holds the PNG files. Deleted by [`Drop`].
    #[allow(dead_code)]
    tmpdir: tempfile::TempDir,
    /// Paths to the page PNGs, sorted into page order.
    pages: Vec<PathBuf>,
}

impl RasterizedPdf {
    /// Paths to the page images, in page order.
    pub fn page_paths(&self) -> &[PathBuf] {
        &self.pages
    }
}

/// Rasterize every page of the PDF at `path` to a PNG at the given DPI.
///
/// Page images go into a new temporary directory under `scratch_dir`, or
/// under the system temporary directory when `scratch_dir` is `None`.
#[instrument(level = "debug", skip_all, fields(path = %path.display(), dpi))]
pub async fn rasterize_pdf(
    path: &Path,
    dpi: u32,
    scratch_dir: Option<&Path>,
) -> Result<RasterizedPdf> {
    // Count the number of pages in the PDF, so we can sanity-check the
    // rasterizer output below.
    let total_pages = pdf_page_count(path).await?;

    // Create a temporary directory to hold the PNG files. pdftocairo adds
    // zero-padded page digits to the output name, so a lexical sort of the
    // directory recovers page order.
    let tmpdir = match scratch_dir {
        Some(dir) => tempfile::TempDir::with_prefix_in("rasterized-pages", dir)?,
        None => tempfile::TempDir::with_prefix("rasterized-pages")?,
    };
    let out_path = tmpdir.path().join("page");

    // Run pdftocairo, holding a CPU permit so concurrent requests can't
    // fork an unbounded number of rasterizers.
    let output = with_cpu_semaphore(|| async {
        Command::new("pdftocairo")
            .arg("-png")
            .arg("-r")
            .arg(dpi.to_string())
            .arg(path)
            .arg(&out_path)
            .output()
            .await
            .with_context(|| format!("failed to run pdftocairo on {:?}", path.display()))
    })
    .await?;
    check_for_command_failure("pdftocairo", &output, true)?;

    // Collect the PNG files in page order.
    let mut pages = tmpdir
        .path()
        .read_dir()
        .with_context(|| {
            format!(
                "failed to read temporary directory {:?}",
                tmpdir.path().display()
            )
        })?
        .map(|entry| {
            let entry = entry.with_context(|| {
                format!(
                    "failed to read entry in temporary directory {:?}",
                    tmpdir.path().display()
                )
            })?;
            Ok(entry.path())
        })
        .collect::<Result<Vec<_>>>()?;
    pages.sort();

    if pages.len() != total_pages {
        warn!(
            expected = total_pages,
            actual = pages.len(),
            "pdftocairo produced an unexpected number of pages"
        );
    }
    Ok(RasterizedPdf { tmpdir, pages })
}

/// Get the number of pages in a PDF file, using `pdfinfo`.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn pdf_page_count(path: &Path) -> Result<usize> {
    let output = Command::new("pdfinfo")
        .arg(path)
        .output()
        .await
        .with_context(|| format!("failed to run pdfinfo on {:?}", path.display()))?;
    check_for_command_failure("pdfinfo", &output, false)?;

    // pdfinfo prints "Key: value" lines.
    let output =
        String::from_utf8(output.stdout).context("pdfinfo output was not valid UTF-8")?;
    let mut properties = BTreeMap::new();
    for line in output.lines() {
        let mut parts = line.splitn(2, ':');
        let key = parts.next().unwrap_or("").trim();
        let value = parts.next().unwrap_or("").trim();
        properties.insert(key.to_string(), value.to_string());
    }

    let page_count_str = properties
        .get("Pages")
        .ok_or_else(|| anyhow!("failed to find page count in pdfinfo output"))?;
    page_count_str.parse::<usize>().with_context(|| {
        format!(
            "failed to parse page count for {:?} from pdfinfo output",
            path.display()
        )
    })
}
