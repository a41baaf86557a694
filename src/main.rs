use std::str::FromStr;

use clap::Parser;
use rxverify::{
    extract::{ExtractOptions, Extractor},
    ocr::tesseract::TesseractOcrEngine,
    prelude::*,
    server::state::AppState,
};
use tokio::net::TcpListener;
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

/// Serve the prescription verification API.
///
/// Requires the `tesseract` and Poppler (`pdftocairo`, `pdfinfo`) CLI
/// tools on the PATH.
#[derive(Debug, Parser)]
#[clap(version)]
struct Opts {
    /// The port to listen on.
    #[clap(long, default_value = "6000")]
    port: u16,

    /// The tesseract language to OCR with.
    #[clap(long, default_value = "eng")]
    lang: String,

    /// The DPI to use when rasterizing PDF pages.
    #[clap(long, default_value = "300")]
    rasterize_dpi: u32,
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing.
    let directive =
        Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_filter(env_filter);

    // We can stack multiple layers here if we need to.
    tracing_subscriber::registry().with(subscriber).init();

    // Call our real `main` function now that logging is set up.
    real_main().await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main() -> Result<()> {
    // Load environment variables from a `.env` file, if it exists.
    dotenvy::dotenv().ok();

    // Parse command-line arguments.
    let opts = Opts::parse();
    debug!("Parsed options: {:?}", opts);

    // The OCR engine is constructed once and shared by all requests.
    let engine = TesseractOcrEngine::new(&opts.lang);
    let extractor = Extractor::new(
        engine,
        ExtractOptions {
            rasterize_dpi: opts.rasterize_dpi,
            scratch_dir: None,
        },
    );
    let state = AppState::new(extractor);

    let listener = TcpListener::bind(("0.0.0.0", opts.port))
        .await
        .with_context(|| format!("failed to bind port {}", opts.port))?;
    rxverify::run(listener, state).await
}
