use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod engine;
mod engines;
mod error;
mod layout;
mod preprocessing;
mod server;
mod session;
mod upload;

#[derive(Parser, Debug)]
#[command(name = "image-to-text-server")]
#[command(about = "Convert uploaded images into editable text")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "OCR_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "OCR_PORT", default_value = "9292")]
    pub port: u16,

    /// Maximum upload size in bytes (default: 5MB)
    #[arg(long, env = "OCR_MAX_FILE_SIZE", default_value_t = upload::MAX_UPLOAD_BYTES)]
    pub max_file_size: usize,

    /// OCR engine to use ("ocrs", "leptess"); defaults to the first compiled-in engine
    #[arg(long, env = "OCR_ENGINE")]
    pub engine: Option<String>,

    /// Recognition language (e.g., "eng", "deu", "fra")
    #[arg(long, env = "OCR_LANGUAGE", default_value = "eng")]
    pub language: String,

    /// Page segmentation mode passed through to the engine (3 = fully automatic)
    #[arg(long, env = "OCR_PAGE_SEG_MODE", default_value = "3")]
    pub page_seg_mode: u32,

    /// Keep runs of spaces between words in recognized text
    #[arg(
        long,
        env = "OCR_PRESERVE_INTERWORD_SPACES",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub preserve_interword_spaces: bool,

    /// Default preprocessing preset (none, minimal, default, aggressive)
    #[arg(long, env = "OCR_PREPROCESS", default_value = "default")]
    pub preprocess: String,

    /// Initialize the OCR engine at startup instead of on the first request
    #[arg(long, env = "OCR_WARM_UP")]
    pub warm_up: bool,

    /// Path to tessdata directory (uses TESSDATA_PREFIX env var if not set)
    #[arg(long, env = "TESSDATA_PREFIX")]
    pub tessdata_path: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::try_from(args)?;

    tracing::info!(
        "Starting image-to-text-server v{}",
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!("Binding to {}:{}", config.host, config.port);

    server::run(config).await
}
