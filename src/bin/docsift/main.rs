//! docsift CLI
//!
//! Runs region detection and OCR over a PDF or image.
//!
//! # Usage
//!
//! ```bash
//! docsift process --file statement.pdf --detector-model models/layout.onnx
//! docsift process --file scan.png --detector-model models/layout.onnx --options options.json --output json
//! ```

mod cli;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "docsift")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Document region detection and OCR", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a single document
    Process {
        /// Local path of the PDF or image to process
        #[arg(long)]
        file: PathBuf,

        /// Path to the layout detection model
        #[arg(long = "detector-model", env = "DOCSIFT_DETECTOR_MODEL")]
        detector_model: PathBuf,

        /// JSON file with pipeline options
        #[arg(long, env = "DOCSIFT_OPTIONS")]
        options: Option<PathBuf>,

        /// OCR languages, overriding the options file (e.g. eng,fra)
        #[arg(long, value_delimiter = ',', env = "DOCSIFT_LANGUAGES")]
        languages: Option<Vec<String>>,

        /// Tesseract binary
        #[arg(long, default_value = "tesseract", env = "DOCSIFT_TESSERACT")]
        tesseract: PathBuf,

        /// Output format (json, text, pretty)
        #[arg(long, default_value = "pretty")]
        output: String,

        /// Device for the detector (cpu, cuda, cuda:0, etc.)
        #[arg(long, default_value = "cpu", env = "DOCSIFT_DEVICE")]
        device: String,

        /// Pages detected in parallel (defaults to number of CPUs)
        #[arg(long, env = "DOCSIFT_PAGE_WORKERS")]
        page_workers: Option<usize>,

        /// Regions recognized in parallel (defaults to number of CPUs)
        #[arg(long, env = "DOCSIFT_OCR_WORKERS")]
        ocr_workers: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    docsift::utils::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            file,
            detector_model,
            options,
            languages,
            tesseract,
            output,
            device,
            page_workers,
            ocr_workers,
        } => {
            let config = config::ProcessConfig {
                detector_model,
                options_file: options,
                languages,
                tesseract,
                device,
                page_workers,
                ocr_workers,
            };

            let cancel = CancellationToken::new();
            tokio::spawn(shutdown_signal(cancel.clone()));

            info!("Processing file: {}", file.display());
            cli::process_file(&file, &config, &output, cancel).await?;
        }
    }

    Ok(())
}

/// Cancels the pipeline on Ctrl-C; work already running is allowed to finish.
async fn shutdown_signal(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("Interrupt received, cancelling remaining work");
        cancel.cancel();
    }
}
