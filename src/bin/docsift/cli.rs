//! CLI mode for document processing.

use crate::config::ProcessConfig;
use docsift::domain::DocumentResult;
use std::path::Path;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Process a local file (PDF or image).
pub async fn process_file(
    path: &Path,
    config: &ProcessConfig,
    output_format: &str,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let start = Instant::now();

    let bytes = tokio::fs::read(path).await?;
    info!(
        bytes = bytes.len(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "read input file"
    );
    let options = config.load_options()?;

    info!("Initializing pipeline...");
    let pipeline = config.build_pipeline()?;
    info!(
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "pipeline initialized"
    );

    let process_start = Instant::now();
    let result = tokio::task::spawn_blocking(move || {
        pipeline.process_with_cancel(&bytes, &options, &cancel)
    })
    .await??;
    let processing_time_ms = process_start.elapsed().as_secs_f64() * 1000.0;

    if !result.is_complete() {
        warn!(
            failures = result.errors.len(),
            "document processed with failures"
        );
    }
    output_result(&result, output_format, processing_time_ms)
}

/// Output the result in the specified format.
fn output_result(
    result: &DocumentResult,
    format: &str,
    processing_time_ms: f64,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string(result)?);
        }
        "text" => {
            println!("{}", result.full_text());
        }
        _ => {
            println!("\n=== Document Results ===");
            println!("Document: {}", result.document_id);
            println!("Status: {:?}", result.status);
            println!("Pages: {}", result.page_count);
            println!("Processing time: {:.2}ms", processing_time_ms);
            println!("Regions: {}", result.regions.len());

            for page in 0..result.page_count {
                println!("\n========== Page {} ==========", page + 1);
                let mut any = false;
                for entry in result.page_regions(page) {
                    any = true;
                    let region = &entry.region;
                    println!(
                        "[{}] {} ({:.1}%) [{:.1}, {:.1}] - [{:.1}, {:.1}]",
                        region.id,
                        region.class,
                        region.confidence * 100.0,
                        region.bbox.x0,
                        region.bbox.y0,
                        region.bbox.x1,
                        region.bbox.y1
                    );
                    match entry.error {
                        Some(kind) => println!("    <{}>", kind),
                        None => println!(
                            "    \"{}\" ({:.1}%)",
                            entry.text.text,
                            entry.text.confidence * 100.0
                        ),
                    }
                }
                if !any {
                    println!("No regions on this page.");
                }
            }

            if !result.errors.is_empty() {
                println!("\n--- Failures ---");
                for failure in &result.errors {
                    let target = match failure.region_id {
                        Some(id) => format!("page {} region {}", failure.page_index + 1, id),
                        None => format!("page {}", failure.page_index + 1),
                    };
                    println!(
                        "{}: {} after {} attempt(s): {}",
                        target, failure.kind, failure.attempts, failure.message
                    );
                }
            }

            println!("\n--- Full Text ---");
            println!("{}", result.full_text());
        }
    }

    Ok(())
}
