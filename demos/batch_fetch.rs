//! Fetch a list of items in adaptive batches and write one zip per batch
//!
//! Usage: cargo run --example batch_fetch -- items.json [output_dir]
//!
//! `items.json` is an array of `{"id", "title", "published_at", "url"}` objects. Set
//! `AUTOBATCH_CONFIG` to a JSON file to override the default `BatchConfig`, and `RUST_LOG` to
//! control log output. Ctrl-C cancels the run after the current batch.

use std::sync::Arc;

use autobatch::{
    BatchConfig, BatchRunner, ConfigOverrides, Event, HttpFetcher, WorkItem, ZipPackager,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("autobatch=info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let items_path = args.next().ok_or("usage: batch_fetch <items.json> [output_dir]")?;
    let output_dir = args.next().unwrap_or_else(|| "archives".to_string());

    let items: Vec<WorkItem> = serde_json::from_str(&std::fs::read_to_string(&items_path)?)?;
    let config: BatchConfig = match std::env::var("AUTOBATCH_CONFIG") {
        Ok(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        Err(_) => BatchConfig::default(),
    };

    println!("═══════════════════════════════════════════════════════════");
    println!("  autobatch");
    println!("═══════════════════════════════════════════════════════════");
    println!("  Items: {}", items.len());
    println!("  Batch size: {}", config.batch_size);
    println!("  Output: {}", output_dir);
    println!("═══════════════════════════════════════════════════════════");

    let fetcher = Arc::new(HttpFetcher::new(&config)?);
    let packager = Arc::new(ZipPackager::new(&output_dir));
    let runner = BatchRunner::new(config, fetcher, packager)?;

    let mut events = runner.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::BatchCompleted {
                    batch_index,
                    succeeded,
                    failed,
                } => println!(
                    "  batch {:>3}: {} fetched, {} failed",
                    batch_index + 1,
                    succeeded,
                    failed
                ),
                Event::ArtifactCreated { artifact } => println!("  wrote {}", artifact.filename),
                Event::Paused { automatic: true } => {
                    println!("  paused after repeated failures, Ctrl-C to stop")
                }
                _ => {}
            }
        }
    });

    let canceller = runner.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = canceller.cancel().await;
        }
    });

    let result = runner
        .start(items, "batch", ConfigOverrides::default())
        .await;

    let state = runner.overall_state().await;
    let stats = runner.stats().await;
    println!("═══════════════════════════════════════════════════════════");
    println!("  Status: {:?}", state.status);
    println!(
        "  Articles: {}/{} ({} failed)",
        state.completed_articles, state.total_articles, state.failed_articles
    );
    println!(
        "  Batches: {}/{} completed, {} retries, final batch size {}",
        stats.completed_batches, stats.total_batches, stats.total_retries, stats.current_batch_size
    );
    if let Some(speed) = state.download_speed {
        println!("  Speed: {:.1} items/min", speed);
    }
    println!("═══════════════════════════════════════════════════════════");

    result?;
    Ok(())
}
