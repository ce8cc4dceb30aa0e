//! list-queue: run a listing request over a queue dump and print the result.
//!
//! Reads one queued item summary per line (JSONL), submits a listing over the
//! loaded queue, polls the job until it finishes, and prints the final listing
//! request as JSON. Exits non-zero when the listing fails.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use qlist_core::config::load_dotenv;
use qlist_core::Config;
use qlist_listing::{
    ListingRequestManager, ListingRequestView, ListingState, QueueEnumerator, QueueItemSummary,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// List the contents of a queue dump without loading it into the caller.
#[derive(Parser, Debug)]
#[command(name = "list-queue", version, about)]
struct Cli {
    /// JSONL file with one queued item summary per line.
    #[arg(long, env = "LISTING_INPUT")]
    input: PathBuf,

    /// Override the configured result cap.
    #[arg(long)]
    max_results: Option<usize>,

    /// Override the configured enumeration batch size.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Poll interval in milliseconds.
    #[arg(long, default_value_t = 50)]
    poll_ms: u64,
}

fn load_queue(path: &Path) -> anyhow::Result<Vec<QueueItemSummary>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let mut items = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut item: QueueItemSummary = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid item summary", path.display(), idx + 1))?;
        if item.position == 0 {
            item.position = items.len() as u64 + 1;
        }
        items.push(item);
    }
    Ok(items)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    load_dotenv();

    let mut config = Config::from_env();
    if let Some(max) = cli.max_results {
        config.listing.max_results = max;
    }
    if let Some(size) = cli.batch_size {
        config.listing.batch_size = size;
    }
    config.log_summary();

    let items = load_queue(&cli.input)?;
    info!(path = %cli.input.display(), items = items.len(), "loaded queue");

    let manager = ListingRequestManager::new(config.listing.clone())?;
    let submitted = manager.submit(QueueEnumerator::new(items, config.listing.batch_size))?;
    let id = submitted.id();

    let poll = Duration::from_millis(cli.poll_ms.max(1));
    let finished = loop {
        let snapshot = manager.get(id)?;
        if snapshot.is_finished() {
            break snapshot;
        }
        tokio::time::sleep(poll).await;
    };

    let state = finished.state();
    let reason = finished.failure_reason().map(String::from);
    let view = ListingRequestView::from(finished);
    println!("{}", serde_json::to_string_pretty(&view)?);

    if state == ListingState::Failed {
        anyhow::bail!(
            "listing request {} failed: {}",
            id,
            reason.unwrap_or_default()
        );
    }
    Ok(())
}
