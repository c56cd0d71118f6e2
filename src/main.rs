use anyhow::{Context, Result};
use clap::Parser;
use colored::*;

use page_snapshot::logging::init_logging;
use page_snapshot::report::REPORT_FILE;
use page_snapshot::{PageSnapshot, SnapshotCommand};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args = SnapshotCommand::parse();
    let config = args.into_config()?;
    let output_dir = config.output_dir.clone();

    let mut snapshot = PageSnapshot::new(config)?;
    let summary = snapshot
        .run()
        .await
        .with_context(|| format!("snapshot into {} did not complete", output_dir.display()))?;

    match &summary.report {
        Some(report) if report.failed() > 0 => println!(
            "{} {} of {} resources failed, see {}",
            "⚠️  Snapshot finished:".yellow(),
            report.failed(),
            report.total,
            REPORT_FILE
        ),
        _ => {}
    }
    println!("✅ Snapshot completed! All files saved to {}", output_dir.display());
    Ok(())
}
