use anyhow::{Context, Result};
use std::path::Path;

use strata::config::StrataConfig;

/// Import an export envelope from a JSON file.
///
/// Blocks are upserted into their recorded scope; importing the same file
/// twice leaves memory unchanged.
pub async fn import(config: &StrataConfig, dir: &Path, file: &Path) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read import file: {}", file.display()))?;

    let mut service = super::open_service(config, dir).await?;
    let mut events = service.subscribe();

    let report = service.import_json(&json)?;

    while let Ok(event) = events.try_recv() {
        if let strata::memory::events::MemoryEvent::Error { error, .. } = event {
            eprintln!("warning: {error}");
        }
    }

    println!(
        "Import complete: {} created, {} updated, {} unchanged, {} skipped",
        report.created, report.updated, report.unchanged, report.skipped
    );

    service.close()?;
    Ok(())
}
