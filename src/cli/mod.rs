pub mod doctor;
pub mod export;
pub mod import;
pub mod reindex;
pub mod search;
pub mod show;
pub mod stats;

use anyhow::{Context, Result};
use std::path::Path;

use strata::config::StrataConfig;
use strata::memory::service::MemoryService;

/// Build and initialize a service rooted at `dir`.
pub async fn open_service(config: &StrataConfig, dir: &Path) -> Result<MemoryService> {
    let mut service =
        MemoryService::new(config, dir).context("failed to configure memory service")?;
    service
        .initialize()
        .await
        .context("failed to open memory scopes")?;
    Ok(service)
}

/// Write `value` to stdout as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
