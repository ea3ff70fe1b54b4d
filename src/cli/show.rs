//! CLI `show` command: print the merged memory view.

use anyhow::Result;
use std::path::Path;

use strata::config::StrataConfig;

/// Print every block type resolved across scopes (project over global).
pub async fn show(config: &StrataConfig, dir: &Path) -> Result<()> {
    let mut service = super::open_service(config, dir).await?;
    let loaded = service.load_all_memory()?;
    if loaded.is_empty() {
        eprintln!("No memory blocks in {}", service.project_root().display());
    }
    super::print_json(&loaded)?;
    service.close()?;
    Ok(())
}
