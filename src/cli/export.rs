use anyhow::{Context, Result};
use std::path::Path;

use strata::config::StrataConfig;

/// Export both scopes as a JSON envelope, to `output` or stdout.
pub async fn export(config: &StrataConfig, dir: &Path, output: Option<&Path>) -> Result<()> {
    let mut service = super::open_service(config, dir).await?;
    let json = service.export_json()?;

    match output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("failed to write export file: {}", path.display()))?;
            eprintln!("Exported memory to {}", path.display());
        }
        None => println!("{json}"),
    }

    service.close()?;
    Ok(())
}
