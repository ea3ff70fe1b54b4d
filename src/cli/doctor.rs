//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};
use std::path::Path;

use strata::config::StrataConfig;
use strata::memory::types::Scope;

/// Run diagnostics on both scope databases.
pub async fn doctor(config: &StrataConfig, dir: &Path) -> Result<()> {
    let mut service = super::open_service(config, dir)
        .await
        .context("failed to open scope databases (may be corrupt)")?;
    let configured = service.model_key();

    println!("Strata Health Report");
    println!("====================");
    println!();
    println!("Project root:      {}", service.project_root().display());
    println!("Embedding model:   {configured}");

    let mut healthy = true;
    for scope in Scope::ALL {
        let report = service
            .health(scope)
            .with_context(|| format!("failed to run health check for {scope} scope"))?;

        println!();
        println!("{scope} scope ({})", service.scope_dir(scope).display());
        println!("  Schema version:  {}", report.schema_version);
        println!(
            "  Stored model:    {}",
            report.embedding_model.as_deref().unwrap_or("(not set)")
        );
        if report.embedding_model.as_deref() != Some(configured.as_str()) {
            println!("  WARNING: model mismatch! Run `strata reindex --scope {scope}`.");
        }
        println!("  Blocks:          {}", report.block_count);
        println!("  Messages:        {}", report.message_count);
        println!("  Embeddings:      {}", report.embedding_count);
        println!("  Audit log:       {}", report.log_count);
        if report.integrity_ok {
            println!("  Integrity check: PASSED");
        } else {
            healthy = false;
            println!("  Integrity check: FAILED ({})", report.integrity_details);
        }
    }

    if !healthy {
        println!();
        println!("Recovery steps:");
        println!("  1. Export what is still readable: strata export --output backup.json");
        println!("  2. Move the damaged database aside and re-run: strata import backup.json");
    }

    service.close()?;
    Ok(())
}
