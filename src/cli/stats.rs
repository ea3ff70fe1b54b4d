use anyhow::Result;
use std::path::Path;

use strata::config::StrataConfig;
use strata::memory::types::Scope;

/// Display per-scope memory statistics in the terminal.
pub async fn stats(config: &StrataConfig, dir: &Path) -> Result<()> {
    let mut service = super::open_service(config, dir).await?;

    println!("Memory Statistics");
    println!("{}", "=".repeat(40));
    println!("  Project root:        {}", service.project_root().display());
    println!("  Current scope:       {}", service.current_scope());
    println!("  Embedding model:     {}", service.model_key());

    for scope in Scope::ALL {
        let stats = service.stats(scope)?;
        println!();
        println!("{} scope ({})", scope, service.scope_dir(scope).display());
        println!("  Blocks:              {}", stats.total_blocks);
        for (block_type, count) in &stats.by_type {
            println!("    {block_type:<12}      {count}");
        }
        println!("  Versions:            {}", stats.block_versions);
        println!("  Messages:            {} ({} agents)", stats.messages, stats.agents);
        println!("  Embeddings:          {}", stats.embeddings);
        println!("  Audit log:           {}", stats.audit_entries);
        println!("  Database size:       {}", super::format_bytes(stats.db_size_bytes));
        if let Some(ref updated) = stats.last_updated {
            println!("  Last updated:        {updated}");
        }
    }

    service.close()?;
    Ok(())
}
