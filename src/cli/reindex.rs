//! CLI `reindex` command: regenerate all embeddings with the current provider.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use strata::config::StrataConfig;
use strata::memory::types::Scope;

/// Re-embed every block in `scope`, or in both scopes when `None`.
pub async fn reindex(config: &StrataConfig, dir: &Path, scope: Option<Scope>) -> Result<()> {
    let mut service = super::open_service(config, dir).await?;
    let scopes: Vec<Scope> = match scope {
        Some(s) => vec![s],
        None => Scope::ALL.to_vec(),
    };

    eprintln!("Re-embedding with model '{}'...", service.model_key());

    let style = ProgressStyle::default_bar()
        .template("  {prefix:>8} {bar:40.cyan/blue} {pos}/{len}")
        .context("invalid progress template")?
        .progress_chars("##-");

    for scope in scopes {
        let pb = ProgressBar::new(0).with_style(style.clone()).with_prefix(scope.to_string());
        let progress = |done: usize, total: usize| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        };
        let report = service.reindex(scope, Some(&progress)).await?;
        pb.finish_and_clear();

        eprintln!(
            "{scope}: {} embedded, {} failed",
            report.embedded, report.failed
        );
    }

    service.close()?;
    Ok(())
}
