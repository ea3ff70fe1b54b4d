//! CLI `search` command.

use anyhow::Result;
use std::path::Path;

use strata::config::StrataConfig;
use strata::memory::types::Scope;
use strata::search::{SearchMethod, SearchOptions};

pub struct SearchArgs<'a> {
    pub query: &'a str,
    pub method: SearchMethod,
    pub limit: Option<usize>,
    /// `None` searches both scopes.
    pub scope: Option<Scope>,
}

/// Run a search and print results as JSON.
pub async fn search(config: &StrataConfig, dir: &Path, args: SearchArgs<'_>) -> Result<()> {
    let mut service = super::open_service(config, dir).await?;

    let options = SearchOptions {
        method: args.method,
        limit: args.limit.unwrap_or(config.search.default_limit),
        scope: args.scope,
        ..Default::default()
    };
    let results = service.search_all(args.query, &options).await?;

    eprintln!("{} result(s) for {:?} ({})", results.len(), args.query, args.method);
    super::print_json(&results)?;
    service.close()?;
    Ok(())
}
