use anyhow::{Context, Result};
use secrecy::Secret;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::memory::types::Scope;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StrataConfig {
    pub log: LogConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the global scope database.
    pub global_dir: String,
    /// Name of the per-project directory created at the detected project root.
    pub project_dir_name: String,
    pub default_scope: Scope,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `local`, `openai` or `voyage`.
    pub provider: String,
    pub model: Option<String>,
    /// Redacted in `Debug` output.
    pub api_key: Option<Secret<String>>,
    pub base_url: Option<String>,
    pub dimensions: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
    pub min_similarity: f32,
    pub semantic_weight: f32,
    pub keyword_weight: f32,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
    pub analytics_capacity: usize,
    pub backfill_on_init: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            global_dir: default_strata_dir().to_string_lossy().into_owned(),
            project_dir_name: ".strata".into(),
            default_scope: Scope::Project,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "local".into(),
            model: None,
            api_key: None,
            base_url: None,
            dimensions: None,
        }
    }
}

impl EmbeddingConfig {
    /// Defaults plus `STRATA_EMBEDDING_*` overrides, for callers without a
    /// config file. API keys still resolve from `OPENAI_API_KEY` /
    /// `VOYAGE_API_KEY` when the provider is created.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("STRATA_EMBEDDING_PROVIDER") {
            self.provider = val;
        }
        if let Ok(val) = std::env::var("STRATA_EMBEDDING_MODEL") {
            self.model = Some(val);
        }
        if let Ok(val) = std::env::var("STRATA_EMBEDDING_BASE_URL") {
            self.base_url = Some(val);
        }
        if let Ok(val) = std::env::var("STRATA_EMBEDDING_DIMENSIONS") {
            match val.parse() {
                Ok(dims) => self.dimensions = Some(dims),
                Err(e) => tracing::warn!(error = %e, "ignoring STRATA_EMBEDDING_DIMENSIONS"),
            }
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            min_similarity: 0.1,
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            cache_ttl_secs: 300,
            cache_max_entries: 100,
            analytics_capacity: 1000,
            backfill_on_init: true,
        }
    }
}

/// Returns `~/.strata/`, or `./.strata` when no home directory is known.
pub fn default_strata_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".strata")
}

/// Returns the default config file path: `~/.strata/config.toml`
pub fn default_config_path() -> PathBuf {
    default_strata_dir().join("config.toml")
}

impl StrataConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            StrataConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `STRATA_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("STRATA_GLOBAL_DIR") {
            self.storage.global_dir = val;
        }
        if let Ok(val) = std::env::var("STRATA_LOG_LEVEL") {
            self.log.level = val;
        }
        if let Ok(val) = std::env::var("STRATA_SCOPE") {
            match val.parse() {
                Ok(scope) => self.storage.default_scope = scope,
                Err(e) => tracing::warn!(error = %e, "ignoring STRATA_SCOPE"),
            }
        }
        self.embedding.apply_env_overrides();
    }

    /// Resolve the global scope directory, expanding `~` if needed.
    pub fn resolved_global_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.global_dir)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn default_config_is_valid() {
        let config = StrataConfig::default();
        assert_eq!(config.log.level, "info");
        assert_eq!(config.storage.project_dir_name, ".strata");
        assert_eq!(config.storage.default_scope, Scope::Project);
        assert_eq!(config.embedding.provider, "local");
        assert_eq!(config.search.cache_ttl_secs, 300);
        assert_eq!(config.search.cache_max_entries, 100);
        assert_eq!(config.search.analytics_capacity, 1000);
        assert!(config.storage.global_dir.ends_with(".strata"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[log]
level = "debug"

[storage]
global_dir = "/tmp/strata-global"
default_scope = "global"

[embedding]
provider = "openai"
model = "text-embedding-3-large"
dimensions = 3072

[search]
default_limit = 25
"#;
        let config: StrataConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.storage.global_dir, "/tmp/strata-global");
        assert_eq!(config.storage.default_scope, Scope::Global);
        assert_eq!(config.embedding.provider, "openai");
        assert_eq!(config.embedding.dimensions, Some(3072));
        assert_eq!(config.search.default_limit, 25);
        // defaults still apply for unset fields
        assert_eq!(config.storage.project_dir_name, ".strata");
        assert!((config.search.semantic_weight - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = StrataConfig::default();
        std::env::set_var("STRATA_GLOBAL_DIR", "/tmp/override");
        std::env::set_var("STRATA_LOG_LEVEL", "trace");
        std::env::set_var("STRATA_SCOPE", "global");
        std::env::set_var("STRATA_EMBEDDING_DIMENSIONS", "not-a-number");

        config.apply_env_overrides();

        assert_eq!(config.storage.global_dir, "/tmp/override");
        assert_eq!(config.log.level, "trace");
        assert_eq!(config.storage.default_scope, Scope::Global);
        assert_eq!(config.embedding.dimensions, None);

        // Clean up
        std::env::remove_var("STRATA_GLOBAL_DIR");
        std::env::remove_var("STRATA_LOG_LEVEL");
        std::env::remove_var("STRATA_SCOPE");
        std::env::remove_var("STRATA_EMBEDDING_DIMENSIONS");
    }

    #[test]
    fn api_key_loads_from_toml_and_stays_redacted() {
        let toml_str = r#"
[embedding]
provider = "voyage"
api_key = "pa-secret"
"#;
        let config: StrataConfig = toml::from_str(toml_str).unwrap();
        let key = config.embedding.api_key.as_ref().unwrap();
        assert_eq!(key.expose_secret(), "pa-secret");

        let rendered = format!("{:?}", config.embedding);
        assert!(!rendered.contains("pa-secret"));
        assert!(rendered.contains("REDACTED"));
    }
}
