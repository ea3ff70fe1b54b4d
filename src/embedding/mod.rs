//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait and three interchangeable
//! strategies: a deterministic local feature-hashing provider (default, no
//! network) and two remote HTTP providers (OpenAI, Voyage AI). Providers are
//! created via [`create_provider`] from configuration.
//!
//! Remote calls carry no timeout of their own; hosts apply their network
//! timeout policy at the HTTP boundary.

pub mod local;
pub mod openai;
pub mod voyage;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Serialize;
use std::sync::Arc;

use crate::config::EmbeddingConfig;
use crate::error::{Error, ProviderErrorCode, Result};

/// Default dimension of the local provider.
pub const EMBEDDING_DIM: usize = 384;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Local,
    OpenAi,
    Voyage,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::OpenAi => "openai",
            Self::Voyage => "voyage",
        }
    }

    /// Environment variable consulted when no API key is configured.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Self::Local => None,
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Voyage => Some("VOYAGE_API_KEY"),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "openai" => Ok(Self::OpenAi),
            "voyage" => Ok(Self::Voyage),
            _ => Err(format!("unknown embedding provider: {s}. Supported: local, openai, voyage")),
        }
    }
}

/// A fixed-length embedding tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingVector {
    pub values: Vec<f32>,
    pub model: String,
    pub dimensions: usize,
    pub provider: ProviderKind,
}

impl EmbeddingVector {
    pub fn new(values: Vec<f32>, model: impl Into<String>, provider: ProviderKind) -> Self {
        Self {
            dimensions: values.len(),
            values,
            model: model.into(),
            provider,
        }
    }
}

/// Trait for embedding text into vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn model_name(&self) -> &str;

    /// Number of dimensions this provider is configured to produce.
    fn dimensions(&self) -> usize;

    /// Embed a single text string.
    async fn embed(&self, text: &str) -> Result<EmbeddingVector>;

    /// Embed a search query. Providers that embed queries and documents
    /// differently override this; the default is [`embed`](Self::embed).
    async fn embed_query(&self, text: &str) -> Result<EmbeddingVector> {
        self.embed(text).await
    }

    /// Embed several texts. The default embeds them one at a time.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Identity of the vector space, e.g. `openai:text-embedding-3-small:1536`.
    /// Vectors with different keys are never compared.
    fn model_key(&self) -> String {
        format!("{}:{}:{}", self.kind(), self.model_name(), self.dimensions())
    }
}

/// Create an embedding provider from config.
///
/// Remote providers fail here with a configuration error when no credential
/// is available; no request is attempted.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    create_provider_with(config, |var| std::env::var(var).ok())
}

/// [`create_provider`] with API key variables read through `env`.
pub fn create_provider_with(
    config: &EmbeddingConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Arc<dyn EmbeddingProvider>> {
    let kind: ProviderKind = config.provider.parse().map_err(Error::Configuration)?;
    if config.dimensions == Some(0) {
        return Err(Error::Configuration(
            "embedding dimensions must be greater than zero".into(),
        ));
    }

    let provider: Arc<dyn EmbeddingProvider> = match kind {
        ProviderKind::Local => Arc::new(local::LocalEmbeddingProvider::new(
            config.dimensions.unwrap_or(EMBEDDING_DIM),
        )?),
        ProviderKind::OpenAi => {
            let mut provider = openai::OpenAiEmbeddingProvider::new(resolve_api_key(config, kind, &env)?);
            if let Some(model) = &config.model {
                provider = provider.with_model(model.clone(), config.dimensions);
            } else if let Some(dims) = config.dimensions {
                provider = provider.with_dimensions(dims);
            }
            if let Some(url) = &config.base_url {
                provider = provider.with_base_url(url.clone());
            }
            Arc::new(provider)
        }
        ProviderKind::Voyage => {
            let mut provider = voyage::VoyageEmbeddingProvider::new(resolve_api_key(config, kind, &env)?);
            if let Some(model) = &config.model {
                provider = provider.with_model(model.clone(), config.dimensions);
            } else if let Some(dims) = config.dimensions {
                provider = provider.with_dimensions(dims);
            }
            if let Some(url) = &config.base_url {
                provider = provider.with_base_url(url.clone());
            }
            Arc::new(provider)
        }
    };

    tracing::info!(model_key = %provider.model_key(), "embedding provider ready");
    Ok(provider)
}

/// Configured API key, else the provider's environment variable. Blank keys
/// count as missing.
fn resolve_api_key(
    config: &EmbeddingConfig,
    kind: ProviderKind,
    env: impl Fn(&str) -> Option<String>,
) -> Result<String> {
    config
        .api_key
        .as_ref()
        .map(|key| key.expose_secret().clone())
        .or_else(|| kind.api_key_env().and_then(&env))
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| {
            Error::Configuration(format!(
                "{kind} embedding provider requires an API key (set embedding.api_key or {})",
                kind.api_key_env().unwrap_or("an API key")
            ))
        })
}

pub(crate) fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Turn a non-2xx provider response into a [`Error::Provider`] carrying the body.
pub(crate) async fn error_from_response(provider: ProviderKind, response: reqwest::Response) -> Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
    tracing::warn!(provider = %provider, status = status.as_u16(), "embedding request failed");
    Error::provider(
        ProviderErrorCode::from_status(status.as_u16()),
        format!("{provider} returned HTTP {status}: {body}"),
    )
}
