//! OpenAI embeddings provider using the `/v1/embeddings` endpoint.
use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

use super::{error_from_response, trim_base_url, EmbeddingProvider, EmbeddingVector, ProviderKind};
use crate::error::{Error, ProviderErrorCode, Result};

pub const DEFAULT_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_DIMENSIONS: usize = 1536;
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    api_key: Secret<String>,
    base_url: String,
    model: String,
    dims: usize,
    /// Send `dimensions` in the request (shortened text-embedding-3 output).
    request_dims: bool,
}

fn has_version_suffix(base_url: &str) -> bool {
    let Some(last_segment) = base_url.rsplit('/').next() else {
        return false;
    };
    let Some(rest) = last_segment.strip_prefix('v') else {
        return false;
    };
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
}

/// Accepts a bare host, a `/v1` base, or the full endpoint.
fn embeddings_endpoint(base_url: &str) -> String {
    let normalized = trim_base_url(base_url);
    if normalized.ends_with("/embeddings") {
        return normalized;
    }
    if has_version_suffix(&normalized) {
        return format!("{normalized}/embeddings");
    }
    format!("{normalized}/v1/embeddings")
}

impl OpenAiEmbeddingProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: Secret::new(api_key),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            dims: DEFAULT_DIMENSIONS,
            request_dims: false,
        }
    }

    /// Use another model. Unknown models keep the default dimension unless one
    /// is given.
    pub fn with_model(mut self, model: String, dims: Option<usize>) -> Self {
        self.dims = dims.unwrap_or_else(|| known_dimensions(&model));
        self.request_dims = dims.is_some();
        self.model = model;
        self
    }

    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dims = dims;
        self.request_dims = true;
        self
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = trim_base_url(&url);
        self
    }
}

fn known_dimensions(model: &str) -> usize {
    match model {
        "text-embedding-3-large" => 3072,
        _ => DEFAULT_DIMENSIONS,
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| Error::provider(ProviderErrorCode::Unknown, "empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let req = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.request_dims.then_some(self.dims),
        };

        let response = self
            .client
            .post(embeddings_endpoint(&self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&req)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(ProviderKind::OpenAi, response).await);
        }

        let mut resp: EmbeddingResponse = response.json().await?;
        if resp.data.len() != texts.len() {
            return Err(Error::provider(
                ProviderErrorCode::Unknown,
                format!(
                    "openai returned {} embeddings for {} inputs",
                    resp.data.len(),
                    texts.len()
                ),
            ));
        }
        resp.data.sort_by_key(|d| d.index.unwrap_or(0));

        let model = resp.model.unwrap_or_else(|| self.model.clone());
        Ok(resp
            .data
            .into_iter()
            .map(|d| EmbeddingVector::new(d.embedding, model.clone(), ProviderKind::OpenAi))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeddings_endpoint_accepts_common_base_urls() {
        assert_eq!(
            embeddings_endpoint("https://api.openai.com"),
            "https://api.openai.com/v1/embeddings"
        );
        assert_eq!(
            embeddings_endpoint("https://api.openai.com/v1/"),
            "https://api.openai.com/v1/embeddings"
        );
        assert_eq!(
            embeddings_endpoint("http://localhost:8080/v1/embeddings"),
            "http://localhost:8080/v1/embeddings"
        );
    }

    #[test]
    fn model_key_includes_dimensions() {
        let p = OpenAiEmbeddingProvider::new("sk-test".into());
        assert_eq!(p.model_key(), "openai:text-embedding-3-small:1536");
        let p = p.with_model("text-embedding-3-large".into(), None);
        assert_eq!(p.dimensions(), 3072);
    }

    #[tokio::test]
    async fn embed_parses_response_and_reports_actual_dimension() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/embeddings")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"data":[{"embedding":[0.1,0.2,0.3],"index":0}],"model":"text-embedding-3-small"}"#,
            )
            .create_async()
            .await;

        let p = OpenAiEmbeddingProvider::new("sk-test".into()).with_base_url(server.url());
        let v = p.embed("hello").await.unwrap();
        assert_eq!(v.values, vec![0.1, 0.2, 0.3]);
        assert_eq!(v.dimensions, 3);
        assert_eq!(v.provider, ProviderKind::OpenAi);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn batch_results_follow_input_order() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/embeddings")
            .with_status(200)
            .with_body(r#"{"data":[{"embedding":[2.0],"index":1},{"embedding":[1.0],"index":0}]}"#)
            .create_async()
            .await;

        let p = OpenAiEmbeddingProvider::new("k".into()).with_base_url(server.url());
        let out = p.embed_batch(&["a".into(), "b".into()]).await.unwrap();
        assert_eq!(out[0].values, vec![1.0]);
        assert_eq!(out[1].values, vec![2.0]);
    }

    #[tokio::test]
    async fn rate_limit_maps_to_provider_error_with_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/embeddings")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let p = OpenAiEmbeddingProvider::new("k".into()).with_base_url(server.url());
        match p.embed("x").await.unwrap_err() {
            Error::Provider { code, message } => {
                assert_eq!(code, ProviderErrorCode::RateLimited);
                assert!(message.contains("slow down"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
