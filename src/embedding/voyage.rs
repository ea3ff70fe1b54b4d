//! Voyage AI embeddings provider.

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

use super::{error_from_response, trim_base_url, EmbeddingProvider, EmbeddingVector, ProviderKind};
use crate::error::{Error, ProviderErrorCode, Result};

pub const DEFAULT_MODEL: &str = "voyage-3";
pub const DEFAULT_DIMENSIONS: usize = 1024;
const DEFAULT_BASE_URL: &str = "https://api.voyageai.com";

pub struct VoyageEmbeddingProvider {
    client: reqwest::Client,
    api_key: Secret<String>,
    base_url: String,
    model: String,
    dims: usize,
    request_dims: bool,
}

impl VoyageEmbeddingProvider {
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

    fn endpoint(&self) -> String {
        if self.base_url.ends_with("/v1") {
            format!("{}/embeddings", self.base_url)
        } else {
            format!("{}/v1/embeddings", self.base_url)
        }
    }
}

fn known_dimensions(model: &str) -> usize {
    match model {
        "voyage-3-lite" => 512,
        "voyage-code-2" => 1536,
        _ => DEFAULT_DIMENSIONS,
    }
}

/// Voyage embeds retrieval queries and stored documents into matching but
/// distinct subspaces.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum InputType {
    Query,
    Document,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    input_type: InputType,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimension: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[async_trait]
impl EmbeddingProvider for VoyageEmbeddingProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Voyage
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        self.embed_one(text, InputType::Document).await
    }

    async fn embed_query(&self, text: &str) -> Result<EmbeddingVector> {
        self.embed_one(text, InputType::Query).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        self.request(texts, InputType::Document).await
    }
}

impl VoyageEmbeddingProvider {
    async fn embed_one(&self, text: &str, input_type: InputType) -> Result<EmbeddingVector> {
        self.request(&[text.to_string()], input_type)
            .await?
            .pop()
            .ok_or_else(|| Error::provider(ProviderErrorCode::Unknown, "empty embedding response"))
    }

    async fn request(&self, texts: &[String], input_type: InputType) -> Result<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let req = EmbeddingRequest {
            model: &self.model,
            input: texts,
            input_type,
            output_dimension: self.request_dims.then_some(self.dims),
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .json(&req)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(ProviderKind::Voyage, response).await);
        }

        let mut resp: EmbeddingResponse = response.json().await?;
        if resp.data.len() != texts.len() {
            return Err(Error::provider(
                ProviderErrorCode::Unknown,
                format!(
                    "voyage returned {} embeddings for {} inputs",
                    resp.data.len(),
                    texts.len()
                ),
            ));
        }
        resp.data.sort_by_key(|d| d.index);
        Ok(resp
            .data
            .into_iter()
            .map(|d| EmbeddingVector::new(d.embedding, self.model.clone(), ProviderKind::Voyage))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embed_sends_document_input_type() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/embeddings")
            .match_header("authorization", "Bearer pa-test")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"model":"voyage-3","input_type":"document"}"#.into(),
            ))
            .with_status(200)
            .with_body(r#"{"data":[{"embedding":[0.5,0.5],"index":0}]}"#)
            .create_async()
            .await;

        let p = VoyageEmbeddingProvider::new("pa-test".into()).with_base_url(server.url());
        let v = p.embed("memory").await.unwrap();
        assert_eq!(v.dimensions, 2);
        assert_eq!(v.model, "voyage-3");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn embed_query_sends_query_input_type() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/embeddings")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"input":["auth patterns"],"input_type":"query"}"#.into(),
            ))
            .with_status(200)
            .with_body(r#"{"data":[{"embedding":[1.0,0.0],"index":0}]}"#)
            .create_async()
            .await;

        let p = VoyageEmbeddingProvider::new("pa-test".into()).with_base_url(server.url());
        let v = p.embed_query("auth patterns").await.unwrap();
        assert_eq!(v.values, vec![1.0, 0.0]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_maps_to_server_error_code() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/embeddings")
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let p = VoyageEmbeddingProvider::new("k".into()).with_base_url(server.url());
        let err = p.embed("x").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Provider { code: ProviderErrorCode::ServerError, .. }
        ));
    }

    #[test]
    fn endpoint_handles_versioned_base() {
        let p = VoyageEmbeddingProvider::new("k".into()).with_base_url("http://h/v1/".into());
        assert_eq!(p.endpoint(), "http://h/v1/embeddings");
        assert_eq!(p.model_key(), "voyage:voyage-3:1024");
    }
}
