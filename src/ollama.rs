use async_trait::async_trait;
use metrics::counter;
use std::time::Duration;

use crate::engine::{InferenceClient, InferenceError};
use crate::types::{GenerateRequest, GenerateResponse, ListModelsResponse};

/// Client for a local Ollama server.
#[derive(Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn checked(response: reqwest::Response) -> Result<reqwest::Response, InferenceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(InferenceError::HttpStatus {
            status: status.as_u16(),
            body,
        })
    }
}

impl From<reqwest::Error> for InferenceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            InferenceError::Network(err.to_string())
        } else if err.is_decode() {
            InferenceError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            InferenceError::HttpStatus {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            InferenceError::Request(err.to_string())
        }
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    #[tracing::instrument(skip(self))]
    async fn list_models(&self) -> Result<ListModelsResponse, InferenceError> {
        let response = self.http.get(self.url("/api/tags")).send().await?;
        let response = Self::checked(response).await?;
        Ok(response.json().await?)
    }

    #[tracing::instrument(skip(self, request), fields(model = %request.model, json = request.format.is_some()))]
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, InferenceError> {
        counter!("inference_requests_total").increment(1);
        let response = self
            .http
            .post(self.url("/api/generate"))
            .json(&request)
            .send()
            .await?;
        let response = Self::checked(response).await?;
        let generated: GenerateResponse = response.json().await?;
        tracing::trace!(
            model = ?generated.model,
            done = generated.done,
            reply = %generated.response,
            "Generation finished"
        );
        Ok(generated)
    }
}
