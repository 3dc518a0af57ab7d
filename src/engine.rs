use crate::types::{GenerateRequest, GenerateResponse, ListModelsResponse};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    /// The server could not be reached or did not answer in time.
    #[error("network error: {0}")]
    Network(String),

    #[error("server returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The response envelope was not what the API documents.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("request error: {0}")]
    Request(String),
}

impl InferenceError {
    /// Short variant name, used as a diagnostic label in output rows.
    pub fn kind(&self) -> &'static str {
        match self {
            InferenceError::Network(_) => "Network",
            InferenceError::HttpStatus { .. } => "HttpStatus",
            InferenceError::InvalidResponse(_) => "InvalidResponse",
            InferenceError::Request(_) => "Request",
        }
    }
}

#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn list_models(&self) -> Result<ListModelsResponse, InferenceError>;

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, InferenceError>;
}

#[async_trait]
pub trait Classifier: Send + Sync {
    type Label: Clone + Send + 'static;

    async fn classify(&self, row: usize, text: Option<&str>) -> Self::Label;
}
