//! Scripted inference client for unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::time::Instant;

use crate::engine::{InferenceClient, InferenceError};
use crate::types::{GenerateRequest, GenerateResponse, ListModelsResponse, ModelInfo};

#[derive(Debug, Clone)]
pub enum Step {
    Reply(String),
    Network,
    Status(u16),
}

impl Step {
    fn run(&self) -> Result<GenerateResponse, InferenceError> {
        match self {
            Step::Reply(text) => Ok(GenerateResponse {
                response: text.clone(),
                model: Some("mock".into()),
                done: true,
            }),
            Step::Network => Err(InferenceError::Network("connection refused".into())),
            Step::Status(status) => Err(InferenceError::HttpStatus {
                status: *status,
                body: "scripted failure".into(),
            }),
        }
    }
}

/// Plays back `script` one step per call, then repeats `fallback`.
pub struct ScriptedClient {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    requests: Mutex<Vec<(Instant, GenerateRequest)>>,
}

impl ScriptedClient {
    pub fn new(script: Vec<Step>, fallback: Step) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always_reply(text: &str) -> Self {
        Self::new(Vec::new(), Step::Reply(text.to_string()))
    }

    pub fn always_network_error() -> Self {
        Self::new(Vec::new(), Step::Network)
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.requests.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }
}

#[async_trait]
impl InferenceClient for ScriptedClient {
    async fn list_models(&self) -> Result<ListModelsResponse, InferenceError> {
        Ok(ListModelsResponse {
            models: vec![ModelInfo {
                name: "mock".into(),
            }],
        })
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, InferenceError> {
        self.requests
            .lock()
            .unwrap()
            .push((Instant::now(), request));
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        step.run()
    }
}
