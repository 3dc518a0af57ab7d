use async_trait::async_trait;
use std::sync::Arc;

use crate::config::ClassifierConfig;
use crate::engine::{Classifier, InferenceClient};
use crate::types::{GenderLabel, GenerateOptions, GenerateRequest};

const OPTIONS: GenerateOptions = GenerateOptions {
    temperature: 0.1,
    num_predict: 10,
};

/// Labels a person's name with one word from the model. No retries: a failed
/// call yields [`GenderLabel::Error`].
pub struct GenderClassifier {
    client: Arc<dyn InferenceClient>,
    config: ClassifierConfig,
}

impl GenderClassifier {
    pub fn new(client: Arc<dyn InferenceClient>, config: ClassifierConfig) -> Self {
        Self { client, config }
    }

    fn prompt(name: &str) -> String {
        format!(
            "What is the gender of the name \"{name}\"? Reply with only one word: male, female, unisex, or unknown."
        )
    }
}

/// "female" contains "male", so it has to be checked first.
pub fn parse_gender_reply(reply: &str) -> GenderLabel {
    let reply = reply.trim().to_lowercase();
    if reply.contains("female") {
        GenderLabel::Female
    } else if reply.contains("male") {
        GenderLabel::Male
    } else if reply.contains("unisex") {
        GenderLabel::Unisex
    } else {
        GenderLabel::Unknown
    }
}

#[async_trait]
impl Classifier for GenderClassifier {
    type Label = GenderLabel;

    #[tracing::instrument(skip(self, text))]
    async fn classify(&self, row: usize, text: Option<&str>) -> GenderLabel {
        let name = match text {
            Some(name) if !name.trim().is_empty() => name,
            _ => return GenderLabel::Empty,
        };

        let request = GenerateRequest {
            model: self.config.model.clone(),
            prompt: Self::prompt(name),
            stream: false,
            format: None,
            options: OPTIONS,
        };

        match self.client.generate(request).await {
            Ok(reply) => {
                let label = parse_gender_reply(&reply.response);
                tracing::debug!(row, %label, "Name classified");
                label
            }
            Err(e) => {
                tracing::warn!(row, name, error = %e, "Gender classification failed");
                GenderLabel::Error
            }
        }
    }
}
