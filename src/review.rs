use async_trait::async_trait;
use metrics::counter;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ClassifierConfig;
use crate::engine::{Classifier, InferenceClient, InferenceError};
use crate::text::{clean_review_text, preview};
use crate::types::{Category, GenerateOptions, GenerateRequest, ReviewLabels};

const OPTIONS: GenerateOptions = GenerateOptions {
    temperature: 0.05,
    num_predict: 250,
};

const CLASSIFICATION_GUIDE: &str = r#"THEME CATEGORIES (SIMPLIFIED):
A. DELIVERY EXPERIENCE (4 simple categories)
    - "Delivery Delay" (ANY delay: late, slow, took too long, hours)
    - "Rider Misbehavior" (Rider rude, unprofessional, bad behavior)
    - "Delivery Issue" (Wrong address, damaged package, partial delivery)
    - "Good Delivery Experience" (Fast, on-time, positive)
B. FOOD / ORDER QUALITY (4 simple categories)
    - "Poor Food Quality" (ANY quality issue: cold, stale, bad taste, spoiled, burnt)
    - "Wrong/Missing Items" (Wrong items, missing items, incorrect order)
    - "Poor Packaging" (Leaking, spilled, damaged packaging)
    - "Good Food Quality" (Tasty, fresh, hot, good quantity)
C. APP & SYSTEM ISSUES (5 simple categories)
    - "App Technical Issue" (ANY app problem: crash, lag, bug, freeze, slow)
    - "Payment Issue" (Payment failure, double charge, refund not processed)
    - "Order/Tracking Issue" (Can't place order, can't track, status wrong)
    - "Coupon/Promo Issue" (Coupon not working, discount not applied)
    - "Good App Experience" (App works well, smooth)
D. SUPPORT / RESOLUTION (3 simple categories)
    - "Poor Customer Support" (ANY support issue: not helpful, rude, slow, no response)
    - "Refund/Compensation Issue" (Refund not received, money not returned)
    - "Good Customer Support" (Helpful, quick response, issue resolved)
E. PRICE / CHARGES (4 simple categories)
    - "High Prices" (ANY price complaint: expensive, costly, high delivery charges)
    - "Hidden/Extra Charges" (Hidden fees, unexpected charges, GST, surge pricing)
    - "Billing Error" (Wrong amount, price mismatch, overcharged)
    - "Good Value" (Affordable, reasonable, worth money)
F. POSITIVE FEEDBACK (2 simple categories)
    - "Positive Experience" (ANY general praise: good, great, nice, best, love it)
    - "Specific Praise" (Explicitly praises delivery/food/app/value)
G. OTHERS
    - "Vague/Unclear" (Too vague to classify)
    - Use ONLY when review does NOT clearly fit any category above

CRITICAL RULES:
- Keep it SIMPLE - use the exact labels above
- DO NOT create new subcategories
- If unsure → Use "Others"
"#;

const REPLY_RULES: &str = r#"CRITICAL:
1. The VALUE for each category KEY must be one of the **EXACT** sub-theme labels listed in the guide (e.g., "Delivery Delay" or "Poor Food Quality").
2. If the review does NOT contain the topic for a category, the VALUE **MUST** be an empty string ("").
3. Return **ONLY** the JSON object. NO explanations. NO extra text.
{"Sentiment": "Positive/Negative/Neutral", "Delivery Experience": "", "Food / Order Quality": "", "App & System Issues": "", "Support / Resolution": "", "Price / Charges": "", "Positive Feedback": "", "Others": ""}
"#;

const POSITIVE_WORDS: [&str; 14] = [
    "good", "great", "nice", "excellent", "amazing", "awesome", "super", "best", "perfect",
    "wonderful", "fantastic", "badhiya", "achha", "mast",
];

const NEGATIVE_WORDS: [&str; 8] = [
    "bad", "worst", "terrible", "horrible", "pathetic", "bekar", "kharab", "bakwas",
];

/// Single-word reviews that are labelled without asking the model.
#[derive(Debug, Clone)]
pub struct Keywords {
    positive: HashSet<String>,
    negative: HashSet<String>,
}

impl Keywords {
    pub fn new<P, N>(positive: P, negative: N) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        N: IntoIterator,
        N::Item: AsRef<str>,
    {
        Self {
            positive: lowercase_set(positive),
            negative: lowercase_set(negative),
        }
    }

    /// Matches only when the whole review is one known word.
    fn shortcut(&self, cleaned: &str) -> Option<ReviewLabels> {
        let lowered = cleaned.to_lowercase();
        let mut tokens = lowered.split_whitespace();
        let word = tokens.next()?;
        if tokens.next().is_some() {
            return None;
        }

        if self.positive.contains(word) {
            Some(
                ReviewLabels::default()
                    .with(Category::Sentiment, "Positive")
                    .with(Category::PositiveFeedback, "Positive Experience"),
            )
        } else if self.negative.contains(word) {
            Some(ReviewLabels::default().with(Category::Sentiment, "Negative"))
        } else {
            None
        }
    }
}

fn lowercase_set<I>(words: I) -> HashSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    words
        .into_iter()
        .map(|w| w.as_ref().to_lowercase())
        .collect()
}

impl Default for Keywords {
    fn default() -> Self {
        Self::new(POSITIVE_WORDS, NEGATIVE_WORDS)
    }
}

/// Why a single model attempt did not produce labels.
#[derive(Debug)]
enum AttemptError {
    Parse(String),
    Network(String),
    Other { kind: &'static str, message: String },
}

impl AttemptError {
    fn class(&self) -> &'static str {
        match self {
            AttemptError::Parse(_) => "JSON Parse Error",
            AttemptError::Network(_) => "Network Error",
            AttemptError::Other { .. } => "Unexpected Error",
        }
    }

    fn message(&self) -> &str {
        match self {
            AttemptError::Parse(m) | AttemptError::Network(m) => m,
            AttemptError::Other { message, .. } => message,
        }
    }

    /// Labels recorded once every attempt has failed.
    fn into_labels(self) -> ReviewLabels {
        match self {
            AttemptError::Parse(_) => ReviewLabels::default()
                .with(Category::Sentiment, "Negative")
                .with(Category::Others, "JSON Parse Error"),
            AttemptError::Network(_) => ReviewLabels::default()
                .with(Category::Sentiment, "Error")
                .with(Category::Others, "Network Error"),
            AttemptError::Other { kind, .. } => ReviewLabels::default()
                .with(Category::Sentiment, "Error")
                .with(Category::Others, kind),
        }
    }
}

impl From<InferenceError> for AttemptError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::Network(message) => AttemptError::Network(message),
            other => AttemptError::Other {
                kind: other.kind(),
                message: other.to_string(),
            },
        }
    }
}

/// Reads the model's JSON reply. Missing keys stay empty, unknown keys are
/// dropped. `null` becomes an empty cell and other non-string values keep
/// their JSON spelling (`true`, `3`, `{"a":1}`).
pub fn parse_review_reply(reply: &str) -> Result<ReviewLabels, String> {
    let parsed: Value = serde_json::from_str(reply.trim()).map_err(|e| e.to_string())?;
    let fields = match parsed {
        Value::Object(fields) => fields,
        other => return Err(format!("expected a JSON object, got {other}")),
    };

    let mut labels = ReviewLabels::default();
    for category in Category::ALL {
        let value = match fields.get(category.column()) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(other) => other.to_string().trim().to_string(),
        };
        labels.set(category, value);
    }
    Ok(labels)
}

fn build_prompt(cleaned: &str) -> String {
    format!("{CLASSIFICATION_GUIDE}\nREVIEW: \"{cleaned}\"\n{REPLY_RULES}")
}

pub struct ReviewClassifier {
    client: Arc<dyn InferenceClient>,
    config: ClassifierConfig,
    keywords: Keywords,
}

impl ReviewClassifier {
    pub fn new(client: Arc<dyn InferenceClient>, config: ClassifierConfig) -> Self {
        Self::with_keywords(client, config, Keywords::default())
    }

    pub fn with_keywords(
        client: Arc<dyn InferenceClient>,
        config: ClassifierConfig,
        keywords: Keywords,
    ) -> Self {
        Self {
            client,
            config,
            keywords,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.config.retry_delay.saturating_mul(factor)
    }

    async fn attempt(&self, prompt: &str) -> Result<ReviewLabels, AttemptError> {
        let request = GenerateRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            format: Some("json".to_string()),
            options: OPTIONS,
        };
        let reply = self.client.generate(request).await?;
        parse_review_reply(&reply.response).map_err(AttemptError::Parse)
    }
}

#[async_trait]
impl Classifier for ReviewClassifier {
    type Label = ReviewLabels;

    #[tracing::instrument(skip(self, text))]
    async fn classify(&self, row: usize, text: Option<&str>) -> ReviewLabels {
        let cleaned = match text {
            Some(text) if !text.trim().is_empty() => clean_review_text(text),
            _ => return ReviewLabels::default(),
        };
        if cleaned.is_empty() {
            return ReviewLabels::default();
        }

        if let Some(labels) = self.keywords.shortcut(&cleaned) {
            counter!("keyword_shortcut_total").increment(1);
            tracing::debug!(row, "Labelled by keyword");
            return labels;
        }

        let prompt = build_prompt(&cleaned);
        let max_retries = self.config.max_retries;

        for attempt in 0..max_retries {
            let failure = match self.attempt(&prompt).await {
                Ok(labels) => return labels,
                Err(failure) => failure,
            };

            if attempt + 1 < max_retries {
                let delay = self.backoff(attempt);
                counter!("inference_retries_total").increment(1);
                tracing::warn!(
                    row,
                    attempt = attempt + 1,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = failure.message(),
                    "{}, retrying",
                    failure.class()
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            tracing::error!(
                row,
                review = %preview(&cleaned, 50),
                error = failure.message(),
                "{} after {} attempts",
                failure.class(),
                max_retries
            );
            return failure.into_labels();
        }

        ReviewLabels::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedClient, Step};

    const FULL_REPLY: &str = r#"{"Sentiment": "Negative", "Delivery Experience": "Delivery Delay", "Food / Order Quality": " Poor Food Quality ", "App & System Issues": "", "Support / Resolution": "", "Price / Charges": "", "Positive Feedback": "", "Others": ""}"#;

    fn classifier(client: &Arc<ScriptedClient>) -> ReviewClassifier {
        ReviewClassifier::new(client.clone(), ClassifierConfig::default())
    }

    fn only(pairs: &[(Category, &str)]) -> ReviewLabels {
        pairs
            .iter()
            .fold(ReviewLabels::default(), |labels, (c, v)| labels.with(*c, *v))
    }

    #[tokio::test]
    async fn positive_single_words_skip_the_model() {
        let client = Arc::new(ScriptedClient::always_reply(FULL_REPLY));
        let classifier = classifier(&client);

        for (row, word) in POSITIVE_WORDS.iter().enumerate() {
            let text = format!("  {}  ", word.to_uppercase());
            let labels = classifier.classify(row, Some(&text)).await;
            assert_eq!(
                labels,
                only(&[
                    (Category::Sentiment, "Positive"),
                    (Category::PositiveFeedback, "Positive Experience"),
                ]),
                "{word}"
            );
        }
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn negative_single_words_skip_the_model() {
        let client = Arc::new(ScriptedClient::always_reply(FULL_REPLY));
        let classifier = classifier(&client);

        for word in NEGATIVE_WORDS {
            let labels = classifier.classify(0, Some(word)).await;
            assert_eq!(labels, only(&[(Category::Sentiment, "Negative")]));
        }
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn keyword_inside_longer_review_goes_to_the_model() {
        let client = Arc::new(ScriptedClient::always_reply(FULL_REPLY));
        let classifier = classifier(&client);

        let labels = classifier.classify(0, Some("good but late")).await;
        assert_eq!(labels.get(Category::DeliveryExperience), "Delivery Delay");

        // Substring of a keyword is not a keyword.
        classifier.classify(1, Some("goodish")).await;
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn blank_reviews_are_empty() {
        let client = Arc::new(ScriptedClient::always_reply(FULL_REPLY));
        let classifier = classifier(&client);

        for text in [None, Some(""), Some("   "), Some("\u{200B}\u{0007}")] {
            assert_eq!(classifier.classify(0, text).await, ReviewLabels::default());
        }
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn sends_cleaned_review_in_json_mode() {
        let client = Arc::new(ScriptedClient::always_reply(FULL_REPLY));
        let classifier = classifier(&client);

        let labels = classifier
            .classify(4, Some("Food was “cold”\n\nand   late"))
            .await;

        assert_eq!(labels.get(Category::Sentiment), "Negative");
        assert_eq!(labels.get(Category::FoodOrderQuality), "Poor Food Quality");
        let request = &client.requests()[0];
        assert!(request.prompt.contains("REVIEW: \"Food was 'cold' and late\""));
        assert!(request.prompt.contains("G. OTHERS"));
        assert_eq!(request.format.as_deref(), Some("json"));
        assert_eq!(request.options, OPTIONS);
    }

    #[test]
    fn reply_parsing_fills_every_category() {
        let labels = parse_review_reply(
            r#" {"Sentiment": "Positive", "Others": null, "Price / Charges": 3, "Extra": "x"} "#,
        )
        .unwrap();

        assert_eq!(labels.get(Category::Sentiment), "Positive");
        assert_eq!(labels.get(Category::PriceCharges), "3");
        assert_eq!(labels.get(Category::Others), "");
        assert_eq!(labels.get(Category::DeliveryExperience), "");

        assert!(parse_review_reply("Sure! Here is the JSON").is_err());
        assert!(parse_review_reply(r#"["Positive"]"#).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn retries_parse_failures_with_growing_delay() {
        let client = Arc::new(ScriptedClient::new(
            vec![
                Step::Reply("not json".into()),
                Step::Reply("{\"Sentiment\": ".into()),
            ],
            Step::Reply(FULL_REPLY.into()),
        ));
        let classifier = classifier(&client);

        let labels = classifier.classify(0, Some("late and cold")).await;

        assert_eq!(labels, parse_review_reply(FULL_REPLY).unwrap());
        let times = client.call_times();
        assert_eq!(times.len(), 3);
        let first_gap = times[1] - times[0];
        let second_gap = times[2] - times[1];
        assert_eq!(first_gap, Duration::from_secs(2));
        assert_eq!(second_gap, Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_network_failures_are_error_labels() {
        let client = Arc::new(ScriptedClient::always_network_error());
        let classifier = classifier(&client);

        let labels = classifier.classify(9, Some("app keeps crashing")).await;

        assert_eq!(client.calls(), 3);
        assert_eq!(
            labels,
            only(&[
                (Category::Sentiment, "Error"),
                (Category::Others, "Network Error"),
            ])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_parse_failures_default_to_negative() {
        let client = Arc::new(ScriptedClient::always_reply("I think it is negative"));
        let classifier = classifier(&client);

        let labels = classifier.classify(0, Some("meh")).await;

        assert_eq!(client.calls(), 3);
        assert_eq!(
            labels,
            only(&[
                (Category::Sentiment, "Negative"),
                (Category::Others, "JSON Parse Error"),
            ])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn other_failures_carry_their_kind() {
        let client = Arc::new(ScriptedClient::new(Vec::new(), Step::Status(500)));
        let classifier = classifier(&client);

        let labels = classifier.classify(0, Some("refund pending")).await;

        assert_eq!(
            labels,
            only(&[
                (Category::Sentiment, "Error"),
                (Category::Others, "HttpStatus"),
            ])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn last_attempt_outcome_decides_the_label() {
        let client = Arc::new(ScriptedClient::new(
            vec![Step::Reply("garbage".into()), Step::Status(503)],
            Step::Network,
        ));
        let classifier = classifier(&client);

        let labels = classifier.classify(0, Some("slow app")).await;

        assert_eq!(labels.get(Category::Others), "Network Error");
        assert_eq!(labels.get(Category::Sentiment), "Error");
    }

    #[tokio::test]
    async fn zero_attempts_yield_empty_labels() {
        let client = Arc::new(ScriptedClient::always_reply(FULL_REPLY));
        let config = ClassifierConfig {
            max_retries: 0,
            ..ClassifierConfig::default()
        };
        let classifier = ReviewClassifier::new(client.clone(), config);

        assert_eq!(
            classifier.classify(0, Some("slow app")).await,
            ReviewLabels::default()
        );
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn same_review_same_labels() {
        let client = Arc::new(ScriptedClient::always_reply(FULL_REPLY));
        let classifier = classifier(&client);

        let first = classifier.classify(0, Some("cold food, late rider")).await;
        let second = classifier.classify(0, Some("cold food, late rider")).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn custom_keywords_replace_defaults() {
        let client = Arc::new(ScriptedClient::always_reply(FULL_REPLY));
        let classifier = ReviewClassifier::with_keywords(
            client.clone(),
            ClassifierConfig::default(),
            Keywords::new(vec!["Zabardast"], vec!["ghatiya"]),
        );

        let labels = classifier.classify(0, Some("zabardast")).await;
        assert_eq!(labels.get(Category::Sentiment), "Positive");
        classifier.classify(1, Some("good")).await;
        assert_eq!(client.calls(), 1);
    }
}
