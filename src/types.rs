use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub options: GenerateOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub num_predict: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListModelsResponse {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub name: String,
}

/// One input record: its position in the loaded table and its text cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub index: usize,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenderLabel {
    Male,
    Female,
    Unisex,
    Unknown,
    Error,
    Empty,
}

impl GenderLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenderLabel::Male => "male",
            GenderLabel::Female => "female",
            GenderLabel::Unisex => "unisex",
            GenderLabel::Unknown => "unknown",
            GenderLabel::Error => "error",
            GenderLabel::Empty => "",
        }
    }
}

impl fmt::Display for GenderLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review label columns, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Sentiment,
    DeliveryExperience,
    FoodOrderQuality,
    AppSystemIssues,
    SupportResolution,
    PriceCharges,
    PositiveFeedback,
    Others,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Sentiment,
        Category::DeliveryExperience,
        Category::FoodOrderQuality,
        Category::AppSystemIssues,
        Category::SupportResolution,
        Category::PriceCharges,
        Category::PositiveFeedback,
        Category::Others,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            Category::Sentiment => "Sentiment",
            Category::DeliveryExperience => "Delivery Experience",
            Category::FoodOrderQuality => "Food / Order Quality",
            Category::AppSystemIssues => "App & System Issues",
            Category::SupportResolution => "Support / Resolution",
            Category::PriceCharges => "Price / Charges",
            Category::PositiveFeedback => "Positive Feedback",
            Category::Others => "Others",
        }
    }

    fn slot(&self) -> usize {
        *self as usize
    }
}

/// Labels for one review. Every category always has a value, possibly empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewLabels {
    values: [String; 8],
}

impl ReviewLabels {
    pub fn get(&self, category: Category) -> &str {
        &self.values[category.slot()]
    }

    pub fn set(&mut self, category: Category, value: impl Into<String>) {
        self.values[category.slot()] = value.into();
    }

    pub fn with(mut self, category: Category, value: impl Into<String>) -> Self {
        self.set(category, value);
        self
    }
}

/// Turns a label into the output cells it occupies.
pub trait LabelColumns {
    fn columns() -> Vec<&'static str>;
    fn cells(&self) -> Vec<String>;
}

impl LabelColumns for GenderLabel {
    fn columns() -> Vec<&'static str> {
        vec!["Gender"]
    }

    fn cells(&self) -> Vec<String> {
        vec![self.as_str().to_string()]
    }
}

impl LabelColumns for ReviewLabels {
    fn columns() -> Vec<&'static str> {
        Category::ALL.iter().map(|c| c.column()).collect()
    }

    fn cells(&self) -> Vec<String> {
        self.values.to_vec()
    }
}
