use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Base URL of the Ollama server
    #[arg(long, env = "OLLAMA_HOST", default_value = "http://127.0.0.1:11434")]
    pub ollama_url: String,

    /// Model used for every request
    #[arg(long, env = "MODEL_NAME", default_value = "llama3.2")]
    pub model: String,

    /// Number of parallel workers (and concurrent requests)
    #[arg(long, env = "MAX_WORKERS", default_value = "4")]
    pub max_workers: usize,

    /// Attempts per review before giving up
    #[arg(long, env = "MAX_RETRIES", default_value = "3")]
    pub max_retries: u32,

    /// Base retry delay in milliseconds, doubled after each attempt
    #[arg(long, env = "RETRY_DELAY_MS", default_value = "2000")]
    pub retry_delay_ms: u64,

    /// HTTP timeout for a single inference request, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "120")]
    pub request_timeout_secs: u64,

    #[command(subcommand)]
    pub pipeline: Pipeline,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Pipeline {
    /// Label each name with male, female, unisex or unknown
    Gender(GenderArgs),
    /// Label each review with a sentiment and complaint/praise themes
    Reviews(ReviewArgs),
}

#[derive(Debug, Clone, Args)]
pub struct GenderArgs {
    #[arg(long, default_value = "input.csv")]
    pub input: PathBuf,

    #[arg(long, default_value = "output.csv")]
    pub output: PathBuf,

    /// Column holding the names
    #[arg(long, default_value = "Name")]
    pub column: String,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Debug, Clone, Args)]
pub struct ReviewArgs {
    #[arg(long, default_value = "input.csv")]
    pub input: PathBuf,

    #[arg(long, default_value = "output_with_themes.csv")]
    pub output: PathBuf,

    /// Column holding the review text
    #[arg(long, default_value = "content")]
    pub column: String,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Rows to process from the top of the file: a number or "all"
    #[arg(long, default_value = "all")]
    pub limit: RowLimit,

    /// Overwrite existing label columns without asking
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLimit {
    All,
    First(usize),
}

impl RowLimit {
    pub fn apply(&self, total: usize) -> usize {
        match self {
            RowLimit::All => total,
            RowLimit::First(n) => (*n).min(total),
        }
    }
}

impl FromStr for RowLimit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(RowLimit::All);
        }
        s.trim()
            .parse()
            .map(RowLimit::First)
            .map_err(|_| format!("expected a row count or \"all\", got {s:?}"))
    }
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub workers: usize,
}

impl From<&Config> for BatchConfig {
    fn from(config: &Config) -> Self {
        Self {
            workers: config.max_workers.max(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub model: String,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model: "llama3.2".to_string(),
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

impl From<&Config> for ClassifierConfig {
    fn from(config: &Config) -> Self {
        Self {
            model: config.model.clone(),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
