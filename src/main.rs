mod batched_engine;
mod config;
mod dataset;
mod engine;
mod gender;
mod ollama;
mod review;
mod summary;
#[cfg(test)]
mod testing;
mod text;
mod types;

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use batched_engine::BatchCoordinator;
use config::{BatchConfig, ClassifierConfig, Config, Pipeline, RunArgs};
use dataset::Table;
use engine::{Classifier, InferenceClient};
use gender::GenderClassifier;
use ollama::OllamaClient;
use review::ReviewClassifier;
use types::{GenderLabel, LabelColumns, ReviewLabels, Row};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::parse();
    tracing::info!("Starting rowlabel with config: {:?}", config);

    let client = OllamaClient::new(&config.ollama_url, config.request_timeout())?;

    tracing::info!("[1/5] Checking Ollama at {}...", config.ollama_url);
    match client.list_models().await {
        Ok(models) => {
            let names: Vec<_> = models.models.iter().map(|m| m.name.as_str()).collect();
            tracing::info!(models = ?names, "Ollama is running");
        }
        Err(e) => {
            tracing::error!(error = %e, "Ollama is not running or not accessible");
            anyhow::bail!("Start Ollama first: ollama serve");
        }
    }

    let client: Arc<dyn InferenceClient> = Arc::new(client);
    let batch_config = BatchConfig::from(&config);
    let classifier_config = ClassifierConfig::from(&config);

    match &config.pipeline {
        Pipeline::Gender(args) => {
            let Some(job) = Job::prepare(&args.input, &args.output, &args.column, &args.run)?
                .confirmed::<GenderLabel>(&args.run)
                .await?
            else {
                return Ok(());
            };
            let classifier = GenderClassifier::new(client, classifier_config);
            let (job, labels) = job.classify(classifier, batch_config).await?;

            tracing::info!("[4/5] Results summary");
            summary::log_shares("Gender", &summary::gender_counts(&labels));
            job.save(&labels)?;
        }
        Pipeline::Reviews(args) => {
            let Some(job) = Job::prepare(&args.input, &args.output, &args.column, &args.run)?
                .confirmed::<ReviewLabels>(&args.run)
                .await?
            else {
                return Ok(());
            };
            let classifier = ReviewClassifier::new(client, classifier_config);
            let (job, labels) = job.classify(classifier, batch_config).await?;

            tracing::info!("[4/5] Results summary");
            let review_summary = summary::review_summary(&labels);
            summary::log_shares("Sentiment", &review_summary.sentiment);
            summary::log_shares("Themes", &review_summary.themes);
            job.save(&labels)?;
        }
    }

    tracing::info!("Done");
    Ok(())
}

/// One run over one input file.
struct Job {
    table: Table,
    rows: Vec<Row>,
    output: PathBuf,
}

impl Job {
    fn prepare(input: &Path, output: &Path, column: &str, run: &RunArgs) -> anyhow::Result<Self> {
        tracing::info!("[2/5] Loading {}", input.display());
        let mut table = Table::load(input)
            .with_context(|| format!("Error loading {}", input.display()))?;
        tracing::info!(columns = ?table.headers(), "Loaded {} rows", table.len());

        let rows_to_process = run.limit.apply(table.len());
        table.truncate(rows_to_process);
        let rows = table.rows(column)?;

        Ok(Self {
            table,
            rows,
            output: output.to_path_buf(),
        })
    }

    /// Asks before overwriting label columns that already exist.
    async fn confirmed<L: LabelColumns>(self, run: &RunArgs) -> anyhow::Result<Option<Self>> {
        let existing: Vec<_> = L::columns()
            .into_iter()
            .filter(|c| self.table.has_column(c))
            .collect();
        if existing.is_empty() || run.yes {
            return Ok(Some(self));
        }

        tracing::warn!(columns = ?existing, "Label columns already exist and will be overwritten");
        let answer = tokio::task::spawn_blocking(|| {
            use std::io::Write;
            print!("  Continue? (y/n): ");
            std::io::stdout().flush()?;
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
            Ok::<_, std::io::Error>(line)
        })
        .await??;

        if answer.trim().eq_ignore_ascii_case("y") {
            Ok(Some(self))
        } else {
            tracing::info!("Cancelled by user");
            Ok(None)
        }
    }

    async fn classify<C>(
        self,
        classifier: C,
        batch_config: BatchConfig,
    ) -> anyhow::Result<(Self, Vec<C::Label>)>
    where
        C: Classifier + 'static,
    {
        tracing::info!(
            "[3/5] Processing {} rows using {} parallel workers",
            self.rows.len(),
            batch_config.workers
        );
        let coordinator = BatchCoordinator::new(batch_config, Arc::new(classifier));
        let started = tokio::time::Instant::now();
        let labels = coordinator.run(self.rows.clone()).await?;
        summary::log_timing(started.elapsed(), labels.len());
        Ok((self, labels))
    }

    fn save<L: LabelColumns>(mut self, labels: &[L]) -> anyhow::Result<()> {
        tracing::info!("[5/5] Saving results to {}", self.output.display());
        self.table.set_labels(labels)?;
        self.table
            .save(&self.output)
            .with_context(|| format!("Error writing {}", self.output.display()))?;
        tracing::info!("File saved successfully");
        Ok(())
    }
}
