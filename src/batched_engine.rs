use anyhow::{Result, bail};
use metrics::counter;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::BatchConfig;
use crate::engine::Classifier;
use crate::types::Row;

/// Splits `total` rows into contiguous chunks of `max(1, total / workers)`
/// rows. The last chunk may be shorter, and there may be more chunks than
/// workers.
pub fn partition(total: usize, workers: usize) -> Vec<Range<usize>> {
    let chunk_size = (total / workers.max(1)).max(1);
    (0..total)
        .step_by(chunk_size)
        .map(|start| start..(start + chunk_size).min(total))
        .collect()
}

#[derive(Debug)]
struct ChunkResult<L> {
    range: Range<usize>,
    labels: Vec<L>,
}

/// Throughput bookkeeping, owned by the coordinating task.
#[derive(Debug)]
pub struct ProgressState {
    total: usize,
    completed: usize,
    started: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
    pub percent: f64,
    pub rate: f64,
    pub eta: Duration,
}

impl ProgressState {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            started: Instant::now(),
        }
    }

    pub fn record(&mut self, rows: usize) -> ProgressSnapshot {
        self.completed += rows;
        let elapsed = self.started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            self.completed as f64 / elapsed
        } else {
            0.0
        };
        let remaining = self.total.saturating_sub(self.completed) as f64;
        let eta = if rate > 0.0 {
            Duration::from_secs_f64(remaining / rate)
        } else {
            Duration::ZERO
        };
        let percent = if self.total > 0 {
            self.completed as f64 * 100.0 / self.total as f64
        } else {
            100.0
        };

        ProgressSnapshot {
            completed: self.completed,
            total: self.total,
            percent,
            rate,
            eta,
        }
    }
}

/// Fans chunks of rows out to a fixed pool of workers and reassembles their
/// labels in row order.
pub struct BatchCoordinator<C: Classifier> {
    config: BatchConfig,
    classifier: Arc<C>,
}

impl<C: Classifier + 'static> BatchCoordinator<C> {
    pub fn new(config: BatchConfig, classifier: Arc<C>) -> Self {
        Self { config, classifier }
    }

    #[tracing::instrument(skip(self, rows), fields(rows = rows.len(), workers = self.config.workers))]
    pub async fn run(&self, rows: Vec<Row>) -> Result<Vec<C::Label>> {
        let total = rows.len();
        let rows = Arc::new(rows);
        let chunks = partition(total, self.config.workers);
        tracing::info!(chunks = chunks.len(), "Dispatching chunks");

        let (chunk_tx, chunk_rx) = flume::unbounded::<Range<usize>>();
        let (result_tx, result_rx) = flume::unbounded::<ChunkResult<C::Label>>();
        for chunk in chunks {
            chunk_tx
                .send(chunk)
                .map_err(|_| anyhow::anyhow!("Chunk queue is closed"))?;
        }
        drop(chunk_tx);

        let workers: Vec<_> = (0..self.config.workers)
            .map(|worker| {
                let processor = ChunkProcessor {
                    worker,
                    rows: rows.clone(),
                    classifier: self.classifier.clone(),
                    chunk_rx: chunk_rx.clone(),
                    result_tx: result_tx.clone(),
                };
                tokio::spawn(processor.run_until_drained())
            })
            .collect();
        drop(result_tx);

        let mut labels: Vec<Option<C::Label>> = vec![None; total];
        let mut progress = ProgressState::new(total);

        while let Ok(chunk) = result_rx.recv_async().await {
            let merged = chunk.labels.len();
            for (index, label) in chunk.range.clone().zip(chunk.labels) {
                labels[index] = Some(label);
            }

            let snapshot = progress.record(merged);
            tracing::info!(
                chunk = ?chunk.range,
                "Progress: {}/{} ({:.1}%) | Rate: {:.2}/sec | ETA: {:.1} min",
                snapshot.completed,
                snapshot.total,
                snapshot.percent,
                snapshot.rate,
                snapshot.eta.as_secs_f64() / 60.0
            );
        }

        for (worker, joined) in futures::future::join_all(workers).await.into_iter().enumerate() {
            if let Err(e) = joined {
                tracing::error!(worker, error = %e, "Worker stopped abnormally");
            }
        }

        if progress.completed != total {
            bail!(
                "Only {} of {} rows were classified",
                progress.completed,
                total
            );
        }

        labels
            .into_iter()
            .enumerate()
            .map(|(index, label)| {
                label.ok_or_else(|| anyhow::anyhow!("Row {index} has no label"))
            })
            .collect()
    }
}

struct ChunkProcessor<C: Classifier> {
    worker: usize,
    rows: Arc<Vec<Row>>,
    classifier: Arc<C>,
    chunk_rx: flume::Receiver<Range<usize>>,
    result_tx: flume::Sender<ChunkResult<C::Label>>,
}

impl<C: Classifier> ChunkProcessor<C> {
    #[tracing::instrument(skip(self), fields(worker = self.worker))]
    async fn run_until_drained(self) {
        while let Ok(range) = self.chunk_rx.recv_async().await {
            let chunk_start = Instant::now();
            let mut labels = Vec::with_capacity(range.len());

            for row in &self.rows[range.clone()] {
                let label = self.classifier.classify(row.index, row.text.as_deref()).await;
                counter!("rows_classified_total").increment(1);
                labels.push(label);
            }

            tracing::debug!(
                chunk = ?range,
                processing_time_ms = chunk_start.elapsed().as_millis() as u64,
                "Chunk processed"
            );

            if self.result_tx.send_async(ChunkResult { range, labels }).await.is_err() {
                tracing::warn!("Result channel closed, dropping chunk");
                return;
            }
        }
    }
}
