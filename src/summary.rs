use std::collections::HashMap;
use std::time::Duration;

use crate::types::{Category, GenderLabel, ReviewLabels};

#[derive(Debug, Clone, PartialEq)]
pub struct Share {
    pub label: String,
    pub count: usize,
    pub percent: f64,
}

fn share(label: String, count: usize, total: usize) -> Share {
    let percent = if total > 0 {
        count as f64 * 100.0 / total as f64
    } else {
        0.0
    };
    Share {
        label,
        count,
        percent,
    }
}

/// Counts each distinct value, most frequent first. Ties keep first-seen
/// order.
fn value_counts<'a>(values: impl Iterator<Item = &'a str>, empty_as: &str) -> Vec<Share> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut total = 0;
    for value in values {
        total += 1;
        let count = counts.entry(value).or_insert(0);
        if *count == 0 {
            order.push(value);
        }
        *count += 1;
    }

    let mut shares: Vec<Share> = order
        .into_iter()
        .map(|value| {
            let label = if value.is_empty() { empty_as } else { value };
            share(label.to_string(), counts[value], total)
        })
        .collect();
    shares.sort_by(|a, b| b.count.cmp(&a.count));
    shares
}

pub fn gender_counts(labels: &[GenderLabel]) -> Vec<Share> {
    value_counts(labels.iter().map(GenderLabel::as_str), "(empty)")
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSummary {
    pub sentiment: Vec<Share>,
    /// Non-empty cells per theme column; themes nobody hit are left out.
    pub themes: Vec<Share>,
}

pub fn review_summary(labels: &[ReviewLabels]) -> ReviewSummary {
    let sentiment = value_counts(labels.iter().map(|l| l.get(Category::Sentiment)), "N/A");
    let themes = Category::ALL
        .iter()
        .filter(|c| **c != Category::Sentiment)
        .filter_map(|category| {
            let hits = labels
                .iter()
                .filter(|l| !l.get(*category).trim().is_empty())
                .count();
            (hits > 0).then(|| share(category.column().to_string(), hits, labels.len()))
        })
        .collect();
    ReviewSummary { sentiment, themes }
}

pub fn log_shares(title: &str, shares: &[Share]) {
    tracing::info!("{title}:");
    for s in shares {
        tracing::info!("  {}: {} ({:.1}%)", s.label, s.count, s.percent);
    }
}

pub fn log_timing(elapsed: Duration, rows: usize) {
    tracing::info!("Total time: {:.1} minutes", elapsed.as_secs_f64() / 60.0);
    if rows > 0 {
        tracing::info!(
            "Average: {:.2} seconds per row",
            elapsed.as_secs_f64() / rows as f64
        );
    }
}
