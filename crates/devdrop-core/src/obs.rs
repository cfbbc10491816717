//! Structured lifecycle events for evaluations, batches and distributions.
//!
//! Every event carries an `event` field (`evaluation.started`,
//! `batch.finished`, ...) so JSON logs can be filtered by kind.

use std::time::Duration;

use tracing::{info, warn};

use crate::model::{BatchReport, EvaluationPair};

/// Span tagging everything a batch does with its id.
pub fn batch_span(batch_id: &str) -> tracing::Span {
    tracing::info_span!("devdrop.batch", batch_id = %batch_id)
}

pub fn emit_evaluation_started(pair: &EvaluationPair) {
    info!(
        event = "evaluation.started",
        repository = %pair.repository,
        contributor = %pair.contributor
    );
}

pub fn emit_evaluation_succeeded(pair: &EvaluationPair, reward_points: f64, commits: usize) {
    info!(
        event = "evaluation.succeeded",
        repository = %pair.repository,
        contributor = %pair.contributor,
        reward_points,
        commits
    );
}

pub fn emit_evaluation_failed(pair: &EvaluationPair, attempts: u32, error: &dyn std::fmt::Display) {
    warn!(
        event = "evaluation.failed",
        repository = %pair.repository,
        contributor = %pair.contributor,
        attempts,
        error = %error
    );
}

/// A retryable failure; the pair sleeps for `delay` before the next attempt.
pub fn emit_retry_scheduled(
    pair: &EvaluationPair,
    attempt: u32,
    delay: Duration,
    error: &dyn std::fmt::Display,
) {
    warn!(
        event = "evaluation.retry_scheduled",
        repository = %pair.repository,
        contributor = %pair.contributor,
        attempt,
        delay_secs = delay.as_secs_f64(),
        error = %error
    );
}

pub fn emit_batch_started(batch_id: &str, concurrency: usize) {
    info!(event = "batch.started", batch_id = %batch_id, concurrency);
}

pub fn emit_batch_finished(report: &BatchReport) {
    let duration_ms = (report.finished_at - report.started_at).num_milliseconds();
    info!(
        event = "batch.finished",
        batch_id = %report.batch_id,
        status = ?report.status,
        total = report.total,
        processed = report.processed,
        succeeded = report.succeeded,
        failed = report.failures.len(),
        duration_ms
    );
}

pub fn emit_distribution_computed(
    repository: &str,
    total_tokens: u64,
    contributors: usize,
    sum_points: f64,
) {
    info!(
        event = "distribution.computed",
        repository = %repository,
        total_tokens,
        contributors,
        sum_points
    );
}
