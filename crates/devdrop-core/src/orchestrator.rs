//! Evaluation orchestrator
//!
//! Drives single-pair and batch evaluations:
//! aggregate commits, store the commit detail, score, validate, persist.
//!
//! ## Retry policy
//!
//! A batch retries a pair only when its failure is retryable (see
//! [`DevdropError::is_retryable`]). With the defaults a pair gets at most
//! four attempts, sleeping 2s, 4s and 8s between them.
//!
//! ## Batch boundary
//!
//! Per-pair failures are recorded in the report and the batch moves on.
//! A persistence failure, a failing unevaluated-pairs query or a panicking
//! pair stops the batch with status `failed`; pairs already written stay
//! written.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use devdrop_state::{ContributionStore, EvaluationStore, PersistenceStore};
use futures::{FutureExt, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, Instrument};

use crate::aggregator::CommitAggregator;
use crate::error::{DevdropError, Result};
use crate::host::RepositoryHost;
use crate::metrics::METRICS;
use crate::model::{BatchReport, EvaluationPair, EvaluationRecord, PairFailure};
use crate::obs;
use crate::scoring::{parse_scoring_response, ScoringAdapter, ScoringRequest};

/// Exponential backoff for retryable failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = run once).
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): base * 2^(retry-1),
    /// saturating at `Duration::MAX`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.backoff_base
            .checked_mul(2u32.saturating_pow(retry.saturating_sub(1)))
            .unwrap_or(Duration::MAX)
    }
}

/// Retry policy, per-call deadlines and batch width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub retry: RetryPolicy,
    /// Deadline for one scoring call.
    pub scoring_timeout: Duration,
    /// Deadline for aggregating one pair's commits.
    pub host_timeout: Duration,
    /// Pairs in flight during a batch; 1 runs them sequentially.
    pub batch_concurrency: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            scoring_timeout: Duration::from_secs(120),
            host_timeout: Duration::from_secs(300),
            batch_concurrency: 1,
        }
    }
}

impl OrchestratorConfig {
    /// Defaults overridden by `DEVDROP_MAX_RETRIES`,
    /// `DEVDROP_BACKOFF_BASE_SECS`, `DEVDROP_SCORING_TIMEOUT_SECS`,
    /// `DEVDROP_HOST_TIMEOUT_SECS` and `DEVDROP_BATCH_CONCURRENCY`.
    /// Unparseable values keep the default.
    pub fn from_env() -> Self {
        fn var<T: std::str::FromStr>(name: &str) -> Option<T> {
            std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
        }

        let defaults = Self::default();
        Self {
            retry: RetryPolicy {
                max_retries: var("DEVDROP_MAX_RETRIES").unwrap_or(defaults.retry.max_retries),
                backoff_base: var("DEVDROP_BACKOFF_BASE_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.retry.backoff_base),
            },
            scoring_timeout: var("DEVDROP_SCORING_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.scoring_timeout),
            host_timeout: var("DEVDROP_HOST_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.host_timeout),
            batch_concurrency: var::<usize>("DEVDROP_BATCH_CONCURRENCY")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.batch_concurrency),
        }
    }
}

/// Run `fut` under `limit`; an elapsed deadline is a non-retryable timeout.
async fn with_deadline<T>(
    operation: &str,
    limit: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| DevdropError::Timeout {
            operation: operation.to_string(),
            secs: limit.as_secs(),
        })?
}

/// The single-pair and batch evaluation driver. Collaborators are injected.
pub struct EvaluationOrchestrator {
    aggregator: CommitAggregator,
    scorer: Arc<dyn ScoringAdapter>,
    store: Arc<dyn PersistenceStore>,
    config: OrchestratorConfig,
}

impl EvaluationOrchestrator {
    pub fn new(
        host: Arc<dyn RepositoryHost>,
        scorer: Arc<dyn ScoringAdapter>,
        store: Arc<dyn PersistenceStore>,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        Ok(Self {
            aggregator: CommitAggregator::new(host)?,
            scorer,
            store,
            config,
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Evaluate one pair once, without retries, and persist the result.
    #[instrument(skip(self))]
    pub async fn evaluate_one(
        &self,
        repository: &str,
        contributor: &str,
    ) -> Result<EvaluationRecord> {
        let pair = EvaluationPair::new(repository, contributor);
        obs::emit_evaluation_started(&pair);

        let profile = with_deadline(
            "commit aggregation",
            self.config.host_timeout,
            self.aggregator.aggregate(repository, contributor),
        )
        .await?;

        self.store
            .upsert_contribution_detail(&profile.repository, &profile.contributor, &profile.commits)
            .await?;

        let request = ScoringRequest::for_profile(&profile)?;
        let raw = with_deadline(
            "scoring",
            self.config.scoring_timeout,
            self.scorer.score(&request).map(|r| r.map_err(DevdropError::from)),
        )
        .await?;
        let scored = parse_scoring_response(&raw)?;

        let record = self
            .store
            .upsert_evaluation(
                &profile.repository,
                &profile.contributor,
                scored.reward_points,
                &scored.justification,
            )
            .await?;

        obs::emit_evaluation_succeeded(&pair, record.reward_points, profile.commits.len());
        Ok(record)
    }

    /// `evaluate_one` under the retry policy. Returns the outcome and the
    /// number of attempts made.
    pub async fn evaluate_with_retry(
        &self,
        pair: &EvaluationPair,
    ) -> (Result<EvaluationRecord>, u32) {
        let max_attempts = self.config.retry.max_retries + 1;
        let mut attempt = 1;
        loop {
            match self.evaluate_one(&pair.repository, &pair.contributor).await {
                Ok(record) => return (Ok(record), attempt),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.config.retry.delay_for(attempt);
                    obs::emit_retry_scheduled(pair, attempt, delay, &e);
                    METRICS.inc_retries();
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return (Err(e), attempt),
            }
        }
    }

    /// Evaluate every pair with contribution data and no evaluation yet,
    /// using the configured concurrency.
    pub async fn evaluate_all(&self) -> BatchReport {
        self.evaluate_all_with_concurrency(self.config.batch_concurrency)
            .await
    }

    /// Like [`evaluate_all`](Self::evaluate_all) with an explicit number of
    /// pairs in flight. Never fails; see the report's `status`.
    pub async fn evaluate_all_with_concurrency(&self, concurrency: usize) -> BatchReport {
        let report = BatchReport::start();
        let span = obs::batch_span(&report.batch_id.to_string());
        let report = self
            .run_batch(report, concurrency.max(1))
            .instrument(span)
            .await;
        obs::emit_batch_finished(&report);
        report
    }

    async fn run_batch(&self, mut report: BatchReport, concurrency: usize) -> BatchReport {
        obs::emit_batch_started(&report.batch_id.to_string(), concurrency);

        let pairs = match self.store.find_unevaluated_pairs().await {
            Ok(pairs) => pairs,
            Err(e) => return report.finish(Some(format!("unevaluated pairs query failed: {e}"))),
        };
        report.total = pairs.len();
        info!(pairs = report.total, "pending pairs selected");

        let mut outcomes = futures::stream::iter(pairs)
            .map(|pair| async move {
                let outcome = AssertUnwindSafe(self.evaluate_with_retry(&pair))
                    .catch_unwind()
                    .await;
                (pair, outcome)
            })
            .buffer_unordered(concurrency);

        let mut escaped = None;
        while let Some((pair, outcome)) = outcomes.next().await {
            report.processed += 1;
            match outcome {
                Ok((Ok(_), _)) => {
                    report.succeeded += 1;
                    METRICS.inc_evaluated();
                }
                Ok((Err(e), attempts)) if e.is_fatal_to_batch() => {
                    obs::emit_evaluation_failed(&pair, attempts, &e);
                    METRICS.inc_failed();
                    escaped = Some(format!("{pair}: {e}"));
                    break;
                }
                Ok((Err(e), attempts)) => {
                    obs::emit_evaluation_failed(&pair, attempts, &e);
                    METRICS.inc_failed();
                    report.failures.push(PairFailure {
                        repository: pair.repository,
                        contributor: pair.contributor,
                        error: e.to_string(),
                        attempts,
                    });
                }
                Err(_panic) => {
                    METRICS.inc_failed();
                    escaped = Some(format!("{pair}: evaluation panicked"));
                    break;
                }
            }
        }

        report.finish(escaped)
    }
}
