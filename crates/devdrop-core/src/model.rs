//! Pipeline data model.
//!
//! Persisted record types live in `devdrop-state` and are re-exported here;
//! this module adds the transient shapes the pipeline produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use devdrop_state::{
    AirdropConfig, CommitMetric, ContributorStats, EvaluationPair, EvaluationRecord,
};

/// The key a repository's records are stored under: the short name,
/// lowercased. `owner/` prefixes and surrounding whitespace are dropped, so
/// every spelling the host resolves to the same repository maps to one key.
pub fn repository_key(name: &str) -> String {
    let name = name.trim();
    name.rsplit('/').next().unwrap_or(name).trim().to_lowercase()
}

/// Evaluation input for one pair. Built fresh per request, never persisted
/// in this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionProfile {
    pub repository: String,
    pub contributor: String,
    /// Host-reported order.
    pub commits: Vec<CommitMetric>,
}

/// One contributor's share of a repository's token pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAllocation {
    pub contributor: String,
    pub reward_points: f64,
    pub token_allocation: f64,
}

/// Result of distributing a repository's pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub repository: String,
    pub total_tokens: u64,
    pub distributions: Vec<TokenAllocation>,
}

/// A contributor as listed by the repository host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributorSummary {
    pub login: String,
    pub contributions: u64,
    pub issues: u64,
    pub pull_requests: u64,
}

impl ContributorSummary {
    pub fn stats(&self) -> ContributorStats {
        ContributorStats {
            total_contributions: self.contributions,
            total_issues: self.issues,
            total_prs: self.pull_requests,
        }
    }
}

/// Outcome of a contributor sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Each synced repository with the contributors stored for it.
    pub repositories: Vec<SyncedRepository>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncedRepository {
    pub repository: String,
    pub contributors: Vec<ContributorSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Completed,
    Failed,
}

/// A pair that ended in failure during a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairFailure {
    pub repository: String,
    pub contributor: String,
    pub error: String,
    pub attempts: u32,
}

/// Summary of one `evaluate_all` run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub status: BatchStatus,
    /// Pairs returned by the unevaluated-pairs query.
    pub total: usize,
    /// Pairs attempted, whether they succeeded or failed.
    pub processed: usize,
    pub succeeded: usize,
    pub failures: Vec<PairFailure>,
    /// Set when a failure escaped the per-pair boundary.
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    pub(crate) fn start() -> Self {
        let now = Utc::now();
        Self {
            batch_id: Uuid::new_v4(),
            status: BatchStatus::Completed,
            total: 0,
            processed: 0,
            succeeded: 0,
            failures: Vec::new(),
            error: None,
            started_at: now,
            finished_at: now,
        }
    }

    pub(crate) fn finish(mut self, error: Option<String>) -> Self {
        if error.is_some() {
            self.status = BatchStatus::Failed;
        }
        self.error = error;
        self.finished_at = Utc::now();
        self
    }
}
