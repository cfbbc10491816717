//! Storage trait definitions for DevDrop
//!
//! These traits define the persistence operations the pipeline consumes:
//! - `ContributionStore`: per-contributor contribution data (stats + commit detail)
//! - `EvaluationStore`: evaluation results keyed by (repository, contributor)
//! - `AirdropConfigStore`: one airdrop configuration per repository
//!
//! Every operation is atomic per call. All traits are async and
//! backend-agnostic. In-memory fakes are provided for testing via the
//! `fakes` module.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// Shared record types
// ---------------------------------------------------------------------------

/// A (repository, contributor) combination, the unit of evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EvaluationPair {
    pub repository: String,
    pub contributor: String,
}

impl EvaluationPair {
    pub fn new(repository: impl Into<String>, contributor: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            contributor: contributor.into(),
        }
    }
}

impl std::fmt::Display for EvaluationPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.contributor, self.repository)
    }
}

/// One evaluated commit, derived purely from host data.
///
/// Field names on the wire follow the host payload the scoring prompt and
/// the stored commit detail share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMetric {
    #[serde(rename = "commitMessage")]
    pub message: String,
    /// additions + deletions
    #[serde(rename = "linesChanged")]
    pub lines_changed: u64,
    #[serde(rename = "filesChanged")]
    pub files_changed: u64,
    /// True iff the message contains `closes #N` (case-insensitive).
    #[serde(rename = "closesIssue")]
    pub closes_issue: bool,
    /// Labels of issues referenced via `fixes #N` / `closes #N`.
    #[serde(rename = "issueLabels", default)]
    pub referenced_issue_labels: BTreeSet<String>,
}

/// Basic contributor statistics reported by the repository host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorStats {
    pub total_contributions: u64,
    pub total_issues: u64,
    pub total_prs: u64,
}

/// Stored contribution data for one contributor in one repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionRecord {
    pub repository: String,
    pub contributor: String,
    pub basic_info: Option<ContributorStats>,
    pub detailed_commits: Option<Vec<CommitMetric>>,
    pub last_updated: DateTime<Utc>,
}

/// A persisted evaluation. Unique per (repository, contributor); last write wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub repository: String,
    pub contributor: String,
    pub reward_points: f64,
    pub justification: String,
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationRecord {
    pub fn pair(&self) -> EvaluationPair {
        EvaluationPair::new(self.repository.clone(), self.contributor.clone())
    }
}

/// Airdrop configuration, one per repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirdropConfig {
    pub repository: String,
    pub airdrop_date: NaiveDate,
    pub total_tokens: u64,
}

/// Reject reward points the store must never hold (negative, NaN, infinite).
pub fn validate_reward_points(
    repository: &str,
    contributor: &str,
    reward_points: f64,
) -> StorageResult<()> {
    if !reward_points.is_finite() || reward_points < 0.0 {
        return Err(StorageError::InvalidRecord {
            repository: repository.to_string(),
            contributor: contributor.to_string(),
            reason: format!("reward_points must be a finite non-negative number, got {reward_points}"),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ContributionStore
// ---------------------------------------------------------------------------

/// Per-contributor contribution data.
///
/// Guarantees:
/// - Both upserts create the record when absent.
/// - Each upsert only touches its own fields: storing stats never clobbers
///   commit detail and vice versa.
#[async_trait]
pub trait ContributionStore: Send + Sync {
    /// Insert or update the contributor's basic statistics.
    async fn upsert_contributor_stats(
        &self,
        repository: &str,
        contributor: &str,
        stats: ContributorStats,
    ) -> StorageResult<()>;

    /// Merge detailed commit metrics into the contributor's record.
    async fn upsert_contribution_detail(
        &self,
        repository: &str,
        contributor: &str,
        commits: &[CommitMetric],
    ) -> StorageResult<()>;

    /// Read a contributor's stored record, if any.
    async fn get_contribution(
        &self,
        repository: &str,
        contributor: &str,
    ) -> StorageResult<Option<ContributionRecord>>;
}

// ---------------------------------------------------------------------------
// EvaluationStore
// ---------------------------------------------------------------------------

/// Evaluation result persistence.
///
/// Guarantees:
/// - `upsert_evaluation` inserts or overwrites by (repository, contributor)
///   and refreshes `evaluated_at`.
/// - `find_unevaluated_pairs` is the set difference between contribution
///   records and evaluation records, ordered by (repository, contributor).
/// - `list_evaluations` is ordered by contributor.
#[async_trait]
pub trait EvaluationStore: Send + Sync {
    async fn upsert_evaluation(
        &self,
        repository: &str,
        contributor: &str,
        reward_points: f64,
        justification: &str,
    ) -> StorageResult<EvaluationRecord>;

    async fn get_evaluation(
        &self,
        repository: &str,
        contributor: &str,
    ) -> StorageResult<Option<EvaluationRecord>>;

    async fn find_unevaluated_pairs(&self) -> StorageResult<Vec<EvaluationPair>>;

    async fn list_evaluations(&self, repository: &str) -> StorageResult<Vec<EvaluationRecord>>;

    async fn sum_evaluated_points(&self, repository: &str) -> StorageResult<f64>;
}

// ---------------------------------------------------------------------------
// AirdropConfigStore
// ---------------------------------------------------------------------------

/// Per-repository airdrop configuration.
#[async_trait]
pub trait AirdropConfigStore: Send + Sync {
    /// Insert or replace the configuration for `config.repository`.
    async fn upsert_airdrop_config(&self, config: &AirdropConfig) -> StorageResult<()>;

    async fn get_airdrop_config(&self, repository: &str) -> StorageResult<Option<AirdropConfig>>;
}

/// The full store surface consumed by the pipeline.
pub trait PersistenceStore: ContributionStore + EvaluationStore + AirdropConfigStore {}

impl<T> PersistenceStore for T where T: ContributionStore + EvaluationStore + AirdropConfigStore + ?Sized
{}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_metric_uses_host_field_names() {
        let metric = CommitMetric {
            message: "closes #4".to_string(),
            lines_changed: 12,
            files_changed: 2,
            closes_issue: true,
            referenced_issue_labels: BTreeSet::from(["bug".to_string()]),
        };
        let json = serde_json::to_value(&metric).unwrap();
        assert_eq!(json["commitMessage"], "closes #4");
        assert_eq!(json["linesChanged"], 12);
        assert_eq!(json["closesIssue"], true);
        assert_eq!(json["issueLabels"][0], "bug");
    }

    #[test]
    fn negative_and_nan_points_are_rejected() {
        assert!(validate_reward_points("r", "c", -0.5).is_err());
        assert!(validate_reward_points("r", "c", f64::NAN).is_err());
        assert!(validate_reward_points("r", "c", f64::INFINITY).is_err());
        assert!(validate_reward_points("r", "c", 0.0).is_ok());
    }

    #[test]
    fn pair_display_is_contributor_at_repository() {
        let pair = EvaluationPair::new("devdrop", "alice");
        assert_eq!(pair.to_string(), "alice@devdrop");
    }
}
