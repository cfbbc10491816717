//! Commit aggregation
//!
//! Turns one contributor's commit history in one repository into a
//! [`ContributionProfile`]. Read-only; the orchestrator decides what gets
//! persisted.

use std::collections::BTreeSet;
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::error::{DevdropError, Result};
use crate::host::{resolve_repository, CommitDetail, Repository, RepositoryHost};
use crate::model::{repository_key, CommitMetric, ContributionProfile};

/// Message patterns for issue closure and issue references.
#[derive(Debug, Clone)]
pub struct CommitClassifier {
    closes: Regex,
    references: Regex,
}

impl CommitClassifier {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| DevdropError::InvalidInput(e.to_string()))
        };
        Ok(Self {
            closes: compile(r"(?i)closes\s+#\d+")?,
            references: compile(r"(?i)(?:fixes|closes)\s+#(\d+)")?,
        })
    }

    /// True iff the message closes an issue (`closes #N`).
    pub fn closes_issue(&self, message: &str) -> bool {
        self.closes.is_match(message)
    }

    /// Issue numbers referenced via `fixes #N` or `closes #N`, deduplicated
    /// in first-seen order.
    pub fn referenced_issues(&self, message: &str) -> Vec<u64> {
        let mut seen = BTreeSet::new();
        self.references
            .captures_iter(message)
            .filter_map(|caps| caps.get(1)?.as_str().parse::<u64>().ok())
            .filter(|n| seen.insert(*n))
            .collect()
    }
}

/// Builds contribution profiles from a repository host.
pub struct CommitAggregator {
    host: Arc<dyn RepositoryHost>,
    classifier: CommitClassifier,
}

impl CommitAggregator {
    pub fn new(host: Arc<dyn RepositoryHost>) -> Result<Self> {
        Ok(Self {
            host,
            classifier: CommitClassifier::new()?,
        })
    }

    /// Aggregate every commit `contributor` authored in `repository`.
    ///
    /// A commit whose detail cannot be fetched is skipped unless the failure
    /// is retryable, in which case the whole aggregation fails so the caller
    /// can back off. Unfetchable referenced issues are always skipped.
    #[instrument(skip(self))]
    pub async fn aggregate(
        &self,
        repository: &str,
        contributor: &str,
    ) -> Result<ContributionProfile> {
        let repo = resolve_repository(self.host.as_ref(), repository).await?;
        let shas = self.host.list_commit_shas(&repo, contributor).await?;
        debug!(commits = shas.len(), "commit listing received");

        let mut commits = Vec::with_capacity(shas.len());
        for sha in &shas {
            let detail = match self.host.get_commit(&repo, sha).await {
                Ok(detail) => detail,
                Err(e) if e.retryable => return Err(e.into()),
                Err(e) => {
                    warn!(sha = %sha, error = %e, "skipping commit without detail");
                    continue;
                }
            };
            commits.push(self.process_commit(&repo, detail).await);
        }

        Ok(ContributionProfile {
            repository: repository_key(&repo.name),
            contributor: contributor.to_string(),
            commits,
        })
    }

    async fn process_commit(&self, repo: &Repository, detail: CommitDetail) -> CommitMetric {
        let message = detail.message.trim().to_string();

        let mut labels = BTreeSet::new();
        for number in self.classifier.referenced_issues(&message) {
            match self.host.get_issue_labels(repo, number).await {
                Ok(found) => labels.extend(found),
                Err(e) => debug!(issue = number, error = %e, "referenced issue skipped"),
            }
        }

        CommitMetric {
            closes_issue: self.classifier.closes_issue(&message),
            lines_changed: detail.additions.unwrap_or(0) + detail.deletions.unwrap_or(0),
            files_changed: detail.files_changed,
            referenced_issue_labels: labels,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use crate::fakes::{commit, ScriptedHost};

    fn classifier() -> CommitClassifier {
        CommitClassifier::new().unwrap()
    }

    #[test]
    fn closes_sets_flag_and_is_referenced() {
        let c = classifier();
        assert!(c.closes_issue("closes #42"));
        assert!(c.closes_issue("Refactor parser, CLOSES   #7"));
        assert_eq!(c.referenced_issues("closes #42"), vec![42]);
    }

    #[test]
    fn fixes_is_referenced_but_does_not_close() {
        let c = classifier();
        assert!(!c.closes_issue("fixes #42, please review"));
        assert_eq!(c.referenced_issues("fixes #42, please review"), vec![42]);
    }

    #[test]
    fn references_are_deduplicated_in_order() {
        let c = classifier();
        assert_eq!(
            c.referenced_issues("Fixes #3 and closes #1, fixes #3 again"),
            vec![3, 1]
        );
        assert!(c.referenced_issues("see #12").is_empty());
        assert!(!c.closes_issue("closes#12"));
    }

    #[tokio::test]
    async fn absent_diff_stats_count_as_zero() {
        let host = ScriptedHost::new()
            .with_repository("octo", "devdrop")
            .with_commit(
                "devdrop",
                "alice",
                CommitDetail {
                    sha: "a1".into(),
                    message: "merge upstream".into(),
                    additions: None,
                    deletions: Some(4),
                    files_changed: 1,
                },
            )
            .with_commit(
                "devdrop",
                "alice",
                CommitDetail {
                    sha: "a2".into(),
                    message: "empty".into(),
                    additions: None,
                    deletions: None,
                    files_changed: 0,
                },
            );
        let aggregator = CommitAggregator::new(Arc::new(host)).unwrap();

        let profile = aggregator.aggregate("devdrop", "alice").await.unwrap();
        assert_eq!(profile.commits[0].lines_changed, 4);
        assert_eq!(profile.commits[1].lines_changed, 0);
    }

    #[tokio::test]
    async fn labels_are_collected_and_missing_issues_skipped() {
        let host = ScriptedHost::new()
            .with_repository("octo", "devdrop")
            .with_issue("devdrop", 42, &["bug", "good first issue"])
            .with_commit(
                "devdrop",
                "alice",
                commit("a1", "  fixes #42, closes #404  \n", 30, 5, 3),
            );
        let aggregator = CommitAggregator::new(Arc::new(host)).unwrap();

        let profile = aggregator.aggregate("DEVDROP", "alice").await.unwrap();
        assert_eq!(profile.repository, "devdrop");
        let metric = &profile.commits[0];
        assert_eq!(metric.message, "fixes #42, closes #404");
        assert!(metric.closes_issue);
        assert_eq!(metric.lines_changed, 35);
        assert_eq!(metric.files_changed, 3);
        assert_eq!(
            metric.referenced_issue_labels,
            BTreeSet::from(["bug".to_string(), "good first issue".to_string()])
        );
    }

    #[tokio::test]
    async fn unfetchable_commit_is_skipped_unless_rate_limited() {
        let host = ScriptedHost::new()
            .with_repository("octo", "devdrop")
            .with_commit("devdrop", "alice", commit("a1", "first", 1, 0, 1))
            .with_commit("devdrop", "alice", commit("a2", "second", 1, 0, 1))
            .with_failing_commit("a1", HostError::with_status("Server Error", 500, false));
        let aggregator = CommitAggregator::new(Arc::new(host)).unwrap();
        let profile = aggregator.aggregate("devdrop", "alice").await.unwrap();
        assert_eq!(profile.commits.len(), 1);
        assert_eq!(profile.commits[0].message, "second");

        let host = ScriptedHost::new()
            .with_repository("octo", "devdrop")
            .with_commit("devdrop", "alice", commit("a1", "first", 1, 0, 1))
            .with_failing_commit("a1", HostError::rate_limited("API rate limit exceeded"));
        let aggregator = CommitAggregator::new(Arc::new(host)).unwrap();
        let err = aggregator.aggregate("devdrop", "alice").await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn unknown_repository_fails() {
        let aggregator = CommitAggregator::new(Arc::new(ScriptedHost::new())).unwrap();
        let err = aggregator.aggregate("nowhere", "alice").await.unwrap_err();
        assert!(matches!(err, DevdropError::RepositoryNotFound(_)));
    }
}
