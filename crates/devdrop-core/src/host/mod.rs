//! Repository host adapter
//!
//! Read-only access to repositories, contributors, commits and issues.
//! [`github::GitHubHost`] talks to the GitHub REST API; tests use the
//! scripted host in [`crate::fakes`].

pub mod github;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{DevdropError, HostError};
use crate::model::ContributorSummary;

pub use github::{GitHubConfig, GitHubHost};

/// Result type for host adapter calls
pub type HostResult<T> = std::result::Result<T, HostError>;

/// A repository visible to the acting credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Short name as spelled by the host.
    pub name: String,
    /// `owner/name`, the path host calls use.
    pub full_name: String,
}

/// Full detail of one commit. Absent diff stats stay `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitDetail {
    pub sha: String,
    pub message: String,
    pub additions: Option<u64>,
    pub deletions: Option<u64>,
    pub files_changed: u64,
}

#[async_trait]
pub trait RepositoryHost: Send + Sync {
    async fn list_repositories(&self) -> HostResult<Vec<Repository>>;

    async fn list_contributors(&self, repo: &Repository) -> HostResult<Vec<ContributorSummary>>;

    /// SHAs of commits authored by `author`, in host order.
    async fn list_commit_shas(&self, repo: &Repository, author: &str) -> HostResult<Vec<String>>;

    async fn get_commit(&self, repo: &Repository, sha: &str) -> HostResult<CommitDetail>;

    async fn get_issue_labels(&self, repo: &Repository, number: u64) -> HostResult<Vec<String>>;
}

/// Resolve `name` (short or `owner/name`, case-insensitive) among the
/// repositories visible to the host credential.
pub async fn resolve_repository(
    host: &dyn RepositoryHost,
    name: &str,
) -> crate::Result<Repository> {
    let wanted = name.trim().to_lowercase();
    host.list_repositories()
        .await?
        .into_iter()
        .find(|repo| repo.name.to_lowercase() == wanted || repo.full_name.to_lowercase() == wanted)
        .ok_or_else(|| DevdropError::RepositoryNotFound(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedHost;

    #[tokio::test]
    async fn resolution_ignores_case_and_accepts_full_name() {
        let host = ScriptedHost::new().with_repository("octo", "DevDrop");

        let repo = resolve_repository(&host, "devdrop").await.unwrap();
        assert_eq!(repo.name, "DevDrop");
        assert_eq!(repo.full_name, "octo/DevDrop");

        let repo = resolve_repository(&host, "OCTO/devdrop").await.unwrap();
        assert_eq!(repo.name, "DevDrop");
    }

    #[tokio::test]
    async fn unknown_repository_is_not_found() {
        let host = ScriptedHost::new().with_repository("octo", "devdrop");
        let err = resolve_repository(&host, "missing").await.unwrap_err();
        assert!(matches!(err, DevdropError::RepositoryNotFound(name) if name == "missing"));
    }
}
