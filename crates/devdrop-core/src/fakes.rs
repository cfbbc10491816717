//! Scripted adapters for testing
//!
//! `ScriptedHost` serves repositories, contributors, commits and issues from
//! fixed tables. `ScriptedScorer` replays queued responses per contributor.
//! Both count calls so tests can assert retry behaviour.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::{HostError, ScoringError};
use crate::host::{CommitDetail, HostResult, Repository, RepositoryHost};
use crate::model::ContributorSummary;
use crate::scoring::{ScoringAdapter, ScoringRequest};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Build a commit detail with full diff stats.
pub fn commit(
    sha: &str,
    message: &str,
    additions: u64,
    deletions: u64,
    files: u64,
) -> CommitDetail {
    CommitDetail {
        sha: sha.to_string(),
        message: message.to_string(),
        additions: Some(additions),
        deletions: Some(deletions),
        files_changed: files,
    }
}

// ---------------------------------------------------------------------------
// ScriptedHost
// ---------------------------------------------------------------------------

/// Repository host backed by fixed tables, keyed by short repository name.
#[derive(Default)]
pub struct ScriptedHost {
    repositories: Vec<Repository>,
    contributors: HashMap<String, Vec<ContributorSummary>>,
    commits: HashMap<(String, String), Vec<CommitDetail>>,
    issues: HashMap<(String, u64), Vec<String>>,
    failing_commits: HashMap<String, HostError>,
    failing_authors: HashMap<String, HostError>,
    commit_listings: AtomicU32,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repository(mut self, owner: &str, name: &str) -> Self {
        self.repositories.push(Repository {
            name: name.to_string(),
            full_name: format!("{owner}/{name}"),
        });
        self
    }

    pub fn with_contributor(mut self, repo: &str, login: &str, contributions: u64) -> Self {
        self.contributors
            .entry(repo.to_string())
            .or_default()
            .push(ContributorSummary {
                login: login.to_string(),
                contributions,
                issues: 0,
                pull_requests: 0,
            });
        self
    }

    pub fn with_commit(mut self, repo: &str, author: &str, detail: CommitDetail) -> Self {
        self.commits
            .entry((repo.to_string(), author.to_string()))
            .or_default()
            .push(detail);
        self
    }

    pub fn with_issue(mut self, repo: &str, number: u64, labels: &[&str]) -> Self {
        self.issues.insert(
            (repo.to_string(), number),
            labels.iter().map(|l| l.to_string()).collect(),
        );
        self
    }

    /// `get_commit` for `sha` fails with `error`.
    pub fn with_failing_commit(mut self, sha: &str, error: HostError) -> Self {
        self.failing_commits.insert(sha.to_string(), error);
        self
    }

    /// Listing commits by `author` fails with `error`.
    pub fn with_failing_author(mut self, author: &str, error: HostError) -> Self {
        self.failing_authors.insert(author.to_string(), error);
        self
    }

    /// Number of `list_commit_shas` calls so far.
    pub fn commit_listings(&self) -> u32 {
        self.commit_listings.load(Ordering::SeqCst)
    }

    fn commits_for(&self, repo: &Repository, author: &str) -> &[CommitDetail] {
        self.commits
            .get(&(repo.name.clone(), author.to_string()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[async_trait]
impl RepositoryHost for ScriptedHost {
    async fn list_repositories(&self) -> HostResult<Vec<Repository>> {
        Ok(self.repositories.clone())
    }

    async fn list_contributors(&self, repo: &Repository) -> HostResult<Vec<ContributorSummary>> {
        Ok(self.contributors.get(&repo.name).cloned().unwrap_or_default())
    }

    async fn list_commit_shas(&self, repo: &Repository, author: &str) -> HostResult<Vec<String>> {
        self.commit_listings.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failing_authors.get(author) {
            return Err(err.clone());
        }
        Ok(self
            .commits_for(repo, author)
            .iter()
            .map(|c| c.sha.clone())
            .collect())
    }

    async fn get_commit(&self, repo: &Repository, sha: &str) -> HostResult<CommitDetail> {
        if let Some(err) = self.failing_commits.get(sha) {
            return Err(err.clone());
        }
        self.commits
            .iter()
            .filter(|((name, _), _)| *name == repo.name)
            .flat_map(|(_, details)| details)
            .find(|c| c.sha == sha)
            .cloned()
            .ok_or_else(|| {
                HostError::with_status(format!("No commit found for SHA: {sha}"), 422, false)
            })
    }

    async fn get_issue_labels(&self, repo: &Repository, number: u64) -> HostResult<Vec<String>> {
        self.issues
            .get(&(repo.name.clone(), number))
            .cloned()
            .ok_or_else(|| HostError::with_status("Not Found", 404, false))
    }
}

// ---------------------------------------------------------------------------
// ScriptedScorer
// ---------------------------------------------------------------------------

/// Scoring adapter replaying queued responses per contributor, falling back
/// to a default response once a contributor's queue is empty.
pub struct ScriptedScorer {
    fallback: Option<Result<String, ScoringError>>,
    queued: Mutex<HashMap<String, VecDeque<Result<String, ScoringError>>>>,
    requests: Mutex<Vec<ScoringRequest>>,
    calls: AtomicU32,
}

impl ScriptedScorer {
    /// Answer every request with `response`.
    pub fn always(response: &str) -> Self {
        Self::with_fallback(Some(Ok(response.to_string())))
    }

    /// Fail every request with `error`.
    pub fn failing(error: ScoringError) -> Self {
        Self::with_fallback(Some(Err(error)))
    }

    /// Never answer; the call only ends when its deadline fires.
    pub fn hanging() -> Self {
        Self::with_fallback(None)
    }

    fn with_fallback(fallback: Option<Result<String, ScoringError>>) -> Self {
        Self {
            fallback,
            queued: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }

    /// Queue one response for `contributor`.
    pub fn respond(self, contributor: &str, response: Result<&str, ScoringError>) -> Self {
        lock(&self.queued)
            .entry(contributor.to_string())
            .or_default()
            .push_back(response.map(str::to_string));
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ScoringRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl ScoringAdapter for ScriptedScorer {
    async fn score(&self, request: &ScoringRequest) -> Result<String, ScoringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request.clone());

        let queued = lock(&self.queued)
            .get_mut(&request.contributor)
            .and_then(VecDeque::pop_front);
        match queued.or_else(|| self.fallback.clone()) {
            Some(response) => response,
            None => std::future::pending().await,
        }
    }
}
