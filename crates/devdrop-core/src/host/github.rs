//! GitHub REST API host adapter
//!
//! Lists repositories of the authenticated user and reads contributors,
//! commits and issues. Every failed response becomes a [`HostError`] whose
//! `retryable` flag reflects GitHub's throttling signals: HTTP 429, or 403
//! with `x-ratelimit-remaining: 0`. Other failures fall back to a text
//! match on the response message.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{CommitDetail, HostResult, Repository, RepositoryHost};
use crate::error::{is_rate_limit_message, HostError};
use crate::model::ContributorSummary;

const DEFAULT_API_URL: &str = "https://api.github.com";
const PER_PAGE: usize = 100;

/// GitHub connection settings
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// API base URL
    pub api_url: String,
    /// Personal access token; anonymous when absent
    pub token: Option<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        GitHubConfig {
            api_url: std::env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
        }
    }
}

impl GitHubConfig {
    /// Reads `GITHUB_API_URL` and `GITHUB_TOKEN`.
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn new(api_url: &str) -> Self {
        GitHubConfig {
            api_url: api_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }
}

// -- wire shapes -------------------------------------------------------------

#[derive(Deserialize)]
struct RepoPayload {
    name: String,
    full_name: String,
}

#[derive(Deserialize)]
struct UserRef {
    login: String,
}

#[derive(Deserialize)]
struct ContributorPayload {
    login: Option<String>,
    #[serde(default)]
    contributions: u64,
}

#[derive(Deserialize)]
struct IssuePayload {
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct PullPayload {
    user: Option<UserRef>,
}

#[derive(Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Deserialize)]
struct CommitPayload {
    sha: String,
    commit: CommitBody,
    #[serde(default)]
    stats: Option<CommitStats>,
    #[serde(default)]
    files: Vec<serde_json::Value>,
}

/// Later pages of a commit only matter for their file list.
#[derive(Deserialize)]
struct CommitFilesPage {
    #[serde(default)]
    files: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct CommitBody {
    message: String,
}

#[derive(Deserialize)]
struct CommitStats {
    additions: Option<u64>,
    deletions: Option<u64>,
}

#[derive(Deserialize)]
struct LabelledIssue {
    #[serde(default)]
    labels: Vec<Label>,
}

#[derive(Deserialize)]
struct Label {
    name: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

// -- client ------------------------------------------------------------------

/// GitHub REST client implementing [`RepositoryHost`].
pub struct GitHubHost {
    config: GitHubConfig,
    http_client: reqwest::Client,
}

impl GitHubHost {
    pub fn new(config: GitHubConfig) -> HostResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("devdrop/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(GitHubHost {
            config,
            http_client,
        })
    }

    pub fn from_env() -> HostResult<Self> {
        Self::new(GitHubConfig::from_env())
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> HostResult<Response> {
        let url = format!("{}{}", self.config.api_url, path);
        let mut request = self
            .http_client
            .get(&url)
            .header(ACCEPT, "application/vnd.github+json")
            .query(query);
        if let Some(token) = &self.config.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = request.send().await?;
        check_response(path, response).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> HostResult<T> {
        Ok(self.get(path, query).await?.json::<T>().await?)
    }

    /// Follow page numbers until a short page comes back.
    async fn get_paged<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> HostResult<Vec<T>> {
        let mut items = Vec::new();
        for page in 1u32.. {
            let mut paged = query.to_vec();
            paged.extend(page_query(page));

            let batch: Vec<T> = self.get_json(path, &paged).await?;
            let short = batch.len() < PER_PAGE;
            items.extend(batch);
            if short {
                break;
            }
        }
        debug!(path, items = items.len(), "paged fetch complete");
        Ok(items)
    }

    /// Files beyond the first page of a commit. GitHub pages a commit's file
    /// list, so a large commit needs follow-up requests to be counted fully.
    async fn count_remaining_files(&self, path: &str, first_page: usize) -> HostResult<usize> {
        let mut total = 0;
        let mut last = first_page;
        let mut page = 1;
        while last >= PER_PAGE {
            page += 1;
            let next: CommitFilesPage = self.get_json(path, &page_query(page)).await?;
            last = next.files.len();
            total += last;
        }
        if page > 1 {
            debug!(path, pages = page, "commit files paged");
        }
        Ok(total)
    }

    async fn count_issues_opened(&self, repo: &Repository, login: &str) -> HostResult<u64> {
        let path = format!("/repos/{}/issues", repo.full_name);
        let issues: Vec<IssuePayload> = self
            .get_paged(
                &path,
                &[("creator", login.to_string()), ("state", "all".to_string())],
            )
            .await?;
        // The issues endpoint also returns pull requests.
        Ok(issues.iter().filter(|i| i.pull_request.is_none()).count() as u64)
    }

    async fn count_pull_requests(&self, repo: &Repository) -> HostResult<HashMap<String, u64>> {
        let path = format!("/repos/{}/pulls", repo.full_name);
        let pulls: Vec<PullPayload> = self
            .get_paged(&path, &[("state", "all".to_string())])
            .await?;
        let mut counts = HashMap::new();
        for login in pulls.into_iter().filter_map(|p| p.user.map(|u| u.login)) {
            *counts.entry(login).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

fn page_query(page: u32) -> Vec<(&'static str, String)> {
    vec![("per_page", PER_PAGE.to_string()), ("page", page.to_string())]
}

/// Turn a non-success response into a classified [`HostError`].
async fn check_response(path: &str, response: Response) -> HostResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let quota_exhausted = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0");
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.message)
        .unwrap_or(body);

    let retryable = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && quota_exhausted)
        || is_rate_limit_message(&message);

    Err(HostError::with_status(
        format!("GET {path} returned {status}: {message}"),
        status.as_u16(),
        retryable,
    ))
}

#[async_trait]
impl RepositoryHost for GitHubHost {
    #[instrument(skip(self))]
    async fn list_repositories(&self) -> HostResult<Vec<Repository>> {
        let repos: Vec<RepoPayload> = self.get_paged("/user/repos", &[]).await?;
        Ok(repos
            .into_iter()
            .map(|r| Repository {
                name: r.name,
                full_name: r.full_name,
            })
            .collect())
    }

    #[instrument(skip(self), fields(repo = %repo.full_name))]
    async fn list_contributors(&self, repo: &Repository) -> HostResult<Vec<ContributorSummary>> {
        let path = format!("/repos/{}/contributors", repo.full_name);
        let contributors: Vec<ContributorPayload> = self.get_paged(&path, &[]).await?;
        let pull_counts = self.count_pull_requests(repo).await?;

        let mut summaries = Vec::with_capacity(contributors.len());
        // Anonymous contributors have no login and cannot be evaluated.
        for contributor in contributors {
            let Some(login) = contributor.login else {
                continue;
            };
            let issues = self.count_issues_opened(repo, &login).await?;
            summaries.push(ContributorSummary {
                pull_requests: pull_counts.get(&login).copied().unwrap_or(0),
                contributions: contributor.contributions,
                issues,
                login,
            });
        }
        Ok(summaries)
    }

    #[instrument(skip(self), fields(repo = %repo.full_name))]
    async fn list_commit_shas(&self, repo: &Repository, author: &str) -> HostResult<Vec<String>> {
        let path = format!("/repos/{}/commits", repo.full_name);
        let commits: Vec<CommitRef> = self
            .get_paged(&path, &[("author", author.to_string())])
            .await?;
        Ok(commits.into_iter().map(|c| c.sha).collect())
    }

    async fn get_commit(&self, repo: &Repository, sha: &str) -> HostResult<CommitDetail> {
        let path = format!("/repos/{}/commits/{sha}", repo.full_name);
        let payload: CommitPayload = self.get_json(&path, &page_query(1)).await?;
        let first_page = payload.files.len();
        let files_changed = first_page + self.count_remaining_files(&path, first_page).await?;
        let (additions, deletions) = payload
            .stats
            .map(|s| (s.additions, s.deletions))
            .unwrap_or((None, None));
        Ok(CommitDetail {
            sha: payload.sha,
            message: payload.commit.message,
            additions,
            deletions,
            files_changed: files_changed as u64,
        })
    }

    async fn get_issue_labels(&self, repo: &Repository, number: u64) -> HostResult<Vec<String>> {
        let path = format!("/repos/{}/issues/{number}", repo.full_name);
        let issue: LabelledIssue = self.get_json(&path, &[]).await?;
        Ok(issue.labels.into_iter().map(|l| l.name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn repo() -> Repository {
        Repository {
            name: "devdrop".into(),
            full_name: "octo/devdrop".into(),
        }
    }

    fn files(n: usize) -> Vec<serde_json::Value> {
        (0..n).map(|i| json!({ "filename": format!("src/f{i}.rs") })).collect()
    }

    #[test]
    fn config_trims_trailing_slash() {
        let config = GitHubConfig::new("https://ghe.example.com/api/v3/").with_token("t0k");
        assert_eq!(config.api_url, "https://ghe.example.com/api/v3");
        assert_eq!(config.token.as_deref(), Some("t0k"));
    }

    #[test]
    fn commit_payload_tolerates_missing_stats() {
        let payload: CommitPayload = serde_json::from_value(serde_json::json!({
            "sha": "abc",
            "commit": {"message": "wip"},
            "files": [{"filename": "a.rs"}, {"filename": "b.rs"}]
        }))
        .unwrap();
        assert!(payload.stats.is_none());
        assert_eq!(payload.files.len(), 2);
    }

    #[test]
    fn client_builds_without_token() {
        let host = GitHubHost::new(GitHubConfig::new("http://localhost:1")).unwrap();
        assert!(host.config.token.is_none());
    }

    #[tokio::test]
    async fn large_commit_counts_every_file_page() {
        let server = MockServer::start().await;
        let commit_path = "/repos/octo/devdrop/commits/big";
        Mock::given(method("GET"))
            .and(path(commit_path))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sha": "big",
                "commit": {"message": "vendor everything"},
                "stats": {"additions": 5000, "deletions": 10},
                "files": files(PER_PAGE),
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(commit_path))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sha": "big",
                "commit": {"message": "vendor everything"},
                "files": files(42),
            })))
            .mount(&server)
            .await;

        let host = GitHubHost::new(GitHubConfig::new(&server.uri())).unwrap();
        let detail = host.get_commit(&repo(), "big").await.unwrap();
        assert_eq!(detail.files_changed, PER_PAGE as u64 + 42);
        assert_eq!(detail.additions, Some(5000));
    }

    #[tokio::test]
    async fn small_commit_is_a_single_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/devdrop/commits/small"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sha": "small",
                "commit": {"message": "fix typo"},
                "files": files(3),
            })))
            .expect(1)
            .mount(&server)
            .await;

        let host = GitHubHost::new(GitHubConfig::new(&server.uri())).unwrap();
        let detail = host.get_commit(&repo(), "small").await.unwrap();
        assert_eq!(detail.files_changed, 3);
        assert_eq!(detail.additions, None);
    }

    #[tokio::test]
    async fn exhausted_quota_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/devdrop/commits/limited"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("x-ratelimit-remaining", "0")
                    .set_body_json(json!({"message": "You have exceeded a secondary quota"})),
            )
            .mount(&server)
            .await;

        let host = GitHubHost::new(GitHubConfig::new(&server.uri())).unwrap();
        let err = host.get_commit(&repo(), "limited").await.unwrap_err();
        assert!(err.retryable);
        assert_eq!(err.status, Some(403));
    }
}
