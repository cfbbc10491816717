//! Contributor sync: stores each contributor's basic statistics, which is
//! what makes a (repository, contributor) pair eligible for evaluation.

use devdrop_state::{ContributionStore, PersistenceStore};
use tracing::{info, instrument};

use crate::error::Result;
use crate::host::{resolve_repository, Repository, RepositoryHost};
use crate::model::{repository_key, SyncReport, SyncedRepository};

/// Sync one repository, or every repository visible to the host credential
/// when `repository` is `None`. Stored commit detail is left untouched.
#[instrument(skip(host, store))]
pub async fn sync_contributors(
    host: &dyn RepositoryHost,
    store: &dyn PersistenceStore,
    repository: Option<&str>,
) -> Result<SyncReport> {
    let targets = match repository {
        Some(name) => vec![resolve_repository(host, name).await?],
        None => host.list_repositories().await?,
    };

    let mut repositories = Vec::with_capacity(targets.len());
    for repo in targets {
        repositories.push(sync_repository(host, store, repo).await?);
    }
    Ok(SyncReport { repositories })
}

async fn sync_repository(
    host: &dyn RepositoryHost,
    store: &dyn PersistenceStore,
    repo: Repository,
) -> Result<SyncedRepository> {
    let key = repository_key(&repo.name);
    let contributors = host.list_contributors(&repo).await?;
    for contributor in &contributors {
        store
            .upsert_contributor_stats(&key, &contributor.login, contributor.stats())
            .await?;
    }
    info!(
        repository = %key,
        contributors = contributors.len(),
        "contributors synced"
    );
    Ok(SyncedRepository {
        repository: key,
        contributors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DevdropError;
    use crate::fakes::ScriptedHost;
    use devdrop_state::fakes::MemoryStore;
    use devdrop_state::{CommitMetric, EvaluationPair, EvaluationStore};

    fn host() -> ScriptedHost {
        ScriptedHost::new()
            .with_repository("octo", "devdrop")
            .with_repository("octo", "website")
            .with_contributor("devdrop", "alice", 12)
            .with_contributor("devdrop", "bob", 3)
            .with_contributor("website", "carol", 1)
    }

    #[tokio::test]
    async fn syncing_everything_makes_pairs_pending() {
        let store = MemoryStore::new();
        let report = sync_contributors(&host(), &store, None).await.unwrap();
        assert_eq!(report.repositories.len(), 2);

        let pending = store.find_unevaluated_pairs().await.unwrap();
        assert_eq!(
            pending,
            vec![
                EvaluationPair::new("devdrop", "alice"),
                EvaluationPair::new("devdrop", "bob"),
                EvaluationPair::new("website", "carol"),
            ]
        );
    }

    #[tokio::test]
    async fn resync_keeps_commit_detail() {
        let store = MemoryStore::new();
        let detail = vec![CommitMetric {
            message: "add parser".into(),
            lines_changed: 10,
            files_changed: 1,
            closes_issue: false,
            referenced_issue_labels: Default::default(),
        }];
        store
            .upsert_contribution_detail("devdrop", "alice", &detail)
            .await
            .unwrap();

        sync_contributors(&host(), &store, Some("DevDrop")).await.unwrap();

        let record = store
            .get_contribution("devdrop", "alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.basic_info.unwrap().total_contributions, 12);
        assert_eq!(record.detailed_commits.unwrap(), detail);
    }

    #[tokio::test]
    async fn records_use_the_lowercased_repository_key() {
        let host = ScriptedHost::new()
            .with_repository("octo", "DevDrop")
            .with_contributor("DevDrop", "alice", 4);
        let store = MemoryStore::new();
        let report = sync_contributors(&host, &store, Some("devdrop"))
            .await
            .unwrap();
        assert_eq!(report.repositories[0].repository, "devdrop");
        assert_eq!(
            store.find_unevaluated_pairs().await.unwrap(),
            vec![EvaluationPair::new("devdrop", "alice")]
        );
    }

    #[tokio::test]
    async fn unknown_repository_is_reported() {
        let store = MemoryStore::new();
        let err = sync_contributors(&host(), &store, Some("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, DevdropError::RepositoryNotFound(_)));
    }
}
