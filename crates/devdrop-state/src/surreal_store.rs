//! SurrealDB-backed store implementation
//!
//! Uses the row types in `schema` for persistence, converting to/from
//! `storage_traits` types at the boundary. Upserts address array record IDs
//! so each call is a single atomic statement.

use async_trait::async_trait;
use serde::Deserialize;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::handle;
use crate::schema::{
    AirdropRow, ContributionRow, EvaluationRow, AIRDROP_INFO, CONTRIBUTOR_DATA, EVALUATIONS,
};
use crate::storage_traits::{
    validate_reward_points, AirdropConfig, AirdropConfigStore, CommitMetric, ContributionRecord,
    ContributionStore, ContributorStats, EvaluationPair, EvaluationRecord, EvaluationStore,
    StorageResult,
};

/// SurrealDB-backed implementation of the persistence traits.
#[derive(Clone)]
pub struct SurrealStore {
    db: Surreal<Any>,
}

impl SurrealStore {
    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> crate::Result<Self> {
        Self::connect("mem://").await
    }

    /// Connect to an explicit URL (`mem://`, `surrealkv://path`, `ws://host`).
    pub async fn connect(url: &str) -> crate::Result<Self> {
        let db = handle::connect_url(url).await?;
        info!("SurrealStore connected ({})", url);
        Ok(Self { db })
    }

    /// Create from environment variables; see [`crate::CloudConfig::from_env`].
    pub async fn from_env() -> crate::Result<Self> {
        let db = handle::connect_from_env().await?;
        Ok(Self { db })
    }

    // -- private helpers -----------------------------------------------------

    async fn select_rows<T>(
        &self,
        sql: &str,
        repo: &str,
        contributor: Option<&str>,
    ) -> StorageResult<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut query = self.db.query(sql).bind(("repo", repo.to_string()));
        if let Some(contributor) = contributor {
            query = query.bind(("contributor", contributor.to_string()));
        }
        let mut res = query.await?;
        let rows: Vec<T> = res.take(0)?;
        Ok(rows)
    }
}

#[async_trait]
impl ContributionStore for SurrealStore {
    #[instrument(skip(self, stats))]
    async fn upsert_contributor_stats(
        &self,
        repository: &str,
        contributor: &str,
        stats: ContributorStats,
    ) -> StorageResult<()> {
        debug!("upserting contributor stats");
        let sql = format!(
            "UPSERT type::thing('{CONTRIBUTOR_DATA}', [$repo, $contributor]) MERGE {{ \
                repo_name: $repo, contributor: $contributor, \
                basic_info: $info, last_updated: time::now() }}"
        );
        self.db
            .query(sql)
            .bind(("repo", repository.to_string()))
            .bind(("contributor", contributor.to_string()))
            .bind(("info", stats))
            .await?
            .check()?;
        Ok(())
    }

    #[instrument(skip(self, commits), fields(commits = commits.len()))]
    async fn upsert_contribution_detail(
        &self,
        repository: &str,
        contributor: &str,
        commits: &[CommitMetric],
    ) -> StorageResult<()> {
        debug!("upserting contribution detail");
        let sql = format!(
            "UPSERT type::thing('{CONTRIBUTOR_DATA}', [$repo, $contributor]) MERGE {{ \
                repo_name: $repo, contributor: $contributor, \
                detailed_commits: $commits, last_updated: time::now() }}"
        );
        self.db
            .query(sql)
            .bind(("repo", repository.to_string()))
            .bind(("contributor", contributor.to_string()))
            .bind(("commits", commits.to_vec()))
            .await?
            .check()?;
        Ok(())
    }

    async fn get_contribution(
        &self,
        repository: &str,
        contributor: &str,
    ) -> StorageResult<Option<ContributionRecord>> {
        let sql = format!(
            "SELECT * FROM {CONTRIBUTOR_DATA} WHERE repo_name = $repo AND contributor = $contributor"
        );
        let rows: Vec<ContributionRow> =
            self.select_rows(&sql, repository, Some(contributor)).await?;
        Ok(rows.into_iter().next().map(ContributionRecord::from))
    }
}

#[async_trait]
impl EvaluationStore for SurrealStore {
    #[instrument(skip(self, justification))]
    async fn upsert_evaluation(
        &self,
        repository: &str,
        contributor: &str,
        reward_points: f64,
        justification: &str,
    ) -> StorageResult<EvaluationRecord> {
        validate_reward_points(repository, contributor, reward_points)?;

        let row = EvaluationRow::new(repository, contributor, reward_points, justification);
        let sql =
            format!("UPSERT type::thing('{EVALUATIONS}', [$repo, $contributor]) CONTENT $row");
        self.db
            .query(sql)
            .bind(("repo", repository.to_string()))
            .bind(("contributor", contributor.to_string()))
            .bind(("row", row.clone()))
            .await?
            .check()?;

        debug!(reward_points, "evaluation stored");
        Ok(row.into())
    }

    async fn get_evaluation(
        &self,
        repository: &str,
        contributor: &str,
    ) -> StorageResult<Option<EvaluationRecord>> {
        let sql = format!(
            "SELECT * FROM {EVALUATIONS} WHERE repo_name = $repo AND contributor = $contributor"
        );
        let rows: Vec<EvaluationRow> = self.select_rows(&sql, repository, Some(contributor)).await?;
        Ok(rows.into_iter().next().map(EvaluationRecord::from))
    }

    #[instrument(skip(self))]
    async fn find_unevaluated_pairs(&self) -> StorageResult<Vec<EvaluationPair>> {
        #[derive(Deserialize)]
        struct PairRow {
            repo_name: String,
            contributor: String,
        }

        let sql = format!(
            "SELECT repo_name, contributor FROM {CONTRIBUTOR_DATA} \
             WHERE [repo_name, contributor] NOTINSIDE \
                (SELECT VALUE [repo_name, contributor] FROM {EVALUATIONS}) \
             ORDER BY repo_name ASC, contributor ASC"
        );
        let mut res = self.db.query(sql).await?;
        let rows: Vec<PairRow> = res.take(0)?;

        debug!(pairs = rows.len(), "unevaluated pairs found");
        Ok(rows
            .into_iter()
            .map(|r| EvaluationPair::new(r.repo_name, r.contributor))
            .collect())
    }

    async fn list_evaluations(&self, repository: &str) -> StorageResult<Vec<EvaluationRecord>> {
        let sql =
            format!("SELECT * FROM {EVALUATIONS} WHERE repo_name = $repo ORDER BY contributor ASC");
        let rows: Vec<EvaluationRow> = self.select_rows(&sql, repository, None).await?;
        Ok(rows.into_iter().map(EvaluationRecord::from).collect())
    }

    async fn sum_evaluated_points(&self, repository: &str) -> StorageResult<f64> {
        let sql = format!("SELECT VALUE reward_points FROM {EVALUATIONS} WHERE repo_name = $repo");
        let points: Vec<f64> = self.select_rows(&sql, repository, None).await?;
        Ok(points.into_iter().sum())
    }
}

#[async_trait]
impl AirdropConfigStore for SurrealStore {
    #[instrument(skip(self, config), fields(repository = %config.repository))]
    async fn upsert_airdrop_config(&self, config: &AirdropConfig) -> StorageResult<()> {
        let row = AirdropRow::from(config);
        let sql = format!("UPSERT type::thing('{AIRDROP_INFO}', [$repo]) CONTENT $row");
        self.db
            .query(sql)
            .bind(("repo", config.repository.clone()))
            .bind(("row", row))
            .await?
            .check()?;
        info!(
            total_tokens = config.total_tokens,
            airdrop_date = %config.airdrop_date,
            "airdrop configuration stored"
        );
        Ok(())
    }

    async fn get_airdrop_config(&self, repository: &str) -> StorageResult<Option<AirdropConfig>> {
        let sql = format!("SELECT * FROM {AIRDROP_INFO} WHERE repo_name = $repo");
        let rows: Vec<AirdropRow> = self.select_rows(&sql, repository, None).await?;
        rows.into_iter().next().map(AirdropConfig::try_from).transpose()
    }
}
