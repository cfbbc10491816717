//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryStore`, which satisfies `ContributionStore`,
//! `EvaluationStore` and `AirdropConfigStore` without any external
//! dependencies.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StorageError;
use crate::storage_traits::*;

type Key = (String, String);

fn key(repository: &str, contributor: &str) -> Key {
    (repository.to_string(), contributor.to_string())
}

#[derive(Debug, Default)]
struct Tables {
    contributions: BTreeMap<Key, ContributionRecord>,
    evaluations: BTreeMap<Key, EvaluationRecord>,
    airdrops: BTreeMap<String, AirdropConfig>,
}

/// In-memory store backed by ordered maps keyed by (repository, contributor).
///
/// `fail_evaluation_writes(true)` makes every `upsert_evaluation` fail with a
/// backend error, for exercising store-failure paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_evaluation_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_evaluation_writes(&self, fail: bool) {
        self.fail_evaluation_writes.store(fail, Ordering::SeqCst);
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ContributionStore for MemoryStore {
    async fn upsert_contributor_stats(
        &self,
        repository: &str,
        contributor: &str,
        stats: ContributorStats,
    ) -> StorageResult<()> {
        let mut tables = self.tables();
        let record = tables
            .contributions
            .entry(key(repository, contributor))
            .or_insert_with(|| ContributionRecord {
                repository: repository.to_string(),
                contributor: contributor.to_string(),
                basic_info: None,
                detailed_commits: None,
                last_updated: Utc::now(),
            });
        record.basic_info = Some(stats);
        record.last_updated = Utc::now();
        Ok(())
    }

    async fn upsert_contribution_detail(
        &self,
        repository: &str,
        contributor: &str,
        commits: &[CommitMetric],
    ) -> StorageResult<()> {
        let mut tables = self.tables();
        let record = tables
            .contributions
            .entry(key(repository, contributor))
            .or_insert_with(|| ContributionRecord {
                repository: repository.to_string(),
                contributor: contributor.to_string(),
                basic_info: None,
                detailed_commits: None,
                last_updated: Utc::now(),
            });
        record.detailed_commits = Some(commits.to_vec());
        record.last_updated = Utc::now();
        Ok(())
    }

    async fn get_contribution(
        &self,
        repository: &str,
        contributor: &str,
    ) -> StorageResult<Option<ContributionRecord>> {
        let tables = self.tables();
        Ok(tables
            .contributions
            .get(&key(repository, contributor))
            .cloned())
    }
}

#[async_trait]
impl EvaluationStore for MemoryStore {
    async fn upsert_evaluation(
        &self,
        repository: &str,
        contributor: &str,
        reward_points: f64,
        justification: &str,
    ) -> StorageResult<EvaluationRecord> {
        if self.fail_evaluation_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(
                "evaluation writes disabled".to_string(),
            ));
        }
        validate_reward_points(repository, contributor, reward_points)?;

        let record = EvaluationRecord {
            repository: repository.to_string(),
            contributor: contributor.to_string(),
            reward_points,
            justification: justification.to_string(),
            evaluated_at: Utc::now(),
        };
        let mut tables = self.tables();
        tables
            .evaluations
            .insert(key(repository, contributor), record.clone());
        Ok(record)
    }

    async fn get_evaluation(
        &self,
        repository: &str,
        contributor: &str,
    ) -> StorageResult<Option<EvaluationRecord>> {
        let tables = self.tables();
        Ok(tables.evaluations.get(&key(repository, contributor)).cloned())
    }

    async fn find_unevaluated_pairs(&self) -> StorageResult<Vec<EvaluationPair>> {
        let tables = self.tables();
        Ok(tables
            .contributions
            .keys()
            .filter(|k| !tables.evaluations.contains_key(*k))
            .map(|(repo, contributor)| EvaluationPair::new(repo.clone(), contributor.clone()))
            .collect())
    }

    async fn list_evaluations(&self, repository: &str) -> StorageResult<Vec<EvaluationRecord>> {
        let tables = self.tables();
        let mut records: Vec<EvaluationRecord> = tables
            .evaluations
            .values()
            .filter(|r| r.repository == repository)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.contributor.cmp(&b.contributor));
        Ok(records)
    }

    async fn sum_evaluated_points(&self, repository: &str) -> StorageResult<f64> {
        let tables = self.tables();
        Ok(tables
            .evaluations
            .values()
            .filter(|r| r.repository == repository)
            .map(|r| r.reward_points)
            .sum())
    }
}

#[async_trait]
impl AirdropConfigStore for MemoryStore {
    async fn upsert_airdrop_config(&self, config: &AirdropConfig) -> StorageResult<()> {
        let mut tables = self.tables();
        tables
            .airdrops
            .insert(config.repository.clone(), config.clone());
        Ok(())
    }

    async fn get_airdrop_config(&self, repository: &str) -> StorageResult<Option<AirdropConfig>> {
        let tables = self.tables();
        Ok(tables.airdrops.get(repository).cloned())
    }
}
