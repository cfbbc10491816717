//! Schema definitions for DevDrop SurrealDB tables
//!
//! Tables:
//! - contributor_data: contributor stats and detailed commits per repository
//! - contribution_evaluations: reward points and justification per contributor
//! - airdrop_info: airdrop date and token pool per repository
//!
//! Rows are keyed by array record IDs (`[repo_name, contributor]` or
//! `[repo_name]`), so every upsert addresses exactly one record.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::storage_traits::{
    AirdropConfig, CommitMetric, ContributionRecord, ContributorStats, EvaluationRecord,
};

pub const CONTRIBUTOR_DATA: &str = "contributor_data";
pub const EVALUATIONS: &str = "contribution_evaluations";
pub const AIRDROP_INFO: &str = "airdrop_info";

/// Module for serializing chrono DateTime to SurrealDB datetime format
pub(crate) mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Row of `contributor_data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributionRow {
    pub repo_name: String,
    pub contributor: String,
    #[serde(default)]
    pub basic_info: Option<ContributorStats>,
    #[serde(default)]
    pub detailed_commits: Option<Vec<CommitMetric>>,
    #[serde(with = "surreal_datetime")]
    pub last_updated: DateTime<Utc>,
}

impl From<ContributionRow> for ContributionRecord {
    fn from(row: ContributionRow) -> Self {
        ContributionRecord {
            repository: row.repo_name,
            contributor: row.contributor,
            basic_info: row.basic_info,
            detailed_commits: row.detailed_commits,
            last_updated: row.last_updated,
        }
    }
}

/// Row of `contribution_evaluations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRow {
    pub repo_name: String,
    pub contributor: String,
    pub reward_points: f64,
    pub justification: String,
    #[serde(with = "surreal_datetime")]
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationRow {
    pub fn new(repo_name: &str, contributor: &str, reward_points: f64, justification: &str) -> Self {
        Self {
            repo_name: repo_name.to_string(),
            contributor: contributor.to_string(),
            reward_points,
            justification: justification.to_string(),
            evaluated_at: Utc::now(),
        }
    }
}

impl From<EvaluationRow> for EvaluationRecord {
    fn from(row: EvaluationRow) -> Self {
        EvaluationRecord {
            repository: row.repo_name,
            contributor: row.contributor,
            reward_points: row.reward_points,
            justification: row.justification,
            evaluated_at: row.evaluated_at,
        }
    }
}

/// Row of `airdrop_info`. The date is stored as `YYYY-MM-DD`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirdropRow {
    pub repo_name: String,
    pub airdrop_date: String,
    pub total_tokens: u64,
}

impl From<&AirdropConfig> for AirdropRow {
    fn from(config: &AirdropConfig) -> Self {
        Self {
            repo_name: config.repository.clone(),
            airdrop_date: config.airdrop_date.format("%Y-%m-%d").to_string(),
            total_tokens: config.total_tokens,
        }
    }
}

impl TryFrom<AirdropRow> for AirdropConfig {
    type Error = StorageError;

    fn try_from(row: AirdropRow) -> Result<Self, Self::Error> {
        let airdrop_date = NaiveDate::parse_from_str(&row.airdrop_date, "%Y-%m-%d").map_err(|e| {
            StorageError::CorruptRow {
                table: AIRDROP_INFO.to_string(),
                detail: format!("airdrop_date '{}': {e}", row.airdrop_date),
            }
        })?;
        Ok(AirdropConfig {
            repository: row.repo_name,
            airdrop_date,
            total_tokens: row.total_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn airdrop_row_round_trips_date() {
        let config = AirdropConfig {
            repository: "devdrop".to_string(),
            airdrop_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            total_tokens: 1000,
        };
        let row = AirdropRow::from(&config);
        assert_eq!(row.airdrop_date, "2025-03-01");
        assert_eq!(AirdropConfig::try_from(row).unwrap(), config);
    }

    #[test]
    fn corrupt_airdrop_date_is_reported() {
        let row = AirdropRow {
            repo_name: "devdrop".to_string(),
            airdrop_date: "March first".to_string(),
            total_tokens: 10,
        };
        let err = AirdropConfig::try_from(row).unwrap_err();
        assert!(matches!(err, StorageError::CorruptRow { .. }));
    }
}
