//! SurrealDB schema migrations and initialization
//!
//! Sets up the three tables the pipeline persists to. Safe to call multiple
//! times (idempotent).

use crate::error::StateError;
use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all DevDrop tables in SurrealDB
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing DevDrop SurrealDB schema");

    init_contributor_data_table(db).await?;
    init_evaluations_table(db).await?;
    init_airdrop_info_table(db).await?;

    info!("DevDrop schema initialization complete");
    Ok(())
}

/// Initialize `contributor_data`
///
/// Schema:
/// ```text
/// TABLE contributor_data {
///   id:               [repo_name, contributor]
///   repo_name:        STRING (indexed)
///   contributor:      STRING
///   basic_info:       OBJECT? {total_contributions, total_issues, total_prs}
///   detailed_commits: ARRAY<OBJECT>?
///   last_updated:     DATETIME
/// }
/// ```
async fn init_contributor_data_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing contributor_data table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS contributor_data SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_contributor_pair ON TABLE contributor_data COLUMNS repo_name, contributor UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_contributor_repo ON TABLE contributor_data COLUMNS repo_name;
    "#;

    db.query(sql)
        .await
        .map_err(|e| StateError::SchemaSetup(format!("contributor_data: {e}")))?;
    Ok(())
}

/// Initialize `contribution_evaluations`
///
/// Constraints:
/// - one row per (repo_name, contributor); re-evaluation overwrites
/// - `reward_points` is non-negative (enforced via app logic)
async fn init_evaluations_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing contribution_evaluations table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS contribution_evaluations SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_evaluation_pair ON TABLE contribution_evaluations COLUMNS repo_name, contributor UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_evaluation_repo ON TABLE contribution_evaluations COLUMNS repo_name;
    "#;

    db.query(sql)
        .await
        .map_err(|e| StateError::SchemaSetup(format!("contribution_evaluations: {e}")))?;
    Ok(())
}

/// Initialize `airdrop_info` (one row per repository)
async fn init_airdrop_info_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing airdrop_info table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS airdrop_info SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_airdrop_repo ON TABLE airdrop_info COLUMNS repo_name UNIQUE;
    "#;

    db.query(sql)
        .await
        .map_err(|e| StateError::SchemaSetup(format!("airdrop_info: {e}")))?;
    Ok(())
}
