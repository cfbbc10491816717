//! Airdrop configuration: one token pool and date per repository.

use chrono::NaiveDate;
use devdrop_state::{AirdropConfigStore, PersistenceStore};
use tracing::instrument;

use crate::error::{DevdropError, Result};
use crate::model::{repository_key, AirdropConfig};

/// Validate and store the airdrop configuration for `repository`.
/// `airdrop_date` must be `YYYY-MM-DD`; an existing configuration is
/// replaced.
#[instrument(skip(store))]
pub async fn configure_airdrop(
    store: &dyn PersistenceStore,
    repository: &str,
    airdrop_date: &str,
    total_tokens: u64,
) -> Result<AirdropConfig> {
    let repository = repository_key(repository);
    if repository.is_empty() {
        return Err(DevdropError::InvalidInput(
            "repository name must not be empty".into(),
        ));
    }
    let airdrop_date = NaiveDate::parse_from_str(airdrop_date.trim(), "%Y-%m-%d").map_err(|e| {
        DevdropError::InvalidInput(format!("airdrop date '{airdrop_date}' is not YYYY-MM-DD: {e}"))
    })?;

    let config = AirdropConfig {
        repository,
        airdrop_date,
        total_tokens,
    };
    store.upsert_airdrop_config(&config).await?;
    Ok(config)
}

/// Read the stored configuration for `repository`.
pub async fn airdrop_config(
    store: &dyn PersistenceStore,
    repository: &str,
) -> Result<AirdropConfig> {
    store
        .get_airdrop_config(&repository_key(repository))
        .await?
        .ok_or_else(|| DevdropError::NoAirdropConfigured(repository.to_string()))
}
