//! Token distribution
//!
//! Splits a repository's configured pool proportionally to persisted reward
//! points. Allocations are rounded to [`ALLOCATION_DECIMALS`] fractional
//! digits; a zero point total allocates nothing.

use devdrop_state::{AirdropConfigStore, EvaluationStore, PersistenceStore};
use tracing::instrument;

use crate::error::{DevdropError, Result};
use crate::model::{repository_key, Distribution, EvaluationRecord, TokenAllocation};
use crate::obs;

pub const ALLOCATION_DECIMALS: i32 = 6;

/// Round half away from zero to [`ALLOCATION_DECIMALS`] digits.
pub fn round_allocation(value: f64) -> f64 {
    let scale = 10f64.powi(ALLOCATION_DECIMALS);
    (value * scale).round() / scale
}

/// Pure allocation step: `points * total_tokens / sum(points)` per
/// evaluation, in the order given. The sum is taken over `evaluations`
/// itself, so the shares always add up to `total_tokens` (up to rounding).
pub fn compute_allocations(
    total_tokens: u64,
    evaluations: &[EvaluationRecord],
) -> Vec<TokenAllocation> {
    let sum_points: f64 = evaluations.iter().map(|e| e.reward_points).sum();
    evaluations
        .iter()
        .map(|e| {
            let share = if sum_points > 0.0 {
                e.reward_points * total_tokens as f64 / sum_points
            } else {
                0.0
            };
            TokenAllocation {
                contributor: e.contributor.clone(),
                reward_points: e.reward_points,
                token_allocation: round_allocation(share),
            }
        })
        .collect()
}

/// Distribute `repository`'s pool over its evaluated contributors, ordered
/// by contributor.
///
/// Evaluations are read once; the point total comes from that same listing,
/// so a batch writing concurrently cannot skew the shares.
#[instrument(skip(store))]
pub async fn distribute(store: &dyn PersistenceStore, repository: &str) -> Result<Distribution> {
    let key = repository_key(repository);
    let config = store
        .get_airdrop_config(&key)
        .await?
        .ok_or_else(|| DevdropError::NoAirdropConfigured(repository.to_string()))?;

    let evaluations = store.list_evaluations(&key).await?;
    let distributions = compute_allocations(config.total_tokens, &evaluations);

    obs::emit_distribution_computed(
        &key,
        config.total_tokens,
        distributions.len(),
        distributions.iter().map(|a| a.reward_points).sum(),
    );
    Ok(Distribution {
        repository: config.repository,
        total_tokens: config.total_tokens,
        distributions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::airdrop::configure_airdrop;
    use chrono::Utc;
    use devdrop_state::fakes::MemoryStore;

    fn evaluation(contributor: &str, points: f64) -> EvaluationRecord {
        EvaluationRecord {
            repository: "devdrop".into(),
            contributor: contributor.into(),
            reward_points: points,
            justification: String::new(),
            evaluated_at: Utc::now(),
        }
    }

    #[test]
    fn allocations_are_proportional() {
        let evals = [
            evaluation("alice", 10.0),
            evaluation("bob", 30.0),
            evaluation("carol", 60.0),
        ];
        let allocs = compute_allocations(1000, &evals);
        let amounts: Vec<f64> = allocs.iter().map(|a| a.token_allocation).collect();
        assert_eq!(amounts, vec![100.0, 300.0, 600.0]);
        let total: f64 = amounts.iter().sum();
        assert!((total - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn zero_points_allocate_zero() {
        let evals = [evaluation("alice", 0.0), evaluation("bob", 0.0)];
        let allocs = compute_allocations(1000, &evals);
        assert!(allocs.iter().all(|a| a.token_allocation == 0.0));
    }

    #[test]
    fn thirds_round_to_six_decimals() {
        let evals = [
            evaluation("alice", 1.0),
            evaluation("bob", 1.0),
            evaluation("carol", 1.0),
        ];
        let allocs = compute_allocations(100, &evals);
        assert_eq!(allocs[0].token_allocation, 33.333333);
        let total: f64 = allocs.iter().map(|a| a.token_allocation).sum();
        assert!((total - 100.0).abs() < 1e-5);
    }

    #[test]
    fn uneven_points_still_sum_to_the_pool() {
        let evals = [
            evaluation("alice", 12.5),
            evaluation("bob", 7.25),
            evaluation("carol", 30.25),
            evaluation("dave", 0.0),
        ];
        let allocs = compute_allocations(1000, &evals);
        let amounts: Vec<f64> = allocs.iter().map(|a| a.token_allocation).collect();
        assert_eq!(amounts, vec![250.0, 145.0, 605.0, 0.0]);
        let total: f64 = amounts.iter().sum();
        assert!((total - 1000.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn stored_evaluations_split_the_whole_pool() {
        let store = MemoryStore::new();
        for (contributor, points) in [("alice", 12.5), ("bob", 7.25), ("carol", 30.25)] {
            store
                .upsert_evaluation("devdrop", contributor, points, "ok")
                .await
                .unwrap();
        }
        configure_airdrop(&store, "DevDrop", "2025-09-01", 1000)
            .await
            .unwrap();

        let distribution = distribute(&store, "octo/DEVDROP").await.unwrap();
        assert_eq!(distribution.repository, "devdrop");
        assert_eq!(distribution.distributions.len(), 3);
        let total: f64 = distribution
            .distributions
            .iter()
            .map(|a| a.token_allocation)
            .sum();
        assert!((total - 1000.0).abs() < 1e-6, "{total}");
    }

    #[test]
    fn rounding_goes_to_nearest_micro_unit() {
        assert_eq!(round_allocation(2.0000004), 2.0);
        assert_eq!(round_allocation(2.0000006), 2.000001);
        assert_eq!(round_allocation(-2.0000006), -2.000001);
    }
}
