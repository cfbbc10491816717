//! Claim manifest
//!
//! A Merkle tree over a distribution, so each contributor can prove their
//! allocation against a single published root.
//!
//! - leaf: `SHA-256(contributor || 0x00 || amount_be_u64)`, where `amount`
//!   is the allocation in base units (allocation * 10^6, rounded)
//! - node: `SHA-256(min(a, b) || max(a, b))` (sorted pairs, so proofs
//!   carry no left/right flags)
//! - an unpaired node is promoted to the next level unchanged
//!
//! Leaves follow the distribution's contributor order.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::distribution::ALLOCATION_DECIMALS;
use crate::model::Distribution;

type Hash = [u8; 32];

/// One contributor's claim and its inclusion proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub contributor: String,
    /// Allocation in base units.
    pub amount: u64,
    /// Hex-encoded sibling hashes, leaf level first.
    pub proof: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimManifest {
    pub repository: String,
    pub total_tokens: u64,
    /// Hex-encoded root; all zeros for an empty distribution.
    pub root: String,
    pub claims: Vec<Claim>,
}

/// Convert a token allocation to integer base units.
pub fn to_base_units(allocation: f64) -> u64 {
    let scaled = (allocation * 10f64.powi(ALLOCATION_DECIMALS)).round();
    if scaled <= 0.0 {
        0
    } else {
        scaled as u64
    }
}

fn leaf_hash(contributor: &str, amount: u64) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(contributor.as_bytes());
    hasher.update([0u8]);
    hasher.update(amount.to_be_bytes());
    hasher.finalize().into()
}

fn node_hash(a: &Hash, b: &Hash) -> Hash {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = Sha256::new();
    hasher.update(lo);
    hasher.update(hi);
    hasher.finalize().into()
}

/// All levels of the tree, leaves first, root level last.
fn build_levels(leaves: Vec<Hash>) -> Vec<Vec<Hash>> {
    let mut levels = vec![leaves];
    while levels.last().is_some_and(|level| level.len() > 1) {
        let current = &levels[levels.len() - 1];
        let next: Vec<Hash> = current
            .chunks(2)
            .filter_map(|pair| pair.iter().copied().reduce(|a, b| node_hash(&a, &b)))
            .collect();
        levels.push(next);
    }
    levels
}

fn proof_for(levels: &[Vec<Hash>], mut index: usize) -> Vec<String> {
    let mut proof = Vec::new();
    for level in &levels[..levels.len().saturating_sub(1)] {
        if let Some(sibling) = level.get(index ^ 1) {
            proof.push(hex::encode(sibling));
        }
        index /= 2;
    }
    proof
}

/// Build the manifest for a computed distribution.
pub fn build_manifest(distribution: &Distribution) -> ClaimManifest {
    let entries: Vec<(String, u64)> = distribution
        .distributions
        .iter()
        .map(|a| (a.contributor.clone(), to_base_units(a.token_allocation)))
        .collect();

    let leaves = entries
        .iter()
        .map(|(contributor, amount)| leaf_hash(contributor, *amount))
        .collect();
    let levels = build_levels(leaves);
    let root = levels
        .last()
        .and_then(|top| top.first())
        .copied()
        .unwrap_or([0u8; 32]);

    let claims = entries
        .into_iter()
        .enumerate()
        .map(|(index, (contributor, amount))| Claim {
            proof: proof_for(&levels, index),
            contributor,
            amount,
        })
        .collect();

    ClaimManifest {
        repository: distribution.repository.clone(),
        total_tokens: distribution.total_tokens,
        root: hex::encode(root),
        claims,
    }
}

/// Check a claim against a hex root. Malformed hex never verifies.
pub fn verify_proof(root: &str, contributor: &str, amount: u64, proof: &[String]) -> bool {
    let mut current = leaf_hash(contributor, amount);
    for sibling in proof {
        let Ok(bytes) = hex::decode(sibling) else {
            return false;
        };
        let Ok(sibling) = Hash::try_from(bytes.as_slice()) else {
            return false;
        };
        current = node_hash(&current, &sibling);
    }
    hex::encode(current) == root.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TokenAllocation;

    fn distribution(entries: &[(&str, f64)]) -> Distribution {
        Distribution {
            repository: "devdrop".into(),
            total_tokens: 1000,
            distributions: entries
                .iter()
                .map(|(c, t)| TokenAllocation {
                    contributor: c.to_string(),
                    reward_points: 0.0,
                    token_allocation: *t,
                })
                .collect(),
        }
    }

    #[test]
    fn every_claim_verifies_against_the_root() {
        for n in 1..=7 {
            let entries: Vec<(String, f64)> = (0..n)
                .map(|i| (format!("user{i}"), 10.5 * (i + 1) as f64))
                .collect();
            let refs: Vec<(&str, f64)> = entries.iter().map(|(c, t)| (c.as_str(), *t)).collect();
            let manifest = build_manifest(&distribution(&refs));

            for claim in &manifest.claims {
                assert!(
                    verify_proof(&manifest.root, &claim.contributor, claim.amount, &claim.proof),
                    "{n} leaves: {} failed",
                    claim.contributor
                );
            }
        }
    }

    #[test]
    fn tampered_amount_does_not_verify() {
        let manifest = build_manifest(&distribution(&[("alice", 100.0), ("bob", 300.0)]));
        let alice = &manifest.claims[0];
        assert_eq!(alice.amount, 100_000_000);
        assert!(!verify_proof(&manifest.root, "alice", alice.amount + 1, &alice.proof));
        assert!(!verify_proof(&manifest.root, "alice", alice.amount, &["zz".into()]));
    }

    #[test]
    fn manifest_is_deterministic() {
        let d = distribution(&[("alice", 1.25), ("bob", 2.5), ("carol", 0.0)]);
        assert_eq!(build_manifest(&d), build_manifest(&d));
    }

    #[test]
    fn single_leaf_root_is_the_leaf() {
        let manifest = build_manifest(&distribution(&[("alice", 1000.0)]));
        assert!(manifest.claims[0].proof.is_empty());
        assert_eq!(manifest.root, hex::encode(leaf_hash("alice", 1_000_000_000)));
    }

    #[test]
    fn empty_distribution_has_zero_root() {
        let manifest = build_manifest(&distribution(&[]));
        assert_eq!(manifest.root, "0".repeat(64));
        assert!(manifest.claims.is_empty());
    }
}
