//! DevDrop Core: contributor evaluation and airdrop distribution
//!
//! Aggregates commit evidence from a repository host, scores each
//! (repository, contributor) pair through a pluggable scoring adapter,
//! persists the results and splits a repository's token pool by reward
//! points.
//!
//! ## Key Components
//!
//! - `CommitAggregator`: commit history to per-commit metrics
//! - `EvaluationOrchestrator`: single-pair and batch evaluation with retry
//! - `distribute`: proportional token allocation
//! - `Pipeline`: dispatch of the closed [`Operation`] set

pub mod aggregator;
pub mod airdrop;
pub mod claims;
pub mod distribution;
pub mod error;
pub mod fakes;
pub mod host;
pub mod metrics;
pub mod model;
pub mod obs;
pub mod operations;
pub mod orchestrator;
pub mod scoring;
pub mod sync;
pub mod telemetry;

pub use aggregator::{CommitAggregator, CommitClassifier};
pub use airdrop::{airdrop_config, configure_airdrop};
pub use claims::{build_manifest, verify_proof, Claim, ClaimManifest};
pub use distribution::{compute_allocations, distribute};
pub use error::{is_rate_limit_message, DevdropError, HostError, Result, ScoringError};
pub use host::{
    resolve_repository, CommitDetail, GitHubConfig, GitHubHost, Repository, RepositoryHost,
};
pub use metrics::METRICS;
pub use model::{
    repository_key, BatchReport, BatchStatus, ContributionProfile, ContributorSummary,
    Distribution, PairFailure, SyncReport, SyncedRepository, TokenAllocation,
};
pub use operations::{Operation, OperationOutput, Pipeline};
pub use orchestrator::{EvaluationOrchestrator, OrchestratorConfig, RetryPolicy};
pub use scoring::{
    parse_scoring_response, ChatScorer, ChatScoringConfig, ScoredEvaluation, ScoringAdapter,
    ScoringRequest,
};
pub use sync::sync_contributors;
pub use telemetry::init_tracing;

pub use devdrop_state::{
    AirdropConfig, CommitMetric, ContributorStats, EvaluationPair, EvaluationRecord,
    PersistenceStore, SurrealStore,
};
