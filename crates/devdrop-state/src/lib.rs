//! DevDrop State: persistence layer for the contributor evaluation pipeline
//!
//! This crate owns every record the pipeline persists: per-contributor
//! contribution data, evaluation results and per-repository airdrop
//! configuration. The pipeline only talks to it through the traits in
//! [`storage_traits`], so the SurrealDB backend and the in-memory fake are
//! interchangeable.
//!
//! ## Key Components
//!
//! - `PersistenceStore`: the narrow store interface consumed by the pipeline
//! - `SurrealStore`: SurrealDB-backed implementation (mem, surrealkv, ws)
//! - `MemoryStore`: in-memory fake for tests

mod error;
pub mod fakes;
mod handle;
mod migrations;
mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use error::{StateError, StorageError};
pub use handle::CloudConfig;
pub use schema::{AirdropRow, ContributionRow, EvaluationRow};
pub use storage_traits::{
    AirdropConfig, AirdropConfigStore, CommitMetric, ContributionRecord, ContributionStore,
    ContributorStats, EvaluationPair, EvaluationRecord, EvaluationStore, PersistenceStore,
    StorageResult,
};
pub use surreal_store::SurrealStore;

/// Result type for connection and schema operations
pub type Result<T> = std::result::Result<T, StateError>;
