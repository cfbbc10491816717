//! The closed set of pipeline operations.
//!
//! Every request handled by the pipeline is one [`Operation`] variant with
//! exactly one handler in [`Pipeline::execute`].

use std::sync::Arc;

use devdrop_state::{EvaluationStore, PersistenceStore};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::airdrop::{airdrop_config, configure_airdrop};
use crate::claims::{build_manifest, ClaimManifest};
use crate::distribution::distribute;
use crate::error::Result;
use crate::host::{Repository, RepositoryHost};
use crate::model::{
    repository_key, AirdropConfig, BatchReport, Distribution, EvaluationRecord, SyncReport,
};
use crate::orchestrator::{EvaluationOrchestrator, OrchestratorConfig};
use crate::scoring::ScoringAdapter;
use crate::sync::sync_contributors;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    ListRepositories,
    SyncContributors {
        repository: Option<String>,
    },
    EvaluateContributor {
        repository: String,
        contributor: String,
    },
    GetEvaluation {
        repository: String,
        contributor: String,
    },
    /// Batch over pending pairs; `None` uses the configured concurrency.
    EvaluateAll {
        concurrency: Option<usize>,
    },
    ConfigureAirdrop {
        repository: String,
        /// `YYYY-MM-DD`
        airdrop_date: String,
        total_tokens: u64,
    },
    ShowAirdrop {
        repository: String,
    },
    Distribute {
        repository: String,
    },
    ClaimManifest {
        repository: String,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ListRepositories => "list_repositories",
            Operation::SyncContributors { .. } => "sync_contributors",
            Operation::EvaluateContributor { .. } => "evaluate_contributor",
            Operation::GetEvaluation { .. } => "get_evaluation",
            Operation::EvaluateAll { .. } => "evaluate_all",
            Operation::ConfigureAirdrop { .. } => "configure_airdrop",
            Operation::ShowAirdrop { .. } => "show_airdrop",
            Operation::Distribute { .. } => "distribute",
            Operation::ClaimManifest { .. } => "claim_manifest",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum OperationOutput {
    Repositories(Vec<Repository>),
    Synced(SyncReport),
    Evaluation(EvaluationRecord),
    StoredEvaluation(Option<EvaluationRecord>),
    Batch(BatchReport),
    Airdrop(AirdropConfig),
    Distribution(Distribution),
    Claims(ClaimManifest),
}

/// Entry point wiring the injected host, scorer and store together.
pub struct Pipeline {
    host: Arc<dyn RepositoryHost>,
    store: Arc<dyn PersistenceStore>,
    orchestrator: EvaluationOrchestrator,
}

impl Pipeline {
    pub fn new(
        host: Arc<dyn RepositoryHost>,
        scorer: Arc<dyn ScoringAdapter>,
        store: Arc<dyn PersistenceStore>,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        let orchestrator =
            EvaluationOrchestrator::new(Arc::clone(&host), scorer, Arc::clone(&store), config)?;
        Ok(Self {
            host,
            store,
            orchestrator,
        })
    }

    #[instrument(skip(self, operation), fields(operation = operation.name()))]
    pub async fn execute(&self, operation: Operation) -> Result<OperationOutput> {
        info!("executing operation");
        let store = self.store.as_ref();
        let output = match operation {
            Operation::ListRepositories => {
                OperationOutput::Repositories(self.host.list_repositories().await?)
            }
            Operation::SyncContributors { repository } => OperationOutput::Synced(
                sync_contributors(self.host.as_ref(), store, repository.as_deref()).await?,
            ),
            Operation::EvaluateContributor {
                repository,
                contributor,
            } => OperationOutput::Evaluation(
                self.orchestrator
                    .evaluate_one(&repository, &contributor)
                    .await?,
            ),
            Operation::GetEvaluation {
                repository,
                contributor,
            } => OperationOutput::StoredEvaluation(
                store
                    .get_evaluation(&repository_key(&repository), &contributor)
                    .await?,
            ),
            Operation::EvaluateAll { concurrency } => {
                let concurrency =
                    concurrency.unwrap_or(self.orchestrator.config().batch_concurrency);
                OperationOutput::Batch(
                    self.orchestrator
                        .evaluate_all_with_concurrency(concurrency)
                        .await,
                )
            }
            Operation::ConfigureAirdrop {
                repository,
                airdrop_date,
                total_tokens,
            } => OperationOutput::Airdrop(
                configure_airdrop(store, &repository, &airdrop_date, total_tokens).await?,
            ),
            Operation::ShowAirdrop { repository } => {
                OperationOutput::Airdrop(airdrop_config(store, &repository).await?)
            }
            Operation::Distribute { repository } => {
                OperationOutput::Distribution(distribute(store, &repository).await?)
            }
            Operation::ClaimManifest { repository } => {
                let distribution = distribute(store, &repository).await?;
                OperationOutput::Claims(build_manifest(&distribution))
            }
        };
        Ok(output)
    }
}
