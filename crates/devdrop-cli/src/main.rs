//! DevDrop CLI
//!
//! The `devdrop` command drives the evaluation and airdrop pipeline.
//!
//! ## Commands
//!
//! - `repos`: List repositories visible to the host credential
//! - `sync`: Store contributor statistics for one or all repositories
//! - `evaluate` / `evaluate-all`: Score one pair or every pending pair
//! - `airdrop`: Configure or show a repository's token pool
//! - `distribute` / `claims`: Compute allocations and their claim manifest

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use devdrop_core::{
    init_tracing, ChatScorer, GitHubHost, Operation, OperationOutput, OrchestratorConfig,
    Pipeline, METRICS,
};
use devdrop_state::SurrealStore;
use serde::Serialize;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "devdrop")]
#[command(author = "DevDrop Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Contributor evaluation and airdrop distribution", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List repositories visible to the configured token
    Repos,

    /// Fetch contributors and store their basic statistics
    Sync {
        /// Repository name (default: every repository)
        #[arg(short, long)]
        repo: Option<String>,
    },

    /// Evaluate one contributor, once, without retries
    Evaluate {
        #[arg(short, long)]
        repo: String,

        #[arg(short, long)]
        contributor: String,
    },

    /// Show the stored evaluation for a contributor
    Show {
        #[arg(short, long)]
        repo: String,

        #[arg(short, long)]
        contributor: String,
    },

    /// Evaluate every synced pair that has no evaluation yet
    EvaluateAll {
        /// Pairs in flight (default: 1)
        #[arg(long, env = "DEVDROP_BATCH_CONCURRENCY")]
        concurrency: Option<usize>,
    },

    /// Airdrop configuration
    Airdrop {
        #[command(subcommand)]
        action: AirdropAction,
    },

    /// Split the configured token pool by reward points
    Distribute {
        #[arg(short, long)]
        repo: String,
    },

    /// Build the Merkle claim manifest for a distribution
    Claims {
        #[arg(short, long)]
        repo: String,
    },
}

#[derive(Subcommand)]
enum AirdropAction {
    /// Create or replace the airdrop for a repository
    Set {
        #[arg(short, long)]
        repo: String,

        /// Airdrop date (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,

        /// Total tokens to distribute
        #[arg(short, long)]
        tokens: u64,
    },
    /// Show the airdrop for a repository
    Show {
        #[arg(short, long)]
        repo: String,
    },
}

impl Commands {
    fn into_operation(self) -> Operation {
        match self {
            Commands::Repos => Operation::ListRepositories,
            Commands::Sync { repo } => Operation::SyncContributors { repository: repo },
            Commands::Evaluate { repo, contributor } => Operation::EvaluateContributor {
                repository: repo,
                contributor,
            },
            Commands::Show { repo, contributor } => Operation::GetEvaluation {
                repository: repo,
                contributor,
            },
            Commands::EvaluateAll { concurrency } => Operation::EvaluateAll { concurrency },
            Commands::Airdrop { action } => match action {
                AirdropAction::Set { repo, date, tokens } => Operation::ConfigureAirdrop {
                    repository: repo,
                    airdrop_date: date,
                    total_tokens: tokens,
                },
                AirdropAction::Show { repo } => Operation::ShowAirdrop { repository: repo },
            },
            Commands::Distribute { repo } => Operation::Distribute { repository: repo },
            Commands::Claims { repo } => Operation::ClaimManifest { repository: repo },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let store = SurrealStore::from_env()
        .await
        .context("Failed to connect to DevDrop database")?;
    let host = GitHubHost::from_env().context("Failed to build GitHub client")?;
    let scorer = ChatScorer::from_env().context("Failed to build scoring client")?;
    let pipeline = Pipeline::new(
        Arc::new(host),
        Arc::new(scorer),
        Arc::new(store),
        OrchestratorConfig::from_env(),
    )?;

    let result = run(&pipeline, cli.command.into_operation()).await;
    METRICS.flush();
    result
}

async fn run(pipeline: &Pipeline, operation: Operation) -> Result<()> {
    let name = operation.name();
    let output = pipeline
        .execute(operation)
        .await
        .with_context(|| format!("{name} failed"))?;

    match &output {
        OperationOutput::Batch(report) => {
            info!(
                succeeded = report.succeeded,
                failed = report.failures.len(),
                "batch finished"
            );
            print_json(report)?;
            if let Some(error) = &report.error {
                anyhow::bail!("batch stopped early: {error}");
            }
            Ok(())
        }
        OperationOutput::StoredEvaluation(None) => {
            println!("No evaluation stored");
            Ok(())
        }
        other => print_json(other),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use devdrop_core::fakes::{commit, ScriptedHost, ScriptedScorer};
    use devdrop_state::fakes::MemoryStore;

    fn parse(args: &[&str]) -> Operation {
        let mut argv = vec!["devdrop"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().command.into_operation()
    }

    #[test]
    fn subcommands_map_to_operations() {
        assert_eq!(parse(&["repos"]), Operation::ListRepositories);
        assert_eq!(
            parse(&["sync"]),
            Operation::SyncContributors { repository: None }
        );
        assert_eq!(
            parse(&["evaluate", "--repo", "devdrop", "--contributor", "alice"]),
            Operation::EvaluateContributor {
                repository: "devdrop".into(),
                contributor: "alice".into(),
            }
        );
        assert_eq!(
            parse(&["evaluate-all", "--concurrency", "4"]),
            Operation::EvaluateAll {
                concurrency: Some(4)
            }
        );
        assert_eq!(
            parse(&["airdrop", "set", "-r", "devdrop", "-d", "2025-09-01", "-t", "1000"]),
            Operation::ConfigureAirdrop {
                repository: "devdrop".into(),
                airdrop_date: "2025-09-01".into(),
                total_tokens: 1000,
            }
        );
        assert_eq!(
            parse(&["claims", "--repo", "devdrop"]),
            Operation::ClaimManifest {
                repository: "devdrop".into()
            }
        );
    }

    #[test]
    fn negative_token_pool_is_rejected_by_the_parser() {
        let parsed = Cli::try_parse_from([
            "devdrop", "airdrop", "set", "-r", "devdrop", "-d", "2025-09-01", "-t", "-5",
        ]);
        assert!(parsed.is_err());
    }

    #[tokio::test]
    async fn run_reports_operation_failures() {
        let host = ScriptedHost::new()
            .with_repository("octo", "devdrop")
            .with_contributor("devdrop", "alice", 1)
            .with_commit("devdrop", "alice", commit("a1", "init", 1, 0, 1));
        let pipeline = Pipeline::new(
            Arc::new(host),
            Arc::new(ScriptedScorer::always(
                r#"{"rewardPoints": 5, "justification": "ok"}"#,
            )),
            Arc::new(MemoryStore::new()),
            OrchestratorConfig::default(),
        )
        .unwrap();

        run(&pipeline, Operation::SyncContributors { repository: None })
            .await
            .unwrap();
        run(&pipeline, Operation::EvaluateAll { concurrency: None })
            .await
            .unwrap();

        let err = run(
            &pipeline,
            Operation::Distribute {
                repository: "devdrop".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("distribute failed"));
    }
}
