//! Lockstone CLI - binary entry point.
//!
//! # Architecture
//!
//! The CLI wires validated [`Settings`] and the three service clients into
//! the orchestration [`Driver`], runs one command, and maps the outcome to
//! the exit-code contract:
//!
//! | code | meaning |
//! |------|---------|
//! | 0    | success (a submitted proposal awaiting approvals is success) |
//! | 1    | fatal - do not retry as-is |
//! | 2    | retryable failure, retry budget exhausted |
//! | 3    | awaiting human action (e.g. a consumed slot without content) |
//!
//! Logs go to stderr via `tracing`; stdout carries only the command's own
//! report, so scripts can parse it.
//!
//! Ctrl-C trips the driver's cancellation flag: the pipeline stops at the
//! next step boundary, never mid-write, and anything already submitted
//! stays live in the governance backend for later `status`/`execute`.

use std::collections::HashMap;
use std::error::Error as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgGroup, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lockstone_config::Settings;
use lockstone_core::{CancelFlag, DeploySource, Driver};
use lockstone_providers::governance::GovernanceClient;
use lockstone_providers::registry::RegistryClient;
use lockstone_providers::retry::RetryConfig;
use lockstone_providers::storage::StorageClient;
use lockstone_types::{
    ContentId, DeployError, DeploymentOutcome, DeploymentResult, ProposalId, ProposalState,
    ProposalStatus, Retryability,
};

/// Publish static sites under permanently locked, versioned names.
#[derive(Parser, Debug)]
#[command(name = "lockstone")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (default: ~/.lockstone/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload a site directory and publish it as the next version
    #[command(group(ArgGroup::new("source").required(true)))]
    Deploy {
        /// Directory containing the built site artifact
        #[arg(group = "source")]
        dir: Option<PathBuf>,

        /// Publish an already-uploaded content identifier instead
        #[arg(long, group = "source")]
        content_id: Option<String>,
    },

    /// Show a proposal's approval progress
    Status {
        /// Proposal identifier from a previous deploy
        proposal_id: String,
    },

    /// Execute a proposal whose approval threshold is met
    Execute {
        /// Proposal identifier from a previous deploy
        proposal_id: String,
    },

    /// List published versions and the next free slot
    Versions,
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            eprintln!("  next step: {}", err.guidance());
            match err.retryability() {
                Retryability::Fatal => ExitCode::from(1),
                Retryability::Retryable => ExitCode::from(2),
                Retryability::AwaitingHuman => ExitCode::from(3),
            }
        }
    }
}

async fn run(cli: Cli) -> Result<(), DeployError> {
    let settings = load_settings(cli.config.as_deref())?;

    let http = lockstone_providers::http_client(Duration::from_secs(
        settings.request_timeout_secs,
    ))
    .map_err(|e| DeployError::Config(format!("failed to build HTTP client: {e}")))?;
    let retry = RetryConfig::with_max_retries(settings.max_retries);
    let token = settings.signer_token.expose_secret().to_string();

    let registry = RegistryClient::new(
        http.clone(),
        settings.registry_endpoint.clone(),
        Some(token.clone()),
        retry.clone(),
    );
    let governance = GovernanceClient::new(
        http.clone(),
        settings.governance_endpoint.clone(),
        token,
        retry.clone(),
    );
    let storage = StorageClient::new(http, settings.storage_endpoint.clone(), retry);

    let cancel = CancelFlag::new();
    spawn_interrupt_handler(cancel.clone());

    let parent = settings.parent_name.clone();
    let driver = Driver::new(settings, registry, governance, storage, cancel);

    match cli.command {
        Commands::Deploy { dir, content_id } => {
            let source = match (dir, content_id) {
                (Some(dir), None) => DeploySource::Directory(dir),
                (None, Some(raw)) => DeploySource::Existing(ContentId::parse(&raw)?),
                // clap's arg group guarantees exactly one source
                _ => unreachable!("clap enforces exactly one deploy source"),
            };
            let result = driver.deploy(source).await?;
            print_deployment(&result);
            Ok(())
        }
        Commands::Status { proposal_id } => {
            let status = driver.proposal_status(&ProposalId::new(proposal_id)).await?;
            print_status(&status);
            Ok(())
        }
        Commands::Execute { proposal_id } => {
            let status = driver.execute(&ProposalId::new(proposal_id)).await?;
            print_status(&status);
            Ok(())
        }
        Commands::Versions => {
            let scan = driver.versions().await?;
            if scan.existing.is_empty() {
                println!("no versions published under {parent}");
            } else {
                for label in &scan.existing {
                    println!("{label}.{parent}");
                }
            }
            println!("next free slot: {}", scan.next);
            Ok(())
        }
    }
}

fn load_settings(config: Option<&Path>) -> Result<Settings, DeployError> {
    let loaded = match config {
        Some(path) => {
            let env: HashMap<String, String> = std::env::vars().collect();
            Settings::load_from(path, &env)
        }
        None => Settings::load(),
    };
    loaded.map_err(|e| {
        let mut detail = e.to_string();
        let mut source = e.source();
        while let Some(cause) = source {
            detail.push_str(": ");
            detail.push_str(&cause.to_string());
            source = cause.source();
        }
        DeployError::Config(detail)
    })
}

fn spawn_interrupt_handler(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping at the next step boundary");
            cancel.cancel();
        }
    });
}

fn print_deployment(result: &DeploymentResult) {
    println!("published {}", result.name);
    println!("  mode:     {}", result.mode);
    println!("  version:  {}", result.slot);
    println!("  content:  {}", result.content_id);
    match &result.outcome {
        DeploymentOutcome::Proposed { proposal } => {
            println!("  proposal: {proposal}");
        }
        DeploymentOutcome::CreatedAndProposed { tx, proposal } => {
            println!("  created:  {tx}");
            println!("  proposal: {proposal}");
        }
    }
    print_status(&result.status);
}

fn print_status(status: &ProposalStatus) {
    println!(
        "  approvals: {}/{} ({})",
        status.approved,
        status.required,
        status.state()
    );
    match status.state() {
        ProposalState::AwaitingThreshold => println!(
            "  awaiting approvals; follow with `lockstone status {}`",
            status.id
        ),
        ProposalState::ReadyToExecute => println!(
            "  threshold met; run `lockstone execute {}`",
            status.id
        ),
        ProposalState::Executed => println!("  executed"),
    }
}
