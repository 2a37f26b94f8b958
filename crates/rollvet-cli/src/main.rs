//! rollvet — rollout verification CLI.
//!
//! Drives a staged replacement of a deployment through its control
//! plane while continuously probing the service, then emits a JSON
//! verification report and exits non-zero if any invariant was
//! violated.
//!
//! # Usage
//!
//! ```text
//! rollvet run --config rollvet.toml
//! rollvet preflight --config rollvet.toml
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use rollvet_core::{Outcome, VerifyConfig};
use rollvet_driver::{ControlPlane, HttpControlPlane};
use rollvet_probe::probe_endpoint;
use rollvet_verify::Verifier;

#[derive(Parser)]
#[command(name = "rollvet", about = "Rollout verifier — proves zero-downtime deployments")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a full verification: warm-up, rollout, drain, report.
    Run {
        /// Path to the rollvet.toml config file.
        #[arg(long, default_value = "rollvet.toml")]
        config: PathBuf,

        /// Override the probed endpoint URL.
        #[arg(long)]
        endpoint: Option<String>,

        /// Override the rollout target revision.
        #[arg(long)]
        target_revision: Option<String>,
    },

    /// Check that the endpoint and control plane are reachable.
    Preflight {
        /// Path to the rollvet.toml config file.
        #[arg(long, default_value = "rollvet.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rollvet=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            endpoint,
            target_revision,
        } => {
            let mut config = VerifyConfig::from_file(&config)?;
            if let Some(endpoint) = endpoint {
                config.endpoint = endpoint;
            }
            if let Some(revision) = target_revision {
                config.target_revision = revision;
            }
            run_verification(config).await
        }
        Command::Preflight { config } => {
            let config = VerifyConfig::from_file(&config)?;
            run_preflight(config).await
        }
    }
}

async fn run_verification(config: VerifyConfig) -> anyhow::Result<ExitCode> {
    let control_plane = HttpControlPlane::new(&config.control_plane)?;

    // Ctrl-C cancels gracefully: remaining waits are skipped, the
    // sampler is drained, and the partial report is still emitted.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("cancellation requested, draining");
            let _ = cancel_tx.send(true);
        }
    });

    let verifier = Verifier::new(config, control_plane);
    let report = verifier.run(cancel_rx).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.passed() {
        info!("verification passed");
        Ok(ExitCode::SUCCESS)
    } else {
        warn!(violations = report.violations.len(), "verification failed");
        Ok(ExitCode::FAILURE)
    }
}

async fn run_preflight(config: VerifyConfig) -> anyhow::Result<ExitCode> {
    let mut ok = true;

    let probe = probe_endpoint(&config.endpoint, config.probe_timeout, &config.version_rule)
        .await?;
    match probe.outcome {
        Outcome::Success => info!(
            endpoint = %config.endpoint,
            version = probe.version.as_deref().unwrap_or("-"),
            "endpoint reachable"
        ),
        Outcome::Failure => {
            warn!(endpoint = %config.endpoint, "endpoint probe failed");
            ok = false;
        }
    }

    let control_plane = HttpControlPlane::new(&config.control_plane)?;
    match control_plane.ready_replicas(&config.deployment_id).await {
        Ok(replicas) if replicas > 0 => {
            info!(deployment = %config.deployment_id, ready_replicas = replicas, "control plane reachable");
        }
        Ok(_) => {
            warn!(deployment = %config.deployment_id, "no ready replicas");
            ok = false;
        }
        Err(e) => {
            warn!(error = %e, "control plane check failed");
            ok = false;
        }
    }

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
