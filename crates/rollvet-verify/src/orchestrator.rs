//! Verification orchestrator.
//!
//! Runs the phase machine `Idle → Warming → RollingOut → Draining →
//! Reporting → Done`: start the sampler, collect a baseline, drive
//! the rollout, keep sampling through a drain window, then stop the
//! sampler and build the report. Cancellation at any waiting point
//! jumps straight to draining so partial evidence is still reported.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use rollvet_core::VerifyConfig;
use rollvet_driver::{ControlPlane, RolloutDriver};
use rollvet_probe::{Accumulator, Sampler, SamplerConfig, SamplerError};

use crate::report::{generate, ReportParams, RolloutObservation, VerificationReport};

/// Phase of a verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyPhase {
    Idle,
    Warming,
    RollingOut,
    Draining,
    Reporting,
    Done,
}

impl VerifyPhase {
    fn name(self) -> &'static str {
        match self {
            VerifyPhase::Idle => "idle",
            VerifyPhase::Warming => "warming",
            VerifyPhase::RollingOut => "rolling_out",
            VerifyPhase::Draining => "draining",
            VerifyPhase::Reporting => "reporting",
            VerifyPhase::Done => "done",
        }
    }
}

/// Errors that abort a run before it produces a report.
///
/// Probe and control-plane trouble never lands here; only a setup
/// problem (unusable endpoint URL) does.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Sampler(#[from] SamplerError),
}

/// Coordinates the sampler, the rollout driver, and the report.
pub struct Verifier<C: ControlPlane> {
    config: VerifyConfig,
    control_plane: C,
}

impl<C: ControlPlane> Verifier<C> {
    pub fn new(config: VerifyConfig, control_plane: C) -> Self {
        Self {
            config,
            control_plane,
        }
    }

    /// Run one full verification.
    ///
    /// `cancel` flipping to `true` skips remaining waits and proceeds
    /// to drain/report; the run always terminates with a report once
    /// the sampler has started.
    pub async fn run(
        &self,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<VerificationReport, VerifyError> {
        let config = &self.config;
        let mut phase = VerifyPhase::Idle;

        // Pre-flight: best-effort only, never blocks the run.
        match self.control_plane.ready_replicas(&config.deployment_id).await {
            Ok(replicas) => info!(
                deployment = %config.deployment_id,
                ready_replicas = replicas,
                "pre-flight replica check"
            ),
            Err(e) => warn!(error = %e, "pre-flight replica check failed"),
        }

        let accumulator = Arc::new(Accumulator::new());
        let sampler = Sampler::start(
            SamplerConfig {
                endpoint: config.endpoint.clone(),
                interval: config.probe_interval,
                timeout: config.probe_timeout,
                version_rule: config.version_rule.clone(),
            },
            Arc::clone(&accumulator),
        )?;

        enter(&mut phase, VerifyPhase::Warming);
        let mut interrupted = wait_or_cancel(config.warmup, &mut cancel).await;

        let rollout = if interrupted {
            RolloutObservation::Interrupted
        } else {
            enter(&mut phase, VerifyPhase::RollingOut);
            let driver = RolloutDriver::new(config.rollout_timeout, config.rollout_poll_interval);
            let request = config.rollout_request();

            tokio::select! {
                result = driver.run(&self.control_plane, &request) => {
                    RolloutObservation::Completed(result)
                }
                _ = cancelled(&mut cancel) => {
                    interrupted = true;
                    warn!("run cancelled while waiting on the rollout");
                    RolloutObservation::Interrupted
                }
            }
        };

        enter(&mut phase, VerifyPhase::Draining);
        let drain_started_ms = epoch_millis();
        if !interrupted {
            // Cancellation during drain just cuts the window short.
            wait_or_cancel(config.drain, &mut cancel).await;
        }

        enter(&mut phase, VerifyPhase::Reporting);
        sampler.stop().await;
        let snapshot = accumulator.snapshot();
        info!(
            total = snapshot.total,
            success = snapshot.success_count,
            failure = snapshot.failure_count,
            "sampling finished"
        );

        let report = generate(
            &snapshot,
            rollout,
            drain_started_ms,
            &ReportParams {
                min_success_rate: config.min_success_rate,
                target_revision: config.target_revision.clone(),
            },
        );

        enter(&mut phase, VerifyPhase::Done);
        info!(
            passed = report.passed(),
            violations = report.violations.len(),
            "verification finished"
        );
        Ok(report)
    }
}

fn enter(phase: &mut VerifyPhase, next: VerifyPhase) {
    info!(from = phase.name(), to = next.name(), "phase transition");
    *phase = next;
}

/// Resolve once the cancel flag is (or becomes) `true`.
///
/// A dropped sender means cancellation can never arrive; treat that
/// as "never cancelled" rather than resolving.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Sleep for `duration` unless cancelled first; returns whether the
/// wait was cancelled.
async fn wait_or_cancel(duration: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = cancelled(cancel) => true,
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
