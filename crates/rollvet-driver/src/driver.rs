//! Rollout driver — trigger, then poll to a terminal result.
//!
//! Every control-plane misbehavior becomes data in the returned
//! [`RolloutResult`]; the driver itself never fails. A rollout that
//! misses the deadline is `TimedOut`, an explicit control-plane
//! failure is `Failed`, and no automatic rollback is attempted.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use rollvet_core::{RolloutOutcome, RolloutRequest, RolloutResult};

use crate::control_plane::{ControlPlane, ControlPlaneStatus};

/// Drives one rollout to completion, failure, or timeout.
#[derive(Debug, Clone)]
pub struct RolloutDriver {
    /// Deadline for the whole trigger-and-wait operation.
    pub timeout: Duration,
    /// How often to poll the control plane's status.
    pub poll_interval: Duration,
}

impl RolloutDriver {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Trigger the update and block until the control plane reports a
    /// terminal state or the deadline passes.
    pub async fn run<C: ControlPlane + ?Sized>(
        &self,
        control_plane: &C,
        request: &RolloutRequest,
    ) -> RolloutResult {
        let started = Instant::now();
        let result = |outcome| RolloutResult {
            outcome,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            deployment = %request.deployment_id,
            target_revision = %request.target_revision,
            max_surge = request.max_surge,
            max_unavailable = request.max_unavailable,
            "triggering rollout"
        );

        if let Err(e) = control_plane.trigger_update(request).await {
            warn!(error = %e, "rollout trigger rejected");
            return result(RolloutOutcome::Failed {
                reason: format!("trigger failed: {e}"),
            });
        }

        loop {
            match control_plane.rollout_status(&request.deployment_id).await {
                Ok(ControlPlaneStatus::Complete) => {
                    info!(
                        deployment = %request.deployment_id,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "rollout completed"
                    );
                    return result(RolloutOutcome::Succeeded);
                }
                Ok(ControlPlaneStatus::Failed { reason }) => {
                    warn!(deployment = %request.deployment_id, %reason, "rollout failed");
                    return result(RolloutOutcome::Failed { reason });
                }
                Ok(ControlPlaneStatus::InProgress) => {}
                // Transient status-read trouble: keep polling until
                // the deadline decides.
                Err(e) => warn!(error = %e, "rollout status read failed, retrying"),
            }

            let elapsed = started.elapsed();
            if elapsed >= self.timeout {
                warn!(
                    deployment = %request.deployment_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "rollout did not complete before deadline"
                );
                return result(RolloutOutcome::TimedOut);
            }
            tokio::time::sleep(self.poll_interval.min(self.timeout - elapsed)).await;
        }
    }
}
