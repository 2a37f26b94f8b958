//! Control plane seam.
//!
//! The orchestration platform that actually replaces instances is a
//! black box to the verifier. Everything it needs is behind this
//! trait: trigger an update, read rollout status, and a best-effort
//! ready-replica count used only for pre-flight sanity checks.

use async_trait::async_trait;
use thiserror::Error;

use rollvet_core::RolloutRequest;

/// Errors from talking to the control plane.
///
/// These never abort a verification run; the driver absorbs them into
/// the rollout result and the pre-flight check reports them.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("invalid control plane URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("control plane request failed: {0}")]
    Request(String),

    #[error("control plane returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("control plane response malformed: {0}")]
    Decode(String),
}

/// Rollout state as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlPlaneStatus {
    /// Instances are still being replaced.
    InProgress,
    /// All instances report the target revision and are ready.
    Complete,
    /// The control plane gave up (e.g. crash-looping new instances).
    Failed { reason: String },
}

/// Operations the verifier needs from the orchestration platform.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Ask the control plane to start the staged replacement.
    async fn trigger_update(&self, request: &RolloutRequest) -> Result<(), DriverError>;

    /// Current status of the rollout for a deployment.
    async fn rollout_status(
        &self,
        deployment_id: &str,
    ) -> Result<ControlPlaneStatus, DriverError>;

    /// Best-effort count of ready replicas, for pre-flight checks.
    async fn ready_replicas(&self, deployment_id: &str) -> Result<u32, DriverError>;
}
