//! Domain types for a verification run.
//!
//! These types flow between the sampler (producer), the rollout
//! driver, and the report generator. All are serializable so the CLI
//! can emit them as JSON evidence.

use serde::{Deserialize, Serialize};

// ── Samples ────────────────────────────────────────────────────────

/// Classified outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// 2xx response with a well-formed body.
    Success,
    /// Non-2xx, malformed body, or transport error.
    Failure,
}

/// One classified probe of the service endpoint.
///
/// Immutable once created; the sampler appends one per tick, even
/// when the probe fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Unix timestamp in milliseconds when the probe was issued.
    pub at_ms: u64,
    pub outcome: Outcome,
    /// Revision tag extracted from the response body. `None` for
    /// failures; the configured baseline tag for successes that
    /// carry no version field.
    pub version: Option<String>,
    /// Round-trip latency of the probe.
    pub latency_ms: u64,
}

/// How to extract a version tag from a probe response body.
///
/// Generalizes the two-version demo case: each success is tagged with
/// whatever revision string the body carries, so any number of
/// overlapping revisions count independently during a rollout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRule {
    /// JSON field whose presence marks a well-formed body.
    pub status_field: String,
    /// JSON field carrying the revision tag.
    pub version_field: String,
    /// Tag assigned to successes with no version field.
    pub baseline_tag: String,
}

impl Default for VersionRule {
    fn default() -> Self {
        Self {
            status_field: "status".to_string(),
            version_field: "version".to_string(),
            baseline_tag: "baseline".to_string(),
        }
    }
}

// ── Rollout ────────────────────────────────────────────────────────

/// Parameters handed to the external control plane to start a staged
/// replacement. Immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloutRequest {
    /// Deployment to update.
    pub deployment_id: String,
    /// Revision every instance must report when the rollout is done.
    pub target_revision: String,
    /// Extra instances allowed above the declared replica count.
    pub max_surge: u32,
    /// Instances allowed to be unavailable during the rollout.
    pub max_unavailable: u32,
}

/// Terminal state of a driven rollout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RolloutOutcome {
    /// Control plane confirmed all instances at the target revision.
    Succeeded,
    /// Deadline elapsed before the control plane confirmed.
    TimedOut,
    /// Control plane reported an explicit failure. No automatic
    /// rollback is attempted; remediation is the operator's call.
    Failed { reason: String },
}

/// Result of one rollout attempt, created once by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloutResult {
    #[serde(flatten)]
    pub outcome: RolloutOutcome,
    /// Wall-clock time from trigger to terminal state.
    pub duration_ms: u64,
}

impl RolloutResult {
    pub fn succeeded(&self) -> bool {
        self.outcome == RolloutOutcome::Succeeded
    }
}
