//! rollvet.toml configuration parser.
//!
//! The raw file keeps durations as human strings ("250ms", "5s");
//! loading validates them into [`std::time::Duration`] so bad values
//! fail at startup, not mid-run.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::duration::parse_duration;
use crate::types::{RolloutRequest, VersionRule};

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration for `{field}`: {value:?}")]
    InvalidDuration { field: &'static str, value: String },

    #[error("missing required field `{0}`")]
    Missing(&'static str),

    #[error("`run.min_success_rate` must be within [0.0, 1.0], got {0}")]
    InvalidThreshold(f64),
}

/// Validated verification-run configuration.
#[derive(Debug, Clone)]
pub struct VerifyConfig {
    /// URL of the probed endpoint, e.g. `http://10.0.0.5:8080/health`.
    pub endpoint: String,
    /// Base URL of the control plane API.
    pub control_plane: String,
    /// Deployment the rollout targets.
    pub deployment_id: String,
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    pub warmup: Duration,
    pub drain: Duration,
    /// Minimum acceptable success rate for a passing report.
    pub min_success_rate: f64,
    pub target_revision: String,
    pub max_surge: u32,
    pub max_unavailable: u32,
    pub rollout_timeout: Duration,
    pub rollout_poll_interval: Duration,
    pub version_rule: VersionRule,
}

impl VerifyConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content)?;
        raw.validate()
    }

    /// The rollout request this run will hand to the control plane.
    pub fn rollout_request(&self) -> RolloutRequest {
        RolloutRequest {
            deployment_id: self.deployment_id.clone(),
            target_revision: self.target_revision.clone(),
            max_surge: self.max_surge,
            max_unavailable: self.max_unavailable,
        }
    }
}

// ── Raw file schema ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawConfig {
    endpoint: Option<String>,
    control_plane: Option<String>,
    deployment: Option<String>,
    probe: Option<RawProbe>,
    run: Option<RawRun>,
    rollout: Option<RawRollout>,
    version: Option<RawVersion>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawProbe {
    interval: Option<String>,
    timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawRun {
    warmup: Option<String>,
    drain: Option<String>,
    min_success_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawRollout {
    target_revision: Option<String>,
    max_surge: Option<u32>,
    max_unavailable: Option<u32>,
    timeout: Option<String>,
    poll_interval: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawVersion {
    status_field: Option<String>,
    version_field: Option<String>,
    baseline_tag: Option<String>,
}

fn duration_field(
    field: &'static str,
    value: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(default),
        Some(s) => parse_duration(&s)
            .ok_or(ConfigError::InvalidDuration { field, value: s }),
    }
}

impl RawConfig {
    fn validate(self) -> Result<VerifyConfig, ConfigError> {
        let endpoint = self.endpoint.ok_or(ConfigError::Missing("endpoint"))?;
        let control_plane = self
            .control_plane
            .ok_or(ConfigError::Missing("control_plane"))?;
        let deployment_id = self.deployment.ok_or(ConfigError::Missing("deployment"))?;

        let probe = self.probe.unwrap_or_default();
        let run = self.run.unwrap_or_default();
        let rollout = self.rollout.unwrap_or_default();
        let version = self.version.unwrap_or_default();

        let target_revision = rollout
            .target_revision
            .ok_or(ConfigError::Missing("rollout.target_revision"))?;

        let min_success_rate = run.min_success_rate.unwrap_or(1.0);
        if !(0.0..=1.0).contains(&min_success_rate) {
            return Err(ConfigError::InvalidThreshold(min_success_rate));
        }

        let defaults = VersionRule::default();

        Ok(VerifyConfig {
            endpoint,
            control_plane,
            deployment_id,
            probe_interval: duration_field(
                "probe.interval",
                probe.interval,
                Duration::from_millis(250),
            )?,
            probe_timeout: duration_field(
                "probe.timeout",
                probe.timeout,
                Duration::from_secs(2),
            )?,
            warmup: duration_field("run.warmup", run.warmup, Duration::from_secs(5))?,
            drain: duration_field("run.drain", run.drain, Duration::from_secs(5))?,
            min_success_rate,
            target_revision,
            max_surge: rollout.max_surge.unwrap_or(1),
            max_unavailable: rollout.max_unavailable.unwrap_or(0),
            rollout_timeout: duration_field(
                "rollout.timeout",
                rollout.timeout,
                Duration::from_secs(120),
            )?,
            rollout_poll_interval: duration_field(
                "rollout.poll_interval",
                rollout.poll_interval,
                Duration::from_secs(1),
            )?,
            version_rule: VersionRule {
                status_field: version.status_field.unwrap_or(defaults.status_field),
                version_field: version.version_field.unwrap_or(defaults.version_field),
                baseline_tag: version.baseline_tag.unwrap_or(defaults.baseline_tag),
            },
        })
    }
}
