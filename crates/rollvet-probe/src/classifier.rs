//! Response classification.
//!
//! Maps a raw probe result to an (outcome, version tag) pair.
//! Deterministic and side-effect-free so it can be tested without a
//! live endpoint.

use bytes::Bytes;

use rollvet_core::{Outcome, VersionRule};

/// Raw result of one probe, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The endpoint answered with an HTTP response.
    Response { status: u16, body: Bytes },
    /// The probe never produced a response: timeout, connection
    /// refused, or a broken handshake.
    TransportError,
}

/// Classified probe result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub outcome: Outcome,
    /// Revision tag for successes; `None` for failures.
    pub version: Option<String>,
}

impl Classified {
    fn failure() -> Self {
        Self {
            outcome: Outcome::Failure,
            version: None,
        }
    }
}

/// Classify a probe result.
///
/// Success requires a 2xx status and a JSON object body containing
/// the configured status field. On success the version tag is taken
/// from the configured version field, falling back to the baseline
/// tag when the field is absent (a pre-rollout build that predates
/// version reporting). Failures never carry a tag.
pub fn classify(probe: &ProbeOutcome, rule: &VersionRule) -> Classified {
    let (status, body) = match probe {
        ProbeOutcome::Response { status, body } => (*status, body),
        ProbeOutcome::TransportError => return Classified::failure(),
    };

    if !(200..300).contains(&status) {
        return Classified::failure();
    }

    let parsed: serde_json::Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(_) => return Classified::failure(),
    };

    let object = match parsed.as_object() {
        Some(o) => o,
        None => return Classified::failure(),
    };

    if !object.contains_key(&rule.status_field) {
        return Classified::failure();
    }

    let version = object
        .get(&rule.version_field)
        .and_then(|v| v.as_str())
        .unwrap_or(&rule.baseline_tag)
        .to_string();

    Classified {
        outcome: Outcome::Success,
        version: Some(version),
    }
}
