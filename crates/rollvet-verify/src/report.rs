//! Report generation — the final verdict of a verification run.
//!
//! Pure functions over a frozen accumulator snapshot and the rollout
//! observation; no I/O, no clock reads, so every scenario is directly
//! testable.

use std::collections::BTreeMap;

use serde::Serialize;

use rollvet_core::{RolloutOutcome, RolloutResult};
use rollvet_probe::AccumulatorSnapshot;

/// What happened to the rollout during this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloutObservation {
    /// The run observed the endpoint without driving a rollout.
    NotAttempted,
    /// The run was cancelled before the driver reached a terminal
    /// state.
    Interrupted,
    /// The driver returned a terminal result.
    Completed(RolloutResult),
}

/// Thresholds and expectations the report is judged against.
#[derive(Debug, Clone)]
pub struct ReportParams {
    /// Minimum acceptable success rate, within [0.0, 1.0].
    pub min_success_rate: f64,
    /// Revision the rollout was supposed to reach.
    pub target_revision: String,
}

/// Machine-checkable evidence for one verification run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub total_requests: u64,
    pub success_rate: f64,
    pub version_counts: BTreeMap<String, u64>,
    pub average_latency_ms: f64,
    /// Terminal rollout result; `None` when the rollout never
    /// reached one (not attempted, or run cancelled).
    pub rollout: Option<RolloutResult>,
    /// Hard failures: any entry means the run did not prove zero
    /// observable downtime.
    pub violations: Vec<String>,
    /// Soft findings worth an operator's attention.
    pub warnings: Vec<String>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Build the report from a frozen snapshot.
///
/// `drain_started_ms` marks where the overlap window for mixed
/// versions ends: surge instances may serve the old revision while
/// the rollout runs, but once draining begins every success must
/// report the target revision.
pub fn generate(
    snapshot: &AccumulatorSnapshot,
    rollout: RolloutObservation,
    drain_started_ms: u64,
    params: &ReportParams,
) -> VerificationReport {
    let mut violations = Vec::new();
    let mut warnings = Vec::new();

    if snapshot.total == 0 {
        violations.push("no samples collected; verification could not run".to_string());
    } else if snapshot.success_rate() < params.min_success_rate {
        violations.push(format!(
            "success rate {:.4} below threshold {:.4} ({} of {} probes failed)",
            snapshot.success_rate(),
            params.min_success_rate,
            snapshot.failure_count,
            snapshot.total,
        ));
    }

    let rollout_result = match rollout {
        RolloutObservation::NotAttempted => {
            warnings.push("no rollout was driven during this run".to_string());
            None
        }
        RolloutObservation::Interrupted => {
            violations
                .push("rollout did not complete: run cancelled before confirmation".to_string());
            None
        }
        RolloutObservation::Completed(result) => {
            match &result.outcome {
                RolloutOutcome::Succeeded => {
                    check_version_transition(
                        snapshot,
                        drain_started_ms,
                        params,
                        &mut violations,
                        &mut warnings,
                    );
                }
                RolloutOutcome::TimedOut => violations.push(format!(
                    "rollout did not complete within {} ms",
                    result.duration_ms
                )),
                RolloutOutcome::Failed { reason } => {
                    violations.push(format!("rollout failed: {reason}"))
                }
            }
            Some(result)
        }
    };

    if snapshot.total > 0 && snapshot.version_counts.len() <= 1 {
        warnings.push("no version transition observed".to_string());
    }

    VerificationReport {
        total_requests: snapshot.total,
        success_rate: snapshot.success_rate(),
        version_counts: snapshot.version_counts.clone(),
        average_latency_ms: snapshot.average_latency_ms(),
        rollout: rollout_result,
        violations,
        warnings,
    }
}

/// Regression check for a rollout the control plane confirmed.
///
/// Old-revision samples during the rollout are expected (surge
/// overlap); old-revision samples after drain began mean the fleet
/// regressed or the control plane confirmed too early.
fn check_version_transition(
    snapshot: &AccumulatorSnapshot,
    drain_started_ms: u64,
    params: &ReportParams,
    violations: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    let target = &params.target_revision;

    if !snapshot.version_counts.contains_key(target) {
        warnings.push(format!(
            "target revision {target:?} never observed in samples"
        ));
        return;
    }

    let mut stale: BTreeMap<&str, u64> = BTreeMap::new();
    for sample in &snapshot.samples {
        if sample.at_ms < drain_started_ms {
            continue;
        }
        if let Some(version) = &sample.version {
            if version != target {
                *stale.entry(version.as_str()).or_insert(0) += 1;
            }
        }
    }

    if !stale.is_empty() {
        let detail: Vec<String> = stale
            .iter()
            .map(|(tag, count)| format!("{tag:?} x{count}"))
            .collect();
        violations.push(format!(
            "version regression: non-target samples after drain began: {}",
            detail.join(", ")
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollvet_core::{Outcome, Sample};

    const DRAIN_AT: u64 = 10_000;

    fn params() -> ReportParams {
        ReportParams {
            min_success_rate: 1.0,
            target_revision: "2.0".to_string(),
        }
    }

    fn sample(at_ms: u64, outcome: Outcome, version: Option<&str>) -> Sample {
        Sample {
            at_ms,
            outcome,
            version: version.map(str::to_string),
            latency_ms: 10,
        }
    }

    fn snapshot_from(samples: Vec<Sample>) -> AccumulatorSnapshot {
        let acc = rollvet_probe::Accumulator::new();
        for s in samples {
            acc.record(s);
        }
        acc.snapshot()
    }

    fn succeeded() -> RolloutObservation {
        RolloutObservation::Completed(RolloutResult {
            outcome: RolloutOutcome::Succeeded,
            duration_ms: 4_000,
        })
    }

    /// Scenario A: clean run, rollout confirmed in time.
    #[test]
    fn clean_run_passes() {
        let snapshot = snapshot_from(vec![
            sample(1_000, Outcome::Success, Some("1.0")),
            sample(2_000, Outcome::Success, Some("1.0")),
            sample(6_000, Outcome::Success, Some("2.0")),
            sample(11_000, Outcome::Success, Some("2.0")),
        ]);

        let report = generate(&snapshot, succeeded(), DRAIN_AT, &params());
        assert!(report.passed(), "violations: {:?}", report.violations);
        assert_eq!(report.success_rate, 1.0);
        assert_eq!(report.total_requests, 4);
        assert!(report.rollout.unwrap().succeeded());
    }

    /// Scenario B: two failed probes against a 100% threshold.
    #[test]
    fn transient_failures_flag_threshold() {
        let snapshot = snapshot_from(vec![
            sample(1_000, Outcome::Success, Some("1.0")),
            sample(2_000, Outcome::Failure, None),
            sample(3_000, Outcome::Failure, None),
            sample(6_000, Outcome::Success, Some("2.0")),
            sample(11_000, Outcome::Success, Some("2.0")),
        ]);

        let report = generate(&snapshot, succeeded(), DRAIN_AT, &params());
        assert!(!report.passed());
        assert!(report.success_rate < 1.0);
        assert!(report.violations.iter().any(|v| v.contains("success rate")));
        assert!(
            report
                .violations
                .iter()
                .any(|v| v.contains("2 of 5 probes failed")),
            "violations: {:?}",
            report.violations
        );
    }

    /// Scenario B variant: a lower threshold tolerates the blip.
    #[test]
    fn lenient_threshold_tolerates_failures() {
        let snapshot = snapshot_from(vec![
            sample(1_000, Outcome::Success, Some("1.0")),
            sample(2_000, Outcome::Failure, None),
            sample(6_000, Outcome::Success, Some("2.0")),
            sample(7_000, Outcome::Success, Some("2.0")),
        ]);
        let params = ReportParams {
            min_success_rate: 0.7,
            target_revision: "2.0".to_string(),
        };

        let report = generate(&snapshot, succeeded(), DRAIN_AT, &params);
        assert!(report.passed(), "violations: {:?}", report.violations);
    }

    /// Scenario C: rollout timed out; samples alone cannot pass it.
    #[test]
    fn timed_out_rollout_is_a_violation() {
        let snapshot = snapshot_from(vec![
            sample(1_000, Outcome::Success, Some("1.0")),
            sample(2_000, Outcome::Success, Some("1.0")),
        ]);
        let rollout = RolloutObservation::Completed(RolloutResult {
            outcome: RolloutOutcome::TimedOut,
            duration_ms: 120_000,
        });

        let report = generate(&snapshot, rollout, DRAIN_AT, &params());
        assert_eq!(report.success_rate, 1.0);
        assert!(!report.passed());
        assert!(
            report
                .violations
                .iter()
                .any(|v| v.contains("did not complete")),
            "violations: {:?}",
            report.violations
        );
    }

    /// Scenario D: baseline-only run with no rollout driven.
    #[test]
    fn baseline_only_run_warns_without_violations() {
        let snapshot = snapshot_from(vec![
            sample(1_000, Outcome::Success, Some("baseline")),
            sample(2_000, Outcome::Success, Some("baseline")),
            sample(3_000, Outcome::Success, Some("baseline")),
        ]);

        let report = generate(
            &snapshot,
            RolloutObservation::NotAttempted,
            DRAIN_AT,
            &params(),
        );
        assert!(report.passed(), "violations: {:?}", report.violations);
        assert_eq!(report.version_counts["baseline"], 3);
        assert!(
            report
                .warnings
                .iter()
                .any(|w| w.contains("no version transition observed")),
            "warnings: {:?}",
            report.warnings
        );
    }

    #[test]
    fn empty_snapshot_is_a_violation() {
        let report = generate(
            &snapshot_from(vec![]),
            succeeded(),
            DRAIN_AT,
            &params(),
        );
        assert!(!report.passed());
        assert_eq!(report.success_rate, 0.0);
        assert!(report.violations.iter().any(|v| v.contains("no samples")));
    }

    #[test]
    fn failed_rollout_surfaces_reason() {
        let rollout = RolloutObservation::Completed(RolloutResult {
            outcome: RolloutOutcome::Failed {
                reason: "crash-looping".to_string(),
            },
            duration_ms: 9_000,
        });
        let snapshot = snapshot_from(vec![sample(1_000, Outcome::Success, Some("1.0"))]);

        let report = generate(&snapshot, rollout, DRAIN_AT, &params());
        assert!(
            report
                .violations
                .iter()
                .any(|v| v.contains("crash-looping")),
            "violations: {:?}",
            report.violations
        );
    }

    #[test]
    fn interrupted_rollout_is_a_violation() {
        let snapshot = snapshot_from(vec![sample(1_000, Outcome::Success, Some("1.0"))]);
        let report = generate(
            &snapshot,
            RolloutObservation::Interrupted,
            DRAIN_AT,
            &params(),
        );
        assert!(!report.passed());
        assert!(report.rollout.is_none());
        assert!(report.violations.iter().any(|v| v.contains("cancelled")));
    }

    #[test]
    fn overlap_before_drain_is_allowed() {
        // Old revision still answering while surge instances roll.
        let snapshot = snapshot_from(vec![
            sample(1_000, Outcome::Success, Some("1.0")),
            sample(6_000, Outcome::Success, Some("2.0")),
            sample(7_000, Outcome::Success, Some("1.0")),
            sample(11_000, Outcome::Success, Some("2.0")),
        ]);

        let report = generate(&snapshot, succeeded(), DRAIN_AT, &params());
        assert!(report.passed(), "violations: {:?}", report.violations);
    }

    #[test]
    fn old_version_after_drain_is_a_regression() {
        let snapshot = snapshot_from(vec![
            sample(1_000, Outcome::Success, Some("1.0")),
            sample(6_000, Outcome::Success, Some("2.0")),
            sample(11_000, Outcome::Success, Some("2.0")),
            sample(12_000, Outcome::Success, Some("1.0")),
        ]);

        let report = generate(&snapshot, succeeded(), DRAIN_AT, &params());
        assert!(!report.passed());
        assert!(
            report
                .violations
                .iter()
                .any(|v| v.contains("version regression") && v.contains("\"1.0\" x1")),
            "violations: {:?}",
            report.violations
        );
    }

    #[test]
    fn succeeded_rollout_without_target_samples_warns() {
        let snapshot = snapshot_from(vec![
            sample(1_000, Outcome::Success, Some("1.0")),
            sample(11_000, Outcome::Success, Some("1.0")),
        ]);

        let report = generate(&snapshot, succeeded(), DRAIN_AT, &params());
        // Not a hard violation: the endpoint may simply not report
        // versions yet. But it is called out.
        assert!(
            report
                .warnings
                .iter()
                .any(|w| w.contains("never observed")),
            "warnings: {:?}",
            report.warnings
        );
    }

    #[test]
    fn report_serializes_to_json() {
        let snapshot = snapshot_from(vec![sample(1_000, Outcome::Success, Some("2.0"))]);
        let report = generate(&snapshot, succeeded(), DRAIN_AT, &params());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["total_requests"], 1);
        assert_eq!(json["rollout"]["status"], "succeeded");
    }
}
