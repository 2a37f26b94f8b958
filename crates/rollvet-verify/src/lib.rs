//! rollvet verification orchestrator — warm-up, rollout, drain, report.
//!
//! Ties the sampling loop and the rollout driver together and turns
//! what they observed into a pass/fail [`VerificationReport`].
//!
//! # Components
//!
//! - **`orchestrator`** — the run's phase machine and cancellation
//! - **`report`** — pure verdict generation from a frozen snapshot

pub mod orchestrator;
pub mod report;

pub use orchestrator::{Verifier, VerifyError, VerifyPhase};
pub use report::{generate, ReportParams, RolloutObservation, VerificationReport};
