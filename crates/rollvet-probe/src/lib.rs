//! rollvet sampling loop — HTTP probes, response classification,
//! sample accumulation.
//!
//! # Components
//!
//! - **`classifier`** — pure mapping from a raw probe result to an
//!   (outcome, version tag) pair
//! - **`accumulator`** — concurrency-safe sample log and counters
//! - **`sampler`** — background task probing the endpoint at a fixed
//!   interval until stopped

pub mod accumulator;
pub mod classifier;
pub mod sampler;

pub use accumulator::{Accumulator, AccumulatorSnapshot};
pub use classifier::{classify, Classified, ProbeOutcome};
pub use sampler::{probe_endpoint, Sampler, SamplerConfig, SamplerError, SamplerHandle};
