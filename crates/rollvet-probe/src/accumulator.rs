//! Sample accumulator — the only mutable state shared across tasks.
//!
//! The sampler is the sole writer; the report generator reads a
//! snapshot after the sampler has stopped. Both operations take the
//! same mutex for their full duration, so a snapshot reflects each
//! record fully or not at all.

use std::collections::BTreeMap;
use std::sync::Mutex;

use rollvet_core::{Outcome, Sample};

#[derive(Debug, Default)]
struct Inner {
    total: u64,
    success_count: u64,
    failure_count: u64,
    version_counts: BTreeMap<String, u64>,
    latency_sum_ms: u64,
    samples: Vec<Sample>,
}

impl Inner {
    /// Counters inconsistent with the log mean a concurrency bug;
    /// abort rather than emit a misleading report.
    fn assert_consistent(&self) {
        assert_eq!(
            self.total,
            self.success_count + self.failure_count,
            "accumulator invariant violated: total {} != success {} + failure {}",
            self.total,
            self.success_count,
            self.failure_count,
        );
        assert_eq!(
            self.total as usize,
            self.samples.len(),
            "accumulator invariant violated: total {} != sample log length {}",
            self.total,
            self.samples.len(),
        );
    }
}

/// Concurrency-safe aggregator of probe samples.
#[derive(Debug, Default)]
pub struct Accumulator {
    inner: Mutex<Inner>,
}

/// Immutable copy of the accumulator state at one moment.
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulatorSnapshot {
    pub total: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub version_counts: BTreeMap<String, u64>,
    pub latency_sum_ms: u64,
    pub samples: Vec<Sample>,
}

impl AccumulatorSnapshot {
    /// Fraction of successful samples, 0.0 when empty.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.success_count as f64 / self.total as f64
        }
    }

    /// Mean probe latency in milliseconds, 0.0 when empty.
    pub fn average_latency_ms(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.latency_sum_ms as f64 / self.total as f64
        }
    }
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically append a sample and bump the counters.
    pub fn record(&self, sample: Sample) {
        // A poisoned lock means a panic mid-update; abort instead of
        // reporting numbers that may be torn.
        let mut inner = self.inner.lock().expect("accumulator lock poisoned");

        inner.total += 1;
        match sample.outcome {
            Outcome::Success => inner.success_count += 1,
            Outcome::Failure => inner.failure_count += 1,
        }
        if let Some(version) = &sample.version {
            *inner.version_counts.entry(version.clone()).or_insert(0) += 1;
        }
        inner.latency_sum_ms += sample.latency_ms;
        inner.samples.push(sample);

        inner.assert_consistent();
    }

    /// Immutable copy of all counters and the sample log.
    pub fn snapshot(&self) -> AccumulatorSnapshot {
        let inner = self.inner.lock().expect("accumulator lock poisoned");
        inner.assert_consistent();

        AccumulatorSnapshot {
            total: inner.total,
            success_count: inner.success_count,
            failure_count: inner.failure_count,
            version_counts: inner.version_counts.clone(),
            latency_sum_ms: inner.latency_sum_ms,
            samples: inner.samples.clone(),
        }
    }
}
