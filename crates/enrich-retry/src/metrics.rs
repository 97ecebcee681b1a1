//! Failure metrics sink: `pipeline_failures_total{step=...}`
//! (`spec.md` §4.8), grounded on the teacher's `RuntimeObserver`
//! (`abp-runtime::observe`) rather than pulling in a Prometheus client
//! the corpus never depends on.

use std::collections::BTreeMap;
use std::sync::Mutex;

/// Counts stage failures by step name. Cheap to share: clone the
/// `Arc<FailureMetricsSink>` handed to every stage worker.
#[derive(Debug, Default)]
pub struct FailureMetricsSink {
    counts: Mutex<BTreeMap<String, u64>>,
}

impl FailureMetricsSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment `pipeline_failures_total{step=<step>}` by one.
    pub fn record_failure(&self, step: &str) {
        let mut counts = self.counts.lock().expect("metrics mutex poisoned");
        *counts.entry(step.to_string()).or_insert(0) += 1;
    }

    /// The current failure count for `step`.
    #[must_use]
    pub fn failures_for(&self, step: &str) -> u64 {
        self.counts
            .lock()
            .expect("metrics mutex poisoned")
            .get(step)
            .copied()
            .unwrap_or(0)
    }

    /// A point-in-time snapshot of every step's failure count, suitable
    /// for logging or scraping.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counts.lock().expect("metrics mutex poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_per_step_independently() {
        let sink = FailureMetricsSink::new();
        sink.record_failure("asr");
        sink.record_failure("asr");
        sink.record_failure("docqa");
        assert_eq!(sink.failures_for("asr"), 2);
        assert_eq!(sink.failures_for("docqa"), 1);
        assert_eq!(sink.failures_for("vqa"), 0);
    }
}
