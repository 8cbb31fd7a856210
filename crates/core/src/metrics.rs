use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Timing sample for one workflow step.
#[derive(Debug, Clone)]
pub struct StepSample {
    pub step: String,
    /// Time since the run started.
    pub cumulative: Duration,
    /// Duration of this step alone.
    pub elapsed: Duration,
}

/// Point-in-time view of a run's metrics.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub total_tokens: u64,
    pub duration: Duration,
    pub steps: Vec<StepSample>,
}

#[derive(Debug)]
struct Inner {
    total_tokens: u64,
    started: Instant,
    last: Instant,
    steps: Vec<StepSample>,
}

/// Token and timing tracker shared by every phase of a run.
///
/// Cheap to clone; all clones mutate the same counters. Never serialized
/// with the checkpointed state. Each concurrent run gets its own tracker.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<Mutex<Inner>>,
}

impl Metrics {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            inner: Arc::new(Mutex::new(Inner {
                total_tokens: 0,
                started: now,
                last: now,
                steps: Vec::new(),
            })),
        }
    }

    pub fn add_tokens(&self, count: u64) {
        if count == 0 {
            return;
        }
        let mut inner = self.inner.lock().expect("metrics lock poisoned");
        inner.total_tokens += count;
    }

    /// Record the completion of a workflow step and its duration delta.
    pub fn log_step(&self, step: impl Into<String>) {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("metrics lock poisoned");
        let sample = StepSample {
            step: step.into(),
            cumulative: now.duration_since(inner.started),
            elapsed: now.duration_since(inner.last),
        };
        inner.last = now;
        inner.steps.push(sample);
    }

    pub fn total_tokens(&self) -> u64 {
        self.inner.lock().expect("metrics lock poisoned").total_tokens
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock().expect("metrics lock poisoned");
        MetricsSnapshot {
            total_tokens: inner.total_tokens,
            duration: inner.started.elapsed(),
            steps: inner.steps.clone(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_accumulation() {
        let metrics = Metrics::new();
        metrics.add_tokens(120);
        metrics.add_tokens(0);
        metrics.add_tokens(30);

        assert_eq!(metrics.total_tokens(), 150);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = Metrics::new();
        let other = metrics.clone();
        other.add_tokens(42);

        assert_eq!(metrics.total_tokens(), 42);
    }

    #[test]
    fn test_step_samples() {
        let metrics = Metrics::new();
        metrics.log_step("Exploration");
        metrics.log_step("Design");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.steps.len(), 2);
        assert_eq!(snapshot.steps[0].step, "Exploration");
        assert!(snapshot.steps[1].cumulative >= snapshot.steps[0].cumulative);
    }
}
