use std::time::Duration;

use chrono::{DateTime, Utc};

/// One reading of memory utilization. Never cached: take a fresh one per decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemorySample {
    /// 0.0 ..= 100.0
    pub percent_used: f64,
    pub sampled_at: DateTime<Utc>,
}

impl MemorySample {
    pub fn now(percent_used: f64) -> Self {
        Self {
            percent_used: percent_used.clamp(0.0, 100.0),
            sampled_at: Utc::now(),
        }
    }

    pub fn exceeds(&self, threshold: f64) -> bool {
        self.percent_used > threshold
    }
}

/// Why a wait ended. Every variant means "proceed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Below,
    Unavailable,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStep {
    Proceed(WaitOutcome),
    /// Still above threshold with time left: reclaim and poll again.
    Throttle,
}

/// Decide whether a memory wait may end.
///
/// An unavailable reading proceeds; the deadline is soft and also proceeds.
pub fn assess(
    sample: Option<&MemorySample>,
    threshold: f64,
    elapsed: Duration,
    max_wait: Duration,
) -> WaitStep {
    match sample {
        None => WaitStep::Proceed(WaitOutcome::Unavailable),
        Some(sample) if !sample.exceeds(threshold) => WaitStep::Proceed(WaitOutcome::Below),
        Some(_) if elapsed >= max_wait => WaitStep::Proceed(WaitOutcome::TimedOut),
        Some(_) => WaitStep::Throttle,
    }
}
