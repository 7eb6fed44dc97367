//! Best-effort memory throttle.
//!
//! Free functions over a [`MemoryProbe`]; thresholds are passed on every call
//! and nothing is cached, so each decision sees a fresh sample. Memory
//! pressure is advisory: an unavailable metric or an expired deadline both
//! resolve to "proceed".

use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use relay_core::{assess, MemorySample, WaitOutcome, WaitStep};
use sysinfo::System;
use tokio::time::Instant;

/// Interval between samples while waiting for headroom.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Pause after a reclamation pass so dropped buffers can be released.
pub const RECLAIM_PAUSE: Duration = Duration::from_millis(500);

pub trait MemoryProbe: Send + Sync {
    /// Current utilization in percent, or `None` if the host does not expose it.
    fn percent_used(&self) -> Option<f64>;
}

/// Host memory utilization read through `sysinfo`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl MemoryProbe for SystemProbe {
    fn percent_used(&self) -> Option<f64> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return None;
        }
        let mut system = System::new();
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return None;
        }
        Some(system.used_memory() as f64 / total as f64 * 100.0)
    }
}

pub fn sample(probe: &dyn MemoryProbe) -> Option<MemorySample> {
    probe.percent_used().map(MemorySample::now)
}

/// Reclaim if the current sample is above `threshold`. Returns whether it did.
///
/// Reclaiming is a pause after the caller has dropped its buffers; freed heap
/// goes back to the allocator, nothing is forced out of the process.
pub async fn reclaim(probe: &dyn MemoryProbe, threshold: f64) -> bool {
    let Some(current) = sample(probe) else {
        return false;
    };
    if !current.exceeds(threshold) {
        return false;
    }

    engine_info!(
        "Memory at {:.1}% (threshold {:.1}%), reclaiming",
        current.percent_used,
        threshold
    );
    tokio::time::sleep(RECLAIM_PAUSE).await;
    true
}

/// Block until memory is at or below `threshold`, the metric is unavailable,
/// or `max_wait` has elapsed. Never fails.
///
/// The final poll is clamped to the deadline, so this returns within
/// `max_wait + POLL_INTERVAL`.
pub async fn wait_until_below(
    probe: &dyn MemoryProbe,
    threshold: f64,
    max_wait: Duration,
) -> WaitOutcome {
    let started = Instant::now();
    loop {
        let current = sample(probe);
        match assess(current.as_ref(), threshold, started.elapsed(), max_wait) {
            WaitStep::Proceed(outcome) => {
                match outcome {
                    WaitOutcome::Below => {}
                    WaitOutcome::Unavailable => {
                        engine_debug!("Memory metric unavailable; proceeding")
                    }
                    WaitOutcome::TimedOut => engine_warn!(
                        "Memory still above {:.1}% after {}s; proceeding anyway",
                        threshold,
                        max_wait.as_secs()
                    ),
                }
                return outcome;
            }
            WaitStep::Throttle => {
                reclaim(probe, threshold).await;
                let remaining = max_wait.saturating_sub(started.elapsed());
                tokio::time::sleep(POLL_INTERVAL.min(remaining)).await;
            }
        }
    }
}
