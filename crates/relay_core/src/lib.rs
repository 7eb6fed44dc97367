//! Relay core: pure pipeline logic with no I/O.
//!
//! Everything here is deterministic so the engine can drive it and tests can
//! exercise it without a network, a database or a real memory probe.
mod endpoint;
mod memory;
mod normalize;
mod retry;
mod table;

pub use endpoint::join_endpoint;
pub use memory::{assess, MemorySample, WaitOutcome, WaitStep};
pub use normalize::{normalize, normalize_column_name, NormalizeError};
pub use retry::{
    backoff_delay, classify_status, step, AttemptOutcome, FetchEvent, FetchState, RetryPolicy,
    StatusClass, DEFAULT_MAX_ATTEMPTS, TRANSIENT_STATUSES,
};
pub use table::{NormalizedRow, NormalizedTable};
