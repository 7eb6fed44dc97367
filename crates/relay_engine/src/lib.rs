//! Relay engine: fetch, throttle, load, and the driver that sequences them.
pub mod config;
mod fetch;
mod pipeline;
pub mod sinks;
mod types;
pub mod watchdog;

pub use config::{ConfigError, RelayConfig, SinkConfig, WatchdogConfig};
pub use fetch::{FetchSettings, ResilientFetcher, Sleeper, TokioSleeper};
pub use pipeline::Pipeline;
pub use sinks::Sink;
pub use types::{FailureKind, FetchAttempt, FetchError, PipelineError, RunOutcome, SinkError};
pub use watchdog::{MemoryProbe, SystemProbe};
