use std::fmt;

use relay_core::NormalizeError;
use thiserror::Error;

/// Failure of one fetch call. `message` carries the response body for
/// status failures so callers can see what the API said.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            FailureKind::Transport | FailureKind::Timeout | FailureKind::TransientStatus(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    InvalidHeader,
    /// Non-transient status; `message` holds the body.
    HttpStatus(u16),
    /// 429 or 5xx worth retrying.
    TransientStatus(u16),
    Timeout,
    Transport,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    InvalidBody,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::InvalidHeader => write!(f, "invalid header"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::TransientStatus(code) => write!(f, "transient http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Transport => write!(f, "transport error"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::InvalidBody => write!(f, "response body is not json"),
        }
    }
}

/// One attempt of a fetch call, as reported in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchAttempt {
    pub endpoint: String,
    pub attempt_index: u32,
    pub max_attempts: u32,
    pub last_failure: Option<FetchError>,
}

impl fmt::Display for FetchAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} attempt {}/{}",
            self.endpoint, self.attempt_index, self.max_attempts
        )?;
        match &self.last_failure {
            Some(err) => write!(f, " failed: {}", err.kind),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("table is missing expected columns: {}", .missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("write failed: {0}")]
    Write(String),
    #[error("load job failed ({reason}): {message}")]
    LoadJob { reason: String, message: String },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("transform failed: {0}")]
    Normalize(#[from] NormalizeError),
    #[error("load to {sink} failed: {source}")]
    Sink {
        sink: String,
        #[source]
        source: SinkError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The API produced nothing to load.
    NoData,
    Loaded { rows: usize, sinks: Vec<String> },
}
