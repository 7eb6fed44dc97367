use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Statuses worth another try: rate limiting and momentary server trouble.
pub const TRANSIENT_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Transient,
    Fatal,
}

/// Only an exact 200 counts as success; other 2xx/3xx codes are fatal.
pub fn classify_status(status: u16) -> StatusClass {
    if status == 200 {
        StatusClass::Success
    } else if TRANSIENT_STATUSES.contains(&status) {
        StatusClass::Transient
    } else {
        StatusClass::Fatal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Pause after failed attempt `attempt` (1-based): 2, 4, 8, 16, ... seconds.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    /// Attempt `n` (1-based) is in flight.
    Attempting(u32),
    /// Attempt `attempt` failed transiently; sleep `delay` before the next one.
    Retrying { attempt: u32, delay: Duration },
    Success,
    Failed,
    Exhausted,
}

impl FetchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FetchState::Success | FetchState::Failed | FetchState::Exhausted
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Transient,
    Fatal,
}

impl From<StatusClass> for AttemptOutcome {
    fn from(class: StatusClass) -> Self {
        match class {
            StatusClass::Success => AttemptOutcome::Success,
            StatusClass::Transient => AttemptOutcome::Transient,
            StatusClass::Fatal => AttemptOutcome::Fatal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchEvent {
    Begin,
    Completed(AttemptOutcome),
    BackoffElapsed,
}

/// Pure transition function for one fetch call.
///
/// Events that do not apply to the current state leave it unchanged.
pub fn step(state: FetchState, event: FetchEvent, policy: &RetryPolicy) -> FetchState {
    match (state, event) {
        (FetchState::Idle, FetchEvent::Begin) => {
            if policy.max_attempts == 0 {
                FetchState::Exhausted
            } else {
                FetchState::Attempting(1)
            }
        }
        (FetchState::Attempting(_), FetchEvent::Completed(AttemptOutcome::Success)) => {
            FetchState::Success
        }
        (FetchState::Attempting(_), FetchEvent::Completed(AttemptOutcome::Fatal)) => {
            FetchState::Failed
        }
        (FetchState::Attempting(n), FetchEvent::Completed(AttemptOutcome::Transient)) => {
            if n >= policy.max_attempts {
                FetchState::Exhausted
            } else {
                FetchState::Retrying {
                    attempt: n,
                    delay: backoff_delay(n),
                }
            }
        }
        (FetchState::Retrying { attempt, .. }, FetchEvent::BackoffElapsed) => {
            FetchState::Attempting(attempt + 1)
        }
        (state, _) => state,
    }
}
