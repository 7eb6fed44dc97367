use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::StreamExt;
use relay_core::{
    classify_status, join_endpoint, step, AttemptOutcome, FetchEvent, FetchState, RetryPolicy,
    StatusClass, DEFAULT_MAX_ATTEMPTS,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use crate::config::DEFAULT_API_BASE_URL;
use crate::{FailureKind, FetchAttempt, FetchError};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub base_url: String,
    pub headers: Vec<(String, String)>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
    pub max_attempts: u32,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            headers: Vec::new(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_bytes: 20 * 1024 * 1024,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl FetchSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
        }
    }
}

/// Backoff pauses go through this so callers can observe or skip them.
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// GET client with bounded retries and exponential backoff.
///
/// Transient failures (429/5xx from [`relay_core::TRANSIENT_STATUSES`], network
/// errors, timeouts) are retried; anything else fails the call at once.
/// Running out of attempts is not an error: [`ResilientFetcher::request`]
/// returns `Ok(None)`.
#[derive(Clone)]
pub struct ResilientFetcher {
    settings: FetchSettings,
    client: reqwest::Client,
    sleeper: Arc<dyn Sleeper>,
}

impl ResilientFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = build_client(&settings)?;
        Ok(Self {
            settings,
            client,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    pub async fn request(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<Option<Value>, FetchError> {
        let url = self.build_url(endpoint, params)?;
        let policy = self.settings.retry_policy();
        let mut state = FetchState::Idle;
        let mut last: Option<Result<Value, FetchError>> = None;

        loop {
            match state {
                FetchState::Idle => {
                    state = step(state, FetchEvent::Begin, &policy);
                }
                FetchState::Attempting(attempt_index) => {
                    engine_debug!("GET {} (attempt {}/{})", url, attempt_index, policy.max_attempts);
                    let result = self.attempt(url.clone()).await;
                    let outcome = match &result {
                        Ok(_) => AttemptOutcome::Success,
                        Err(err) if err.is_transient() => AttemptOutcome::Transient,
                        Err(_) => AttemptOutcome::Fatal,
                    };
                    if let Err(err) = &result {
                        let attempt = FetchAttempt {
                            endpoint: endpoint.to_string(),
                            attempt_index,
                            max_attempts: policy.max_attempts,
                            last_failure: Some(err.clone()),
                        };
                        engine_warn!("{}", attempt);
                    }
                    last = Some(result);
                    state = step(state, FetchEvent::Completed(outcome), &policy);
                }
                FetchState::Retrying { attempt, delay } => {
                    engine_info!(
                        "Retrying {} in {}s after attempt {}/{}",
                        endpoint,
                        delay.as_secs(),
                        attempt,
                        policy.max_attempts
                    );
                    self.sleeper.sleep(delay).await;
                    state = step(state, FetchEvent::BackoffElapsed, &policy);
                }
                FetchState::Success | FetchState::Failed => return last.transpose(),
                FetchState::Exhausted => {
                    engine_warn!(
                        "Giving up on {} after {} attempts; no data fetched",
                        endpoint,
                        policy.max_attempts
                    );
                    return Ok(None);
                }
            }
        }
    }

    fn build_url(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<reqwest::Url, FetchError> {
        let joined = join_endpoint(&self.settings.base_url, endpoint);
        let mut url = reqwest::Url::parse(&joined)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    async fn attempt(&self, url: reqwest::Url) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        match classify_status(status) {
            StatusClass::Success => self.read_json(response).await,
            StatusClass::Transient => {
                let body = response.text().await.unwrap_or_default();
                Err(FetchError::new(FailureKind::TransientStatus(status), body))
            }
            StatusClass::Fatal => {
                let body = response.text().await.unwrap_or_default();
                Err(FetchError::new(FailureKind::HttpStatus(status), body))
            }
        }
    }

    async fn read_json(&self, response: reqwest::Response) -> Result<Value, FetchError> {
        let max_bytes = self.settings.max_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        serde_json::from_slice(&bytes)
            .map_err(|err| FetchError::new(FailureKind::InvalidBody, err.to_string()))
    }
}

fn build_client(settings: &FetchSettings) -> Result<reqwest::Client, FetchError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &settings.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| FetchError::new(FailureKind::InvalidHeader, err.to_string()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| FetchError::new(FailureKind::InvalidHeader, err.to_string()))?;
        headers.insert(name, value);
    }

    reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .default_headers(headers)
        .build()
        .map_err(|err| FetchError::new(FailureKind::Transport, err.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    FetchError::new(FailureKind::Transport, err.to_string())
}
