//! Run configuration sourced from the process environment and an optional
//! `.env` file.
//!
//! Store settings are read as-is and never validated here; a missing value
//! shows up later as a connection or authentication failure from its sink.
//! Only the numeric pipeline knobs are parsed up front.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use relay_core::DEFAULT_MAX_ATTEMPTS;
use thiserror::Error;

use crate::fetch::FetchSettings;

pub const DEFAULT_API_BASE_URL: &str = "https://randomuser.me";
pub const DEFAULT_API_ENDPOINT: &str = "/api/";
pub const DEFAULT_MEMORY_THRESHOLD: f64 = 90.0;
pub const DEFAULT_MEMORY_MAX_WAIT: Duration = Duration::from_secs(300);
pub const DEFAULT_BIGQUERY_API_URL: &str = "https://bigquery.googleapis.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read env file {path}: {message}")]
    EnvFile { path: String, message: String },
    #[error("{name} must be a number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
    pub endpoint: String,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub max_attempts: u32,
}

impl ApiConfig {
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            base_url: self.base_url.clone(),
            headers: self.headers.clone(),
            max_attempts: self.max_attempts,
            ..FetchSettings::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchdogConfig {
    pub threshold: f64,
    pub max_wait: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MEMORY_THRESHOLD,
            max_wait: DEFAULT_MEMORY_MAX_WAIT,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationalConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub port: String,
    pub database: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub port: String,
    pub database: String,
    pub auth_source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarehouseConfig {
    /// `None` defers to the client's default project.
    pub project_id: Option<String>,
    pub dataset: String,
    pub table: String,
    pub access_token: Option<String>,
    pub api_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkConfig {
    pub relational: RelationalConfig,
    pub document: DocumentConfig,
    pub warehouse: WarehouseConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub api: ApiConfig,
    pub watchdog: WatchdogConfig,
    pub sinks: SinkConfig,
}

impl RelayConfig {
    /// Read the process environment, seeded from `env_file` or `./.env`.
    ///
    /// Variables already present in the environment take precedence over the
    /// file. A missing default `.env` is fine; a missing explicit file is not.
    pub fn load(env_file: Option<&Path>) -> Result<Self, ConfigError> {
        let file_vars = match env_file {
            Some(path) => read_env_file(path)?,
            None => match dotenvy::dotenv_iter() {
                Ok(iter) => collect_env_iter(iter, Path::new(".env"))?,
                Err(_) => HashMap::new(),
            },
        };
        Self::from_lookup(|name| std::env::var(name).ok().or_else(|| file_vars.get(name).cloned()))
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).unwrap_or_default();
        let opt = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let api = ApiConfig {
            base_url: opt("RELAY_API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            endpoint: opt("RELAY_API_ENDPOINT").unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string()),
            params: parse_params(&var("RELAY_API_PARAMS")),
            headers: parse_headers(&var("RELAY_API_HEADERS")),
            max_attempts: parse_number("RELAY_MAX_ATTEMPTS", opt("RELAY_MAX_ATTEMPTS"))?
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
        };

        let watchdog = WatchdogConfig {
            threshold: parse_number("RELAY_MEMORY_THRESHOLD", opt("RELAY_MEMORY_THRESHOLD"))?
                .unwrap_or(DEFAULT_MEMORY_THRESHOLD),
            max_wait: parse_number::<u64>(
                "RELAY_MEMORY_MAX_WAIT_SECS",
                opt("RELAY_MEMORY_MAX_WAIT_SECS"),
            )?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_MEMORY_MAX_WAIT),
        };

        let sinks = SinkConfig {
            relational: RelationalConfig {
                host: var("DB_HOST"),
                user: var("DB_USER"),
                password: var("DB_PASSWORD"),
                port: var("DB_PORT"),
                database: var("DB_NAME"),
            },
            document: DocumentConfig {
                host: var("MONGO_HOST"),
                user: var("MONGO_USER"),
                password: var("MONGO_PASSWORD"),
                port: var("MONGO_PORT"),
                database: var("MONGO_NAME"),
                auth_source: var("MONGO_AUTH_SOURCE"),
            },
            warehouse: WarehouseConfig {
                project_id: opt("BIG_QUERY_PROJECT_ID").or_else(|| opt("GOOGLE_CLOUD_PROJECT")),
                dataset: var("BIG_QUERY_DATASET"),
                table: var("BIG_QUERY_TABLE_ID"),
                access_token: opt("GOOGLE_OAUTH_ACCESS_TOKEN"),
                api_url: opt("BIG_QUERY_API_URL")
                    .unwrap_or_else(|| DEFAULT_BIGQUERY_API_URL.to_string()),
            },
        };

        Ok(Self {
            api,
            watchdog,
            sinks,
        })
    }
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let iter = dotenvy::from_path_iter(path).map_err(|err| ConfigError::EnvFile {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    collect_env_iter(iter, path)
}

fn collect_env_iter<R: std::io::Read>(
    iter: dotenvy::Iter<R>,
    path: &Path,
) -> Result<HashMap<String, String>, ConfigError> {
    iter.map(|item| {
        item.map_err(|err| ConfigError::EnvFile {
            path: path.display().to_string(),
            message: err.to_string(),
        })
    })
    .collect()
}

fn parse_number<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
) -> Result<Option<T>, ConfigError> {
    match raw {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
    }
}

/// `results=50&nat=br` -> `[("results", "50"), ("nat", "br")]`.
fn parse_params(raw: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(raw.trim().trim_start_matches('?').as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

/// `Accept: application/json; X-Api-Key: abc` -> name/value pairs.
fn parse_headers(raw: &str) -> Vec<(String, String)> {
    raw.split(';')
        .filter_map(|pair| pair.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}
