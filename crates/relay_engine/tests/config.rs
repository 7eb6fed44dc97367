use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use relay_engine::FetchSettings;
use relay_engine::config::{
    ConfigError, RelayConfig, DEFAULT_API_BASE_URL, DEFAULT_API_ENDPOINT,
    DEFAULT_BIGQUERY_API_URL, DEFAULT_MEMORY_MAX_WAIT,
};

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

#[test]
fn defaults_apply_when_nothing_is_set() {
    let config = RelayConfig::from_lookup(lookup(&[])).expect("config");

    assert_eq!(config.api.base_url, DEFAULT_API_BASE_URL);
    assert_eq!(config.api.endpoint, DEFAULT_API_ENDPOINT);
    assert_eq!(config.api.max_attempts, 5);
    assert!(config.api.params.is_empty());
    assert_eq!(config.watchdog.threshold, 90.0);
    assert_eq!(config.watchdog.max_wait, DEFAULT_MEMORY_MAX_WAIT);
    assert_eq!(config.sinks.relational.host, "");
    assert_eq!(config.sinks.warehouse.project_id, None);
    assert_eq!(config.sinks.warehouse.api_url, DEFAULT_BIGQUERY_API_URL);
}

#[test]
fn fetch_settings_default_to_the_configured_api() {
    let config = RelayConfig::from_lookup(lookup(&[])).expect("config");

    assert_eq!(FetchSettings::default().base_url, DEFAULT_API_BASE_URL);
    assert_eq!(config.api.fetch_settings().base_url, FetchSettings::default().base_url);
}

#[test]
fn reads_store_and_pipeline_settings() {
    let config = RelayConfig::from_lookup(lookup(&[
        ("RELAY_API_PARAMS", "results=50&nat=br"),
        ("RELAY_MAX_ATTEMPTS", "3"),
        ("RELAY_MEMORY_THRESHOLD", "75.5"),
        ("RELAY_MEMORY_MAX_WAIT_SECS", "60"),
        ("DB_HOST", "pg"),
        ("DB_PORT", "5432"),
        ("MONGO_AUTH_SOURCE", "admin"),
        ("GOOGLE_CLOUD_PROJECT", "fallback"),
        ("BIG_QUERY_DATASET", "people"),
    ]))
    .expect("config");

    assert_eq!(config.api.params.len(), 2);
    assert_eq!(config.api.fetch_settings().max_attempts, 3);
    assert_eq!(config.watchdog.threshold, 75.5);
    assert_eq!(config.watchdog.max_wait, Duration::from_secs(60));
    assert_eq!(config.sinks.relational.host, "pg");
    assert_eq!(config.sinks.relational.port, "5432");
    assert_eq!(config.sinks.document.auth_source, "admin");
    assert_eq!(config.sinks.warehouse.project_id.as_deref(), Some("fallback"));
    assert_eq!(config.sinks.warehouse.dataset, "people");
}

#[test]
fn explicit_project_wins_over_client_default() {
    let config = RelayConfig::from_lookup(lookup(&[
        ("BIG_QUERY_PROJECT_ID", "explicit"),
        ("GOOGLE_CLOUD_PROJECT", "fallback"),
    ]))
    .expect("config");

    assert_eq!(config.sinks.warehouse.project_id.as_deref(), Some("explicit"));
}

#[test]
fn unparsable_numbers_are_reported() {
    let err = RelayConfig::from_lookup(lookup(&[("RELAY_MAX_ATTEMPTS", "many")])).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidNumber {
            name: "RELAY_MAX_ATTEMPTS",
            ..
        }
    ));
}

#[test]
fn env_file_values_are_read() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "RELAY_TEST_ONLY_UNUSED=1").unwrap();
    writeln!(file, "BIG_QUERY_TABLE_ID=users_from_file").unwrap();
    writeln!(file, "MONGO_NAME=people_from_file").unwrap();
    file.flush().unwrap();

    let config = RelayConfig::load(Some(file.path())).expect("config");

    // The process environment wins, so only assert when it is not set.
    if std::env::var("BIG_QUERY_TABLE_ID").is_err() {
        assert_eq!(config.sinks.warehouse.table, "users_from_file");
    }
    if std::env::var("MONGO_NAME").is_err() {
        assert_eq!(config.sinks.document.database, "people_from_file");
    }
}

#[test]
fn missing_explicit_env_file_is_an_error() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let err = RelayConfig::load(Some(&dir.path().join("absent.env"))).unwrap_err();
    assert!(matches!(err, ConfigError::EnvFile { .. }));
}
