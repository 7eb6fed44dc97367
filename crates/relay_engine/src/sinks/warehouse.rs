use std::time::Duration;

use engine_logging::{engine_debug, engine_info};
use relay_core::NormalizedTable;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::json;

use super::Sink;
use crate::config::WarehouseConfig;
use crate::SinkError;

/// How often a running load job is re-checked.
pub const JOB_POLL_INTERVAL: Duration = Duration::from_secs(1);

const BOUNDARY: &str = "relay-load-job-boundary";

/// Appends rows to a BigQuery table through a load job and waits for it.
#[derive(Debug, Clone)]
pub struct BigQuerySink {
    config: WarehouseConfig,
    client: reqwest::Client,
    poll_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TableRef<'a> {
    project: &'a str,
    dataset: &'a str,
    table: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Job {
    job_reference: JobReference,
    status: Option<JobStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    state: String,
    error_result: Option<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    reason: Option<String>,
    message: Option<String>,
}

impl BigQuerySink {
    pub fn new(config: WarehouseConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| SinkError::Connection(err.to_string()))?;
        Ok(Self {
            config,
            client,
            poll_interval: JOB_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// `project.dataset.table`, once a project is known.
    pub fn qualified_table(&self) -> Option<String> {
        self.table_ref()
            .ok()
            .map(|t| format!("{}.{}.{}", t.project, t.dataset, t.table))
    }

    fn table_ref(&self) -> Result<TableRef<'_>, SinkError> {
        let project = self.config.project_id.as_deref().ok_or_else(|| {
            SinkError::Connection("no bigquery project id configured or defaulted".into())
        })?;
        Ok(TableRef {
            project,
            dataset: &self.config.dataset,
            table: &self.config.table,
        })
    }

    fn api_url(&self) -> &str {
        self.config.api_url.trim_end_matches('/')
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn submit(&self, target: &TableRef<'_>, rows: String) -> Result<Job, SinkError> {
        let metadata = json!({
            "configuration": {
                "load": {
                    "destinationTable": {
                        "projectId": target.project,
                        "datasetId": target.dataset,
                        "tableId": target.table,
                    },
                    "sourceFormat": "NEWLINE_DELIMITED_JSON",
                    "writeDisposition": "WRITE_APPEND",
                    "autodetect": true,
                }
            }
        });
        let body = format!(
            "--{BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n\
             --{BOUNDARY}\r\nContent-Type: application/octet-stream\r\n\r\n{rows}\r\n\
             --{BOUNDARY}--\r\n"
        );
        let url = format!(
            "{}/upload/bigquery/v2/projects/{}/jobs?uploadType=multipart",
            self.api_url(),
            target.project
        );
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, format!("multipart/related; boundary={BOUNDARY}"))
            .body(body);
        self.send_for_job(self.authorize(request)).await
    }

    async fn poll(&self, project: &str, reference: &JobReference) -> Result<Job, SinkError> {
        let mut url = format!(
            "{}/bigquery/v2/projects/{}/jobs/{}",
            self.api_url(),
            project,
            reference.job_id
        );
        if let Some(location) = &reference.location {
            url.push_str("?location=");
            url.push_str(location);
        }
        let request = self.client.get(url);
        self.send_for_job(self.authorize(request)).await
    }

    async fn send_for_job(&self, request: reqwest::RequestBuilder) -> Result<Job, SinkError> {
        let response = request
            .send()
            .await
            .map_err(|err| SinkError::Connection(err.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| SinkError::Connection(err.to_string()))?;
        if !status.is_success() {
            return Err(SinkError::Write(format!(
                "bigquery returned {}: {}",
                status,
                String::from_utf8_lossy(&bytes)
            )));
        }
        serde_json::from_slice(&bytes).map_err(|err| SinkError::Write(err.to_string()))
    }
}

fn to_ndjson(table: &NormalizedTable) -> Result<String, SinkError> {
    let mut out = String::new();
    for row in table.rows() {
        let line = serde_json::to_string(row).map_err(|err| SinkError::Write(err.to_string()))?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

#[async_trait::async_trait]
impl Sink for BigQuerySink {
    fn name(&self) -> &str {
        "bigquery"
    }

    async fn load(&self, table: &NormalizedTable) -> Result<(), SinkError> {
        let target = self.table_ref()?;
        let rows = to_ndjson(table)?;

        let mut job = self.submit(&target, rows).await?;
        engine_debug!("Submitted bigquery load job {}", job.job_reference.job_id);

        // Block until the job settles; a failed job reports its own error.
        loop {
            if let Some(status) = &job.status {
                if status.state == "DONE" {
                    return match &status.error_result {
                        Some(error) => Err(SinkError::LoadJob {
                            reason: error.reason.clone().unwrap_or_else(|| "unknown".into()),
                            message: error.message.clone().unwrap_or_default(),
                        }),
                        None => {
                            engine_info!(
                                "Appended {} rows to bigquery table {}.{}.{}",
                                table.len(),
                                target.project,
                                target.dataset,
                                target.table
                            );
                            Ok(())
                        }
                    };
                }
            }
            tokio::time::sleep(self.poll_interval).await;
            job = self.poll(target.project, &job.job_reference).await?;
        }
    }
}
