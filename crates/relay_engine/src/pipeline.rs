use engine_logging::{engine_debug, engine_error, engine_info};
use relay_core::normalize;

use crate::config::{RelayConfig, WatchdogConfig};
use crate::fetch::ResilientFetcher;
use crate::sinks::{BigQuerySink, MongoSink, PostgresSink, Sink};
use crate::watchdog::{self, MemoryProbe, SystemProbe};
use crate::{PipelineError, RunOutcome};

/// One pass of wait -> fetch -> normalize -> load, run strictly in sequence.
pub struct Pipeline {
    fetcher: ResilientFetcher,
    endpoint: String,
    params: Vec<(String, String)>,
    probe: Box<dyn MemoryProbe>,
    watchdog: WatchdogConfig,
    sinks: Vec<Box<dyn Sink>>,
}

impl Pipeline {
    pub fn new(
        fetcher: ResilientFetcher,
        endpoint: impl Into<String>,
        probe: Box<dyn MemoryProbe>,
        watchdog: WatchdogConfig,
    ) -> Self {
        Self {
            fetcher,
            endpoint: endpoint.into(),
            params: Vec::new(),
            probe,
            watchdog,
            sinks: Vec::new(),
        }
    }

    /// Production wiring: host memory probe and the sinks in load order
    /// postgres, mongodb, bigquery.
    pub fn from_config(config: &RelayConfig) -> Result<Self, PipelineError> {
        let fetcher = ResilientFetcher::new(config.api.fetch_settings())?;
        let warehouse = BigQuerySink::new(config.sinks.warehouse.clone()).map_err(|source| {
            PipelineError::Sink {
                sink: "bigquery".to_string(),
                source,
            }
        })?;

        Ok(
            Self::new(fetcher, config.api.endpoint.clone(), Box::new(SystemProbe), config.watchdog)
                .with_params(config.api.params.clone())
                .with_sink(Box::new(PostgresSink::new(config.sinks.relational.clone())))
                .with_sink(Box::new(MongoSink::new(config.sinks.document.clone())))
                .with_sink(Box::new(warehouse)),
        )
    }

    pub fn with_params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = params;
        self
    }

    /// Sinks load in the order they are added.
    pub fn with_sink(mut self, sink: Box<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Run once. Any failure is logged here, followed by a reclamation pass,
    /// and returned; nothing is retried at this level.
    pub async fn run(&self) -> Result<RunOutcome, PipelineError> {
        let waited = watchdog::wait_until_below(
            self.probe.as_ref(),
            self.watchdog.threshold,
            self.watchdog.max_wait,
        )
        .await;
        engine_debug!("Memory wait finished: {:?}", waited);

        let result = self.execute().await;
        if let Err(err) = &result {
            engine_error!("Pipeline run failed: {}", err);
        }
        watchdog::reclaim(self.probe.as_ref(), self.watchdog.threshold).await;
        result
    }

    async fn execute(&self) -> Result<RunOutcome, PipelineError> {
        let Some(raw) = self.fetcher.request(&self.endpoint, &self.params).await? else {
            engine_info!("No data from API; nothing to load");
            return Ok(RunOutcome::NoData);
        };
        engine_info!("Fetched data from {}", self.endpoint);

        let table = normalize(&raw)?;
        drop(raw);
        engine_info!(
            "Transformed {} rows into {} columns",
            table.len(),
            table.columns().len()
        );
        if table.is_empty() {
            engine_info!("No data from API; nothing to load");
            return Ok(RunOutcome::NoData);
        }

        let mut loaded = Vec::with_capacity(self.sinks.len());
        for sink in &self.sinks {
            sink.load(&table)
                .await
                .map_err(|source| PipelineError::Sink {
                    sink: sink.name().to_string(),
                    source,
                })?;
            engine_info!("Loaded {} rows to {}", table.len(), sink.name());
            loaded.push(sink.name().to_string());
        }

        Ok(RunOutcome::Loaded {
            rows: table.len(),
            sinks: loaded,
        })
    }
}
