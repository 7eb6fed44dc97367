//! `relay`: run the fetch -> normalize -> load pipeline once.

use std::process::ExitCode;

use engine_logging::{engine_error, engine_info, LogDestination, DEFAULT_LOG_FILE};
use relay_engine::{Pipeline, RelayConfig, RunOutcome};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    engine_logging::initialize(
        LogDestination::Both(DEFAULT_LOG_FILE.into()),
        engine_logging::level_from_env(),
    );

    let config = match RelayConfig::load(None) {
        Ok(config) => config,
        Err(err) => {
            engine_error!("Invalid configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let pipeline = match Pipeline::from_config(&config) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            engine_error!("Could not set up pipeline: {}", err);
            return ExitCode::FAILURE;
        }
    };

    // `run` logs its own failure cause.
    match pipeline.run().await {
        Ok(RunOutcome::NoData) => {
            engine_info!("No data from API.");
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Loaded { rows, sinks }) => {
            engine_info!("Run complete: {} rows loaded to {}", rows, sinks.join(", "));
            ExitCode::SUCCESS
        }
        Err(_) => ExitCode::FAILURE,
    }
}
