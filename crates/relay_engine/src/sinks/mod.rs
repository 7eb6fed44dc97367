//! Destinations for a normalized table.
//!
//! Each sink opens its own connection per load and appends; nothing is
//! shared between sinks and a failure in one never touches another.

mod document;
mod relational;
mod warehouse;

use relay_core::NormalizedTable;

use crate::SinkError;

pub use document::{MongoSink, DOCUMENT_COLLECTION};
pub use relational::{project_relational, PostgresSink, RELATIONAL_BATCH_SIZE, RELATIONAL_COLUMNS, RELATIONAL_TABLE};
pub use warehouse::{BigQuerySink, JOB_POLL_INTERVAL};

#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    /// Short label used in logs and errors.
    fn name(&self) -> &str;

    /// Append every row of `table`. Must not assume any other sink ran.
    async fn load(&self, table: &NormalizedTable) -> Result<(), SinkError>;
}
