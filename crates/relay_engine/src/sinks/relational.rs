use engine_logging::{engine_debug, engine_info};
use relay_core::NormalizedTable;
use serde_json::Value;
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, PgConnection, Postgres, QueryBuilder};

use super::Sink;
use crate::config::RelationalConfig;
use crate::SinkError;

pub const RELATIONAL_TABLE: &str = "users";

/// Rows per INSERT statement; 10 columns keeps each batch well under the
/// Postgres bind-parameter limit.
pub const RELATIONAL_BATCH_SIZE: usize = 1000;

/// Columns written to the relational store, in table order.
pub const RELATIONAL_COLUMNS: [&str; 10] = [
    "email",
    "name_title",
    "name_first",
    "name_last",
    "location_street_number",
    "location_street_name",
    "location_city",
    "location_state",
    "location_country",
    "location_postcode",
];

/// Select [`RELATIONAL_COLUMNS`] from every row as text cells.
///
/// Fails with [`SinkError::SchemaMismatch`] if the table lacks any of them.
pub fn project_relational(table: &NormalizedTable) -> Result<Vec<Vec<Option<String>>>, SinkError> {
    let missing = table.missing_columns(&RELATIONAL_COLUMNS);
    if !missing.is_empty() {
        return Err(SinkError::SchemaMismatch {
            missing: missing.into_iter().map(str::to_string).collect(),
        });
    }

    Ok((0..table.len())
        .map(|index| {
            RELATIONAL_COLUMNS
                .iter()
                .map(|column| text_cell(table.cell(index, column)))
                .collect()
        })
        .collect())
}

fn text_cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Appends to the existing `users` table; never creates or replaces it.
#[derive(Debug, Clone)]
pub struct PostgresSink {
    config: RelationalConfig,
}

impl PostgresSink {
    pub fn new(config: RelationalConfig) -> Self {
        Self { config }
    }

    fn connect_options(&self) -> Result<PgConnectOptions, SinkError> {
        let port: u16 = self.config.port.trim().parse().map_err(|_| {
            SinkError::Connection(format!("invalid postgres port {:?}", self.config.port))
        })?;
        Ok(PgConnectOptions::new()
            .host(&self.config.host)
            .port(port)
            .username(&self.config.user)
            .password(&self.config.password)
            .database(&self.config.database))
    }
}

#[async_trait::async_trait]
impl Sink for PostgresSink {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn load(&self, table: &NormalizedTable) -> Result<(), SinkError> {
        // Validate before connecting so a bad table writes nothing.
        let rows = project_relational(table)?;
        if rows.is_empty() {
            return Ok(());
        }

        let options = self.connect_options()?;
        let mut conn = PgConnection::connect_with(&options)
            .await
            .map_err(|err| SinkError::Connection(err.to_string()))?;

        let mut tx = conn
            .begin()
            .await
            .map_err(|err| SinkError::Write(err.to_string()))?;
        for batch in rows.chunks(RELATIONAL_BATCH_SIZE) {
            let mut query = QueryBuilder::<Postgres>::new(format!(
                "INSERT INTO {RELATIONAL_TABLE} ({}) ",
                RELATIONAL_COLUMNS.join(", ")
            ));
            query.push_values(batch, |mut values, row| {
                for cell in row {
                    values.push_bind(cell.clone());
                }
            });
            query
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|err| SinkError::Write(err.to_string()))?;
            engine_debug!("Inserted batch of {} rows into {}", batch.len(), RELATIONAL_TABLE);
        }
        tx.commit()
            .await
            .map_err(|err| SinkError::Write(err.to_string()))?;

        if let Err(err) = conn.close().await {
            engine_debug!("Closing postgres connection failed: {}", err);
        }
        engine_info!("Appended {} rows to postgres table {}", rows.len(), RELATIONAL_TABLE);
        Ok(())
    }
}
