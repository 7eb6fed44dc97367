use serde_json::{Map, Value};
use thiserror::Error;

use crate::table::{NormalizedRow, NormalizedTable};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Turn an upstream payload into a flat table.
///
/// Reads the `results` array, flattens nested objects into dotted paths,
/// normalizes every column name and stringifies integer/float values. Other
/// values (strings, nulls, booleans, arrays) pass through untouched.
///
/// When two source paths normalize to the same column the later one wins.
pub fn normalize(raw: &Value) -> Result<NormalizedTable, NormalizeError> {
    let results = raw
        .get("results")
        .ok_or_else(|| NormalizeError::MalformedPayload("missing `results`".into()))?
        .as_array()
        .ok_or_else(|| NormalizeError::MalformedPayload("`results` is not an array".into()))?;

    let mut table = NormalizedTable::new();
    for (index, record) in results.iter().enumerate() {
        let object = record.as_object().ok_or_else(|| {
            NormalizeError::MalformedPayload(format!("record {index} is not an object"))
        })?;
        let mut row = NormalizedRow::new();
        flatten_into(&mut row, None, object);
        table.push_row(row);
    }
    Ok(table)
}

/// `name.first` -> `name_first`, lower-cased and trimmed.
pub fn normalize_column_name(raw: &str) -> String {
    raw.replace('.', "_").to_lowercase().trim().to_string()
}

fn flatten_into(row: &mut NormalizedRow, prefix: Option<&str>, object: &Map<String, Value>) {
    for (key, value) in object {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(nested) => flatten_into(row, Some(&path), nested),
            other => {
                row.insert(normalize_column_name(&path), stringify_numbers(other));
            }
        }
    }
}

fn stringify_numbers(value: &Value) -> Value {
    match value {
        Value::Number(number) => Value::String(number.to_string()),
        other => other.clone(),
    }
}
