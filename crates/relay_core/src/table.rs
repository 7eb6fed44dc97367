use serde_json::{Map, Value};

/// One flattened record: normalized column name -> value.
pub type NormalizedRow = Map<String, Value>;

/// Ordered rows plus the column order in which names were first seen.
///
/// Rows may be ragged (a record that lacked a field simply has no entry);
/// [`NormalizedTable::cell`] reads a missing entry as `null`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedTable {
    columns: Vec<String>,
    rows: Vec<NormalizedRow>,
}

impl NormalizedTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[NormalizedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Value of `column` in row `index`; absent cells read as `null`.
    pub fn cell(&self, index: usize, column: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.rows
            .get(index)
            .and_then(|row| row.get(column))
            .unwrap_or(&NULL)
    }

    /// Names from `expected` that the table does not carry, in `expected` order.
    pub fn missing_columns<'a>(&self, expected: &[&'a str]) -> Vec<&'a str> {
        expected
            .iter()
            .copied()
            .filter(|name| !self.has_column(name))
            .collect()
    }

    /// Re-wrap the rows as an upstream-shaped payload (`{"results": [...]}`).
    pub fn to_payload(&self) -> Value {
        let results = self.rows.iter().cloned().map(Value::Object).collect();
        let mut payload = Map::new();
        payload.insert("results".to_string(), Value::Array(results));
        Value::Object(payload)
    }

    pub(crate) fn push_row(&mut self, row: NormalizedRow) {
        for key in row.keys() {
            if !self.has_column(key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(row);
    }
}
