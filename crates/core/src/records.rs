//! Columnar-to-row materialization for dataset payloads.
//!
//! Dataset endpoints answer with one of two shapes:
//!
//! - a [`ColumnarPayload`]: `{ "columns": [...], "rows": [[...], ...] }`
//! - a plain JSON array of objects.
//!
//! Both are turned into [`Record`]s, a schema-free mapping from column
//! name to value. Payloads come from an external service and are never
//! trusted: malformed input yields an empty list instead of an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One displayable row: column name -> value.
pub type Record = serde_json::Map<String, Value>;

/// A table encoded as parallel column-name and row-value arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnarPayload {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ColumnarPayload {
    /// Zip every row against `columns`.
    ///
    /// Same row rules as [`materialize`].
    pub fn into_records(self) -> Vec<Record> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .filter_map(|row| zip_row(&columns, row))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Materialization
// ---------------------------------------------------------------------------

/// Convert an untrusted columnar payload into records.
///
/// Returns an empty vec when `columns` is not an array of strings or
/// `rows` is not an array. Rows shorter than `columns` leave their
/// trailing keys absent; rows longer than `columns` and non-array rows
/// are skipped.
pub fn materialize(payload: &Value) -> Vec<Record> {
    let Some(columns) = payload.get("columns").and_then(string_array) else {
        return Vec::new();
    };
    let Some(rows) = payload.get("rows").and_then(Value::as_array) else {
        return Vec::new();
    };

    rows.iter()
        .filter_map(|row| row.as_array())
        .filter_map(|row| zip_row(&columns, row.clone()))
        .collect()
}

/// Decode a dataset response that is either columnar or a plain list of
/// records.
///
/// Array elements that are not objects are dropped. Any other shape
/// yields an empty vec.
pub fn decode_records(payload: &Value) -> Vec<Record> {
    match payload {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_object().cloned())
            .collect(),
        Value::Object(_) => materialize(payload),
        _ => Vec::new(),
    }
}

/// Render a single cell for display.
///
/// Absent and `null` cells render empty; strings render without quotes.
pub fn field_text(record: &Record, column: &str) -> String {
    match record.get(column) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn string_array(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|c| c.as_str().map(str::to_owned))
        .collect()
}

fn zip_row(columns: &[String], row: Vec<Value>) -> Option<Record> {
    if row.len() > columns.len() {
        return None;
    }
    Some(columns.iter().cloned().zip(row).collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
