//! CSV record writer
//!
//! Records carry whatever fields the server returned, so the header is the
//! sorted union of every field name seen across all records. Missing fields
//! and nulls become empty cells; nested arrays and objects are written as
//! compact JSON.

use std::collections::BTreeSet;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use super::{write_atomic, OutputError, OutputResult};
use crate::Record;

/// Sorted union of field names across `records`
pub fn header_for(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .flat_map(|r| r.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(nested) => nested.to_string(),
    }
}

/// Write `records` as CSV with a header row
///
/// An empty record list produces an empty file.
pub fn write_csv(path: &Path, records: &[Record]) -> OutputResult<()> {
    let header = header_for(records);
    debug!(path = %path.display(), columns = header.len(), "Writing CSV");

    write_atomic(path, records.len(), |writer| {
        let mut csv = csv::Writer::from_writer(writer);
        if !header.is_empty() {
            csv.write_record(&header)
                .map_err(|e| OutputError::CsvError(e.to_string()))?;
        }
        for record in records {
            let row = header.iter().map(|field| cell(record.get(field)));
            csv.write_record(row)
                .map_err(|e| OutputError::CsvError(e.to_string()))?;
        }
        csv.flush()
            .map_err(|e| OutputError::IoError(format!("Failed to flush CSV writer: {e}")))
    })
}
