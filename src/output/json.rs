//! JSON array writer

use std::path::Path;

use super::{write_atomic, OutputError, OutputResult};
use crate::Record;

/// Write `records` as a pretty-printed JSON array
pub fn write_json(path: &Path, records: &[Record]) -> OutputResult<()> {
    write_atomic(path, records.len(), |writer| {
        serde_json::to_writer_pretty(writer, records)
            .map_err(|e| OutputError::SerializationError(e.to_string()))
    })
}
