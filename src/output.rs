//! Output formatting for the command line.
//!
//! Supports pretty JSON on stdout and CSV append.

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Renders rows as pretty-printed JSON.
pub fn to_json<T: Serialize + ?Sized>(rows: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(rows)?)
}

/// Appends `rows` to a CSV file, one row per record.
///
/// Creates the file with headers if it does not already exist.
pub fn append_records<T: Serialize>(path: &str, rows: &[T]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = rows.len(), "Appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}
