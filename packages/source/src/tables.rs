//! Table reading and writing.
//!
//! Reads a CSV file (gzip-compressed when the path ends in `.gz`) and returns
//! every row as a [`serde_json::Value`] object keyed by the column headers in
//! the first row. Census downloads are not guaranteed to be UTF-8, so cells
//! are decoded lossily instead of failing the whole file.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Serialize;

use crate::SourceError;

/// Reads a CSV file into JSON-object rows.
///
/// # Errors
///
/// Returns [`SourceError`] if the file cannot be opened, is not valid CSV,
/// or has no header row.
pub fn read_csv_path(path: &Path) -> Result<Vec<serde_json::Value>, SourceError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let is_gzipped = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));

    let records = if is_gzipped {
        read_csv(flate2::read::GzDecoder::new(reader))?
    } else {
        read_csv(reader)?
    };

    log::info!("Parsed {} records from {}", records.len(), path.display());

    Ok(records)
}

/// Reads CSV data from any reader into JSON-object rows.
///
/// Headers and cells are trimmed; a leading UTF-8 byte-order mark is removed
/// from the first header. Short rows yield empty strings for the missing
/// cells.
///
/// # Errors
///
/// Returns [`SourceError`] if the data is not valid CSV or has no header row.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<serde_json::Value>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|h| {
            String::from_utf8_lossy(h)
                .trim_start_matches('\u{feff}')
                .trim()
                .to_owned()
        })
        .collect();

    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(SourceError::Parse {
            message: "CSV file contains no header row".to_owned(),
        });
    }

    let mut records = Vec::new();

    for result in reader.byte_records() {
        let record = result?;

        let mut map = serde_json::Map::new();
        for (i, header) in headers.iter().enumerate() {
            let value = record
                .get(i)
                .map(|cell| String::from_utf8_lossy(cell).trim().to_owned())
                .unwrap_or_default();
            map.insert(header.clone(), serde_json::Value::String(value));
        }
        records.push(serde_json::Value::Object(map));
    }

    Ok(records)
}

/// Writes serializable rows as a CSV file with a header row.
///
/// # Errors
///
/// Returns [`SourceError`] if the file cannot be created or a row fails to
/// serialize.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), SourceError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    log::info!("Wrote {} rows to {}", rows.len(), path.display());

    Ok(())
}

/// Writes a value as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`SourceError`] if the file cannot be created or the value fails
/// to serialize.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), SourceError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), value)?;

    log::info!("Wrote {}", path.display());

    Ok(())
}
