use std::path::Path;

use encoding_rs::WINDOWS_1252;
use serde::Serialize;

use super::model::RawTable;
use crate::error::{EngineError, Result};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Outcome of a successful load: what a front end reports back to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub rows: usize,
    pub columns: usize,
    pub encoding: &'static str,
}

/// A parsed table together with the text encoding it was decoded from.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: RawTable,
    pub encoding: &'static str,
}

impl LoadedTable {
    pub fn summary(&self) -> LoadSummary {
        LoadSummary {
            rows: self.table.len(),
            columns: self.table.headers().len(),
            encoding: self.encoding,
        }
    }
}

/// Parse CSV bytes (first row = header) into a [`RawTable`].
///
/// Text is decoded as UTF-8 (with or without BOM) and falls back to
/// Windows-1252, which is a superset of Latin-1 for printable text.
pub fn load_bytes(bytes: &[u8]) -> Result<LoadedTable> {
    let (text, encoding) = decode(bytes);
    if text.trim().is_empty() {
        return Err(EngineError::malformed("file is empty"));
    }
    let table = parse_csv(&text)?;
    log::debug!(
        "parsed {} rows x {} columns ({encoding})",
        table.len(),
        table.headers().len()
    );
    Ok(LoadedTable { table, encoding })
}

/// Read a file from disk and parse it with [`load_bytes`].
pub fn load_path(path: &Path) -> Result<LoadedTable> {
    let bytes = std::fs::read(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_bytes(&bytes)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn decode(bytes: &[u8]) -> (String, &'static str) {
    if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
        if let Ok(text) = std::str::from_utf8(rest) {
            return (text.to_string(), "utf-8-sig");
        }
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        return (text.to_string(), "utf-8");
    }
    let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
    (text.into_owned(), "windows-1252")
}

// ---------------------------------------------------------------------------
// CSV parsing
// ---------------------------------------------------------------------------

fn parse_csv(text: &str) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| EngineError::malformed(format!("unreadable header: {e}")))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(String::is_empty) {
        return Err(EngineError::malformed("header row is empty"));
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or_default();
            EngineError::malformed(format!("unparsable CSV row at line {line}: {e}"))
        })?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    if rows.is_empty() {
        return Err(EngineError::malformed("file has a header but no data rows"));
    }

    RawTable::new(headers, rows)
}
