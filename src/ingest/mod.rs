// src/ingest/mod.rs
pub mod columns;
pub mod error;
pub mod loader;
pub mod normalize;

pub use error::{AttemptFailure, LoadError, ResolveError};

/// A parsed export: verbatim header cells plus every well-formed data row,
/// all cells kept as raw text.
#[derive(Debug, Clone)]
pub struct RawTable {
    /// Column names as they appear on the detected header row.
    pub headers: Vec<String>,
    /// Data rows in file order, each with exactly `headers.len()` cells.
    pub rows: Vec<Vec<String>>,
    /// Name of the encoding that decoded the file.
    pub encoding: &'static str,
    pub delimiter: u8,
    /// Zero-based line index of the header row within the file.
    pub header_row: usize,
    /// Rows dropped because their field count didn't match the header.
    pub skipped_rows: usize,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell `column` of `row`, `None` if either index is out of range.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column).map(String::as_str)
    }
}
