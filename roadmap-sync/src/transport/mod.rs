//! Tabular transport
//!
//! A grid is read once per pass and written back with one batched call. The engine never
//! sees how cells travel; [`GridTransport`] implementations own that.

pub mod json_workbook;

pub use json_workbook::JsonWorkbookTransport;

use async_trait::async_trait;
use roadmap_common::Result;
use serde::{Deserialize, Serialize};

/// Rectangular-ish snapshot of one tab: row 0 is the header
///
/// Rows may be ragged; a missing trailing cell reads as blank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn header(&self) -> &[String] {
        self.rows.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Data rows with their grid row index (header is row 0)
    pub fn data_rows(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.rows
            .iter()
            .enumerate()
            .skip(1)
            .map(|(index, row)| (index, row.as_slice()))
    }

    /// Cell text, blank when the row is shorter than `column`
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// One numeric cell update, addressed by grid row and column index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellWrite {
    pub row: usize,
    pub column: usize,
    pub value: f64,
}

impl CellWrite {
    /// Spreadsheet A1 address (`row` 0 is sheet row 1)
    pub fn a1(&self) -> String {
        format!("{}{}", column_letters(self.column), self.row + 1)
    }
}

/// Column index to spreadsheet letters: 0 → A, 25 → Z, 26 → AA
pub fn column_letters(column: usize) -> String {
    let mut letters = Vec::new();
    let mut n = column + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Reads a tab and applies batched cell writes
#[async_trait]
pub trait GridTransport: Send + Sync {
    /// Snapshot of the named tab; failures are `TransportUnavailable`
    async fn read_grid(&self, tab: &str) -> Result<Grid>;

    /// Apply every write in one call
    async fn apply_writes(&self, tab: &str, writes: &[CellWrite]) -> Result<()>;
}
