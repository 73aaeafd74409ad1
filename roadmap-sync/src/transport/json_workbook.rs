//! Workbook file transport
//!
//! A workbook is a JSON document `{"tabs": {"<tab>": [[cell, ...], ...]}}`. Cells may be
//! strings, numbers, booleans or null; all are read as text. Written cells are stored as
//! JSON numbers. A batch of writes is one read-modify-write of the whole file, renamed
//! into place.

use super::{CellWrite, Grid, GridTransport};
use async_trait::async_trait;
use roadmap_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawCell {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
    Null,
}

impl RawCell {
    fn to_text(&self) -> String {
        match self {
            RawCell::Text(text) => text.clone(),
            RawCell::Number(number) => number.to_string(),
            RawCell::Bool(flag) => flag.to_string(),
            RawCell::Null => String::new(),
        }
    }

    fn from_score(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(RawCell::Number)
            .unwrap_or_else(|| RawCell::Text(value.to_string()))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Workbook {
    #[serde(default)]
    tabs: BTreeMap<String, Vec<Vec<RawCell>>>,
}

/// Grid transport over a local JSON workbook file
#[derive(Debug, Clone)]
pub struct JsonWorkbookTransport {
    path: PathBuf,
}

impl JsonWorkbookTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load(&self) -> Result<Workbook> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::TransportUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            Error::TransportUnavailable(format!("{}: malformed workbook: {}", self.path.display(), e))
        })
    }

    async fn store(&self, workbook: &Workbook) -> Result<()> {
        let text = serde_json::to_string_pretty(workbook)
            .map_err(|e| Error::TransportUnavailable(format!("serialize workbook: {}", e)))?;

        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, text).await.map_err(|e| {
            Error::TransportUnavailable(format!("{}: {}", staging.display(), e))
        })?;
        tokio::fs::rename(&staging, &self.path).await.map_err(|e| {
            Error::TransportUnavailable(format!("{}: {}", self.path.display(), e))
        })
    }
}

#[async_trait]
impl GridTransport for JsonWorkbookTransport {
    async fn read_grid(&self, tab: &str) -> Result<Grid> {
        let workbook = self.load().await?;
        let rows = workbook.tabs.get(tab).ok_or_else(|| {
            Error::TransportUnavailable(format!(
                "tab {:?} not found in {}",
                tab,
                self.path.display()
            ))
        })?;

        debug!(tab, rows = rows.len(), "Read workbook tab");
        Ok(Grid::new(
            rows.iter()
                .map(|row| row.iter().map(RawCell::to_text).collect())
                .collect(),
        ))
    }

    async fn apply_writes(&self, tab: &str, writes: &[CellWrite]) -> Result<()> {
        let mut workbook = self.load().await?;
        let rows = workbook.tabs.get_mut(tab).ok_or_else(|| {
            Error::TransportUnavailable(format!(
                "tab {:?} not found in {}",
                tab,
                self.path.display()
            ))
        })?;

        for write in writes {
            if rows.len() <= write.row {
                rows.resize_with(write.row + 1, Vec::new);
            }
            let row = &mut rows[write.row];
            if row.len() <= write.column {
                row.resize(write.column + 1, RawCell::Null);
            }
            row[write.column] = RawCell::from_score(write.value);
        }

        self.store(&workbook).await?;
        info!(tab, cells = writes.len(), "Applied cell writes to workbook");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn workbook_with(contents: &str) -> (tempfile::TempDir, JsonWorkbookTransport) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workbook.json");
        tokio::fs::write(&path, contents).await.unwrap();
        (dir, JsonWorkbookTransport::new(path))
    }

    #[tokio::test]
    async fn test_read_grid_stringifies_cells() {
        let (_dir, transport) = workbook_with(
            r#"{"tabs": {"Scoring_Inputs": [["Key", "RICE: Reach"], ["INIT-001", 1000], ["INIT-002", null]]}}"#,
        )
        .await;

        let grid = transport.read_grid("Scoring_Inputs").await.unwrap();
        assert_eq!(grid.header(), &["Key".to_string(), "RICE: Reach".to_string()]);
        assert_eq!(grid.cell(1, 1), "1000");
        assert_eq!(grid.cell(2, 1), "");
    }

    #[tokio::test]
    async fn test_missing_tab_is_transport_error() {
        let (_dir, transport) = workbook_with(r#"{"tabs": {}}"#).await;
        let result = transport.read_grid("Scoring_Inputs").await;
        assert!(matches!(result, Err(Error::TransportUnavailable(_))));
    }

    #[tokio::test]
    async fn test_missing_file_is_transport_error() {
        let transport = JsonWorkbookTransport::new("/nonexistent/workbook.json");
        let result = transport.read_grid("Scoring_Inputs").await;
        assert!(matches!(result, Err(Error::TransportUnavailable(_))));
    }

    #[tokio::test]
    async fn test_apply_writes_extends_short_rows() {
        let (_dir, transport) = workbook_with(
            r#"{"tabs": {"Scores": [["Key", "Note", "RICE: Overall Score"], ["INIT-001"]]}}"#,
        )
        .await;

        transport
            .apply_writes(
                "Scores",
                &[CellWrite {
                    row: 1,
                    column: 2,
                    value: 400.0,
                }],
            )
            .await
            .unwrap();

        let grid = transport.read_grid("Scores").await.unwrap();
        assert_eq!(grid.cell(1, 0), "INIT-001");
        assert_eq!(grid.cell(1, 1), "");
        assert_eq!(grid.cell(1, 2).parse::<f64>().unwrap(), 400.0);
    }
}
