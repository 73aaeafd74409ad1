//! Shared fixtures for the sync integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use roadmap_common::config::ScoringConfig;
use futures::stream::BoxStream;
use roadmap_common::db::Initiative;
use roadmap_common::{Error, FrameworkId, FrameworkRegistry, Result, ScoreTriple};
use roadmap_sync::db::SqliteInitiativeStore;
use roadmap_sync::store::{InitiativeStore, InputScope};
use roadmap_sync::transport::{CellWrite, Grid, GridTransport};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tempfile::TempDir;

/// File-backed store in a temp dir; keep the `TempDir` alive for the test
pub async fn temp_store() -> (TempDir, SqliteInitiativeStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteInitiativeStore::open(&dir.path().join("roadmap.db"))
        .await
        .unwrap();
    (dir, store)
}

pub fn registry() -> FrameworkRegistry {
    FrameworkRegistry::new(&ScoringConfig::default()).unwrap()
}

pub fn rows(cells: &[&[&str]]) -> Vec<Vec<String>> {
    cells
        .iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect()
}

/// Register an initiative and set framework inputs, committed
pub async fn seed(
    store: &SqliteInitiativeStore,
    key: &str,
    framework: FrameworkId,
    inputs: &[(&str, f64)],
) {
    store.create_initiative(key, None).await.unwrap();
    let fields: BTreeMap<String, f64> = inputs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
    store
        .upsert_inputs(key, InputScope::Framework(framework), &fields)
        .await
        .unwrap();
    store.checkpoint().await.unwrap();
}

/// Overwrite the stored active selection text, bypassing the store API
pub async fn set_raw_selection(store: &SqliteInitiativeStore, key: &str, selection: &str) {
    sqlx::query("UPDATE initiatives SET active_scoring_framework = ? WHERE initiative_key = ?")
        .bind(selection)
        .bind(key)
        .execute(store.pool())
        .await
        .unwrap();
}

/// Store whose input writes for one key fail as if the database went away
pub struct FailingStore<'a> {
    pub inner: &'a SqliteInitiativeStore,
    pub failing_key: &'static str,
}

impl FailingStore<'_> {
    fn outage(&self) -> Error {
        Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"))
    }
}

#[async_trait]
impl InitiativeStore for FailingStore<'_> {
    async fn get(&self, key: &str) -> Result<Option<Initiative>> {
        self.inner.get(key).await
    }

    async fn upsert_inputs(
        &self,
        key: &str,
        scope: InputScope,
        fields: &BTreeMap<String, f64>,
    ) -> Result<()> {
        if key == self.failing_key {
            return Err(self.outage());
        }
        self.inner.upsert_inputs(key, scope, fields).await
    }

    async fn upsert_framework_scores(
        &self,
        key: &str,
        framework: FrameworkId,
        scores: &ScoreTriple,
    ) -> Result<()> {
        if key == self.failing_key {
            return Err(self.outage());
        }
        self.inner.upsert_framework_scores(key, framework, scores).await
    }

    async fn set_active(&self, key: &str, framework: FrameworkId) -> Result<()> {
        self.inner.set_active(key, framework).await
    }

    async fn mirror_active_scores(&self, key: &str) -> Result<()> {
        self.inner.mirror_active_scores(key).await
    }

    async fn list_page(&self, after: Option<&str>, limit: usize) -> Result<Vec<Initiative>> {
        self.inner.list_page(after, limit).await
    }

    async fn checkpoint(&self) -> Result<()> {
        self.inner.checkpoint().await
    }

    async fn rollback(&self) -> Result<()> {
        self.inner.rollback().await
    }

    fn list_all(&self) -> BoxStream<'_, Result<Initiative>> {
        self.inner.list_all()
    }
}

/// In-memory transport that records every batched write call
#[derive(Default)]
pub struct RecordingTransport {
    tabs: Mutex<BTreeMap<String, Vec<Vec<String>>>>,
    calls: Mutex<Vec<Vec<CellWrite>>>,
}

impl RecordingTransport {
    pub fn with_tab(tab: &str, cells: &[&[&str]]) -> Self {
        let transport = Self::default();
        transport
            .tabs
            .lock()
            .unwrap()
            .insert(tab.to_string(), rows(cells));
        transport
    }

    /// Number of `apply_writes` calls so far
    pub fn apply_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Every write, across all calls
    pub fn writes(&self) -> Vec<CellWrite> {
        self.calls.lock().unwrap().iter().flatten().copied().collect()
    }

    pub fn cell(&self, tab: &str, row: usize, column: usize) -> String {
        self.tabs.lock().unwrap()[tab]
            .get(row)
            .and_then(|r| r.get(column))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl GridTransport for RecordingTransport {
    async fn read_grid(&self, tab: &str) -> Result<Grid> {
        let tabs = self.tabs.lock().unwrap();
        let rows = tabs.get(tab).cloned().ok_or_else(|| {
            roadmap_common::Error::TransportUnavailable(format!("no tab {}", tab))
        })?;
        Ok(Grid::new(rows))
    }

    async fn apply_writes(&self, tab: &str, writes: &[CellWrite]) -> Result<()> {
        let mut tabs = self.tabs.lock().unwrap();
        let rows = tabs.entry(tab.to_string()).or_default();
        for write in writes {
            if rows.len() <= write.row {
                rows.resize_with(write.row + 1, Vec::new);
            }
            let row = &mut rows[write.row];
            if row.len() <= write.column {
                row.resize(write.column + 1, String::new());
            }
            row[write.column] = write.value.to_string();
        }
        self.calls.lock().unwrap().push(writes.to_vec());
        Ok(())
    }
}
