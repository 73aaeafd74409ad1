//! # Roadmap Sync
//!
//! Multi-framework scoring with bidirectional sheet ↔ database sync.
//!
//! Three passes, each safe to re-run:
//! - [`SyncEngine::sync_inputs`]: sheet inputs → store
//! - [`SyncEngine::score_all`]: stored inputs → per-framework scores
//! - [`SyncEngine::write_scores_to_sheet`]: stored scores → sheet

pub mod columns;
pub mod db;
pub mod reader;
pub mod report;
pub mod store;
pub mod sync;
pub mod transport;

pub use report::{RecordFailure, RunReport};
pub use store::{InitiativeStore, InputScope};
pub use transport::{CellWrite, Grid, GridTransport};

use roadmap_common::config::{ScoringConfig, SheetConfig, TomlConfig};
use roadmap_common::{Error, FrameworkId, FrameworkRegistry, Result};
use store::rollback_on_fatal;
use sync::{InputSync, OutputSync, ScoreOutcome, ScoringOrchestrator, WritePlan};
use tracing::info;

/// Store, transport and registry wired together for the three passes
pub struct SyncEngine {
    store: Box<dyn InitiativeStore>,
    transport: Option<Box<dyn GridTransport>>,
    registry: FrameworkRegistry,
    sheet: SheetConfig,
    scoring: ScoringConfig,
}

impl SyncEngine {
    /// Build the engine; fails on invalid scoring configuration
    pub fn new(
        store: Box<dyn InitiativeStore>,
        transport: Option<Box<dyn GridTransport>>,
        config: &TomlConfig,
    ) -> Result<Self> {
        Ok(Self {
            store,
            transport,
            registry: FrameworkRegistry::new(&config.scoring)?,
            sheet: config.sheet.clone(),
            scoring: config.scoring.clone(),
        })
    }

    pub fn store(&self) -> &dyn InitiativeStore {
        self.store.as_ref()
    }

    pub fn registry(&self) -> &FrameworkRegistry {
        &self.registry
    }

    fn transport(&self) -> Result<&dyn GridTransport> {
        self.transport
            .as_deref()
            .ok_or_else(|| Error::Config("no workbook configured".to_string()))
    }

    /// Pull inputs from the input tab into the store
    pub async fn sync_inputs(&self) -> Result<RunReport> {
        InputSync::new(self.store(), self.transport()?, &self.sheet.input_tab)
            .with_batch_size(self.scoring.batch_size)
            .sync_inputs()
            .await
    }

    /// Recompute every framework for every initiative
    ///
    /// `batch_size` overrides the configured batch size.
    pub async fn score_all(&self, batch_size: Option<usize>) -> Result<RunReport> {
        ScoringOrchestrator::new(self.store(), &self.registry)
            .with_mirror_active(self.scoring.mirror_active)
            .score_all(batch_size.or(self.scoring.batch_size))
            .await
    }

    /// Recompute one initiative and make the result durable
    pub async fn score_one(&self, key: &str) -> Result<ScoreOutcome> {
        let outcome = ScoringOrchestrator::new(self.store(), &self.registry)
            .with_mirror_active(self.scoring.mirror_active)
            .score_one(key)
            .await?;
        self.store.checkpoint().await?;
        Ok(outcome)
    }

    /// Planned score writes for the output tab, not applied
    pub async fn plan_score_writes(&self) -> Result<WritePlan> {
        OutputSync::new(self.store(), self.transport()?, &self.sheet.output_tab)
            .plan()
            .await
    }

    /// Push stored scores to the output tab in one batched write
    pub async fn write_scores_to_sheet(&self) -> Result<RunReport> {
        OutputSync::new(self.store(), self.transport()?, &self.sheet.output_tab)
            .write_scores_to_sheet()
            .await
    }

    /// Switch an initiative's active framework and mirror its stored triple
    pub async fn set_active(&self, key: &str, framework: FrameworkId) -> Result<()> {
        let switched = async {
            self.store.set_active(key, framework).await?;
            self.store.mirror_active_scores(key).await
        }
        .await;
        rollback_on_fatal(self.store(), switched).await?;
        self.store.checkpoint().await?;
        info!(key, %framework, "Active framework set");
        Ok(())
    }
}
