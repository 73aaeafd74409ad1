//! Input sync: sheet → store
//!
//! Reads the input tab and merges every row's inputs into the store. Rows are never
//! turned into new initiatives. Only values that differ from what is stored are written,
//! so re-running against an unchanged sheet writes nothing.

use crate::columns::{self, FieldKind, ACTIVE_FRAMEWORK};
use crate::reader::{CellValue, ParsedRecord, TabularReader};
use crate::report::{RecordFailure, RunReport};
use crate::store::{rollback_on_fatal, CheckpointPolicy, InitiativeStore, InputScope};
use crate::transport::GridTransport;
use roadmap_common::{Error, FrameworkId, ProvenanceToken, Result};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// What one row changed
#[derive(Debug, Default)]
struct RowOutcome {
    inputs_changed: bool,
    active_changed: bool,
}

pub struct InputSync<'a> {
    store: &'a dyn InitiativeStore,
    transport: &'a dyn GridTransport,
    tab: String,
    batch_size: Option<usize>,
}

impl<'a> InputSync<'a> {
    pub fn new(
        store: &'a dyn InitiativeStore,
        transport: &'a dyn GridTransport,
        tab: impl Into<String>,
    ) -> Self {
        Self {
            store,
            transport,
            tab: tab.into(),
            batch_size: None,
        }
    }

    /// Checkpoint the store every `batch_size` rows instead of once at the end
    pub fn with_batch_size(mut self, batch_size: Option<usize>) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sync every row of the input tab
    ///
    /// Row-level problems land in the report; store, transport and header problems
    /// abort the pass and discard its uncommitted writes.
    pub async fn sync_inputs(&self) -> Result<RunReport> {
        rollback_on_fatal(self.store, self.sync_rows().await).await
    }

    async fn sync_rows(&self) -> Result<RunReport> {
        let mut report = RunReport::new("sync_inputs");
        let grid = self.transport.read_grid(&self.tab).await?;
        let reader = TabularReader::new(&grid)?;
        report.unresolved_columns = reader
            .mapping()
            .unresolved()
            .iter()
            .map(|(_, raw)| raw.clone())
            .collect();

        let mut checkpoints = CheckpointPolicy::new(self.batch_size);

        for parsed in reader.records() {
            let record = match parsed {
                Ok(record) => record,
                Err(err) => {
                    warn!("Skipping row: {}", err);
                    report.fail(RecordFailure::from_error(&err));
                    continue;
                }
            };
            report.processed += 1;

            match self.sync_record(&record, &mut report).await {
                Ok(outcome) => {
                    if outcome.inputs_changed {
                        report.touch(&record.initiative_key, ProvenanceToken::SheetInputsSynced);
                    }
                    if outcome.active_changed {
                        report.touch(&record.initiative_key, ProvenanceToken::ActiveFrameworkSet);
                    }
                    if outcome.inputs_changed || outcome.active_changed {
                        report.changed += 1;
                    }
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(key = %record.initiative_key, "Row not synced: {}", err);
                    report.fail(
                        RecordFailure::from_error(&err)
                            .at_row(record.row)
                            .for_key(&record.initiative_key),
                    );
                }
            }

            checkpoints.record_processed(self.store).await?;
        }

        report.checkpoints = checkpoints.finish(self.store).await?;
        info!("{}", report.summary());
        Ok(report)
    }

    async fn sync_record(&self, record: &ParsedRecord, report: &mut RunReport) -> Result<RowOutcome> {
        let key = record.initiative_key.as_str();
        for err in &record.invalid {
            warn!(key, "{}", err);
            report.fail(RecordFailure::from_error(err).at_row(record.row).for_key(key));
        }

        let initiative = self
            .store
            .get(key)
            .await?
            .ok_or_else(|| Error::NotFound(key.to_string()))?;

        let mut changes: BTreeMap<InputScope, BTreeMap<String, f64>> = BTreeMap::new();
        for (field, cell) in &record.values {
            let Some(spec) = columns::field(field) else {
                continue;
            };
            let (scope, value) = match (spec.kind, cell) {
                (FieldKind::Shared { .. }, CellValue::Number(v)) => (InputScope::Shared, *v),
                (FieldKind::Shared { default }, CellValue::Absent) => (InputScope::Shared, default),
                (FieldKind::Input(id), CellValue::Number(v)) => (InputScope::Framework(id), *v),
                _ => continue,
            };
            if initiative.input(field) != Some(value) {
                changes
                    .entry(scope)
                    .or_default()
                    .insert(field.to_string(), value);
            }
        }

        let mut outcome = RowOutcome::default();
        for (scope, fields) in &changes {
            self.store.upsert_inputs(key, *scope, fields).await?;
            debug!(key, ?scope, ?fields, "Inputs changed");
            outcome.inputs_changed = true;
        }

        if let Some(CellValue::Text(requested)) = record.values.get(ACTIVE_FRAMEWORK) {
            match requested.parse::<FrameworkId>() {
                Ok(framework)
                    if framework != initiative.active_scoring_framework
                        || initiative.unknown_active_framework.is_some() =>
                {
                    self.store.set_active(key, framework).await?;
                    self.store.mirror_active_scores(key).await?;
                    info!(key, %framework, "Active framework changed");
                    outcome.active_changed = true;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(key, "{}", err);
                    report.fail(
                        RecordFailure::from_error(&err)
                            .at_row(record.row)
                            .for_key(key)
                            .for_field(ACTIVE_FRAMEWORK),
                    );
                }
            }
        }

        Ok(outcome)
    }
}
