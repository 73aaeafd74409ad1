//! Output sync: store → sheet
//!
//! Plans cell writes for every score column present in the output tab and applies them
//! in one transport call. Cells are only written when the stored score exists and
//! differs from what the sheet already shows.

use crate::columns::{FieldKind, HeaderMapping, INITIATIVE_KEY};
use crate::reader::parse_number;
use crate::report::{RecordFailure, RunReport};
use crate::store::InitiativeStore;
use crate::transport::{CellWrite, Grid, GridTransport};
use roadmap_common::{Error, FrameworkId, ProvenanceToken, Result, ScoreComponent};
use tracing::{debug, info, warn};

/// Writes planned for one output tab
#[derive(Debug, Default)]
pub struct WritePlan {
    pub writes: Vec<CellWrite>,
    pub report: RunReport,
}

pub struct OutputSync<'a> {
    store: &'a dyn InitiativeStore,
    transport: &'a dyn GridTransport,
    tab: String,
}

impl<'a> OutputSync<'a> {
    pub fn new(
        store: &'a dyn InitiativeStore,
        transport: &'a dyn GridTransport,
        tab: impl Into<String>,
    ) -> Self {
        Self {
            store,
            transport,
            tab: tab.into(),
        }
    }

    /// Read the output tab and plan writes without applying them
    pub async fn plan(&self) -> Result<WritePlan> {
        let grid = self.transport.read_grid(&self.tab).await?;
        plan_score_writes(self.store, &grid).await
    }

    /// Plan and apply score writes in a single batch
    pub async fn write_scores_to_sheet(&self) -> Result<RunReport> {
        let WritePlan { writes, mut report } = self.plan().await?;

        if writes.is_empty() {
            info!(tab = %self.tab, "Sheet already up to date");
        } else {
            self.transport.apply_writes(&self.tab, &writes).await?;
            report.cells_written = writes.len();
        }

        info!("{}", report.summary());
        Ok(report)
    }
}

/// Plan writes for the score columns present in `grid`
///
/// Only per-framework output columns are written. Rows whose initiative is unknown or
/// cannot be loaded are skipped and reported.
pub async fn plan_score_writes(store: &dyn InitiativeStore, grid: &Grid) -> Result<WritePlan> {
    let mut plan = WritePlan {
        writes: Vec::new(),
        report: RunReport::new("write_scores"),
    };

    let mapping = HeaderMapping::from_header(grid.header())?;
    let key_column = mapping.require(INITIATIVE_KEY)?;
    plan.report.unresolved_columns = mapping
        .unresolved()
        .iter()
        .map(|(_, raw)| raw.clone())
        .collect();

    let outputs: Vec<(FrameworkId, ScoreComponent, usize)> = mapping
        .fields()
        .filter_map(|(spec, column)| match spec.kind {
            FieldKind::Output(framework, component) => Some((framework, component, column)),
            _ => None,
        })
        .collect();

    if outputs.is_empty() {
        warn!("Output tab has no score columns; nothing to write");
        return Ok(plan);
    }

    for (row, cells) in grid.data_rows() {
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let key = grid.cell(row, key_column).trim();
        if key.is_empty() {
            let err = Error::MissingIdentifier { row };
            warn!("Skipping row: {}", err);
            plan.report.fail(RecordFailure::from_error(&err));
            continue;
        }
        plan.report.processed += 1;

        let initiative = match store.get(key).await {
            Ok(Some(initiative)) => initiative,
            Ok(None) => {
                let err = Error::NotFound(key.to_string());
                warn!("Skipping row {}: {}", row + 1, err);
                plan.report.fail(RecordFailure::from_error(&err).at_row(row));
                continue;
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(key, "Skipping row {}: {}", row + 1, err);
                plan.report
                    .fail(RecordFailure::from_error(&err).at_row(row).for_key(key));
                continue;
            }
        };

        let before = plan.writes.len();
        for &(framework, component, column) in &outputs {
            let Some(value) = initiative.scores(framework).get(component) else {
                continue;
            };
            if parse_number(grid.cell(row, column)) == Ok(Some(value)) {
                continue;
            }
            let write = CellWrite { row, column, value };
            debug!(key, cell = %write.a1(), value, "Planned write");
            plan.writes.push(write);
        }

        if plan.writes.len() > before {
            plan.report.changed += 1;
            plan.report.touch(key, ProvenanceToken::ScoresWrittenToSheet);
        }
    }

    Ok(plan)
}
