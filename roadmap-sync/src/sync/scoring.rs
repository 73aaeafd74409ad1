//! Scoring pass
//!
//! Computes every registered framework for every initiative from stored inputs. Each
//! framework is computed on its own: a missing parameter in one never blocks another,
//! and a triple is only written when all three components were computed. An
//! unrecognized active selection is reported but does not stop the frameworks from
//! being scored.

use crate::columns::ACTIVE_FRAMEWORK;
use crate::report::{RecordFailure, RunReport};
use crate::store::{rollback_on_fatal, CheckpointPolicy, InitiativeStore};
use futures::TryStreamExt;
use roadmap_common::db::Initiative;
use roadmap_common::{Error, FrameworkId, FrameworkRegistry, ProvenanceToken, Result};
use tracing::{debug, info, warn};

/// Result of scoring one initiative
#[derive(Debug, Default)]
pub struct ScoreOutcome {
    pub scored: Vec<FrameworkId>,
    pub failures: Vec<RecordFailure>,
}

pub struct ScoringOrchestrator<'a> {
    store: &'a dyn InitiativeStore,
    registry: &'a FrameworkRegistry,
    mirror_active: bool,
}

impl<'a> ScoringOrchestrator<'a> {
    pub fn new(store: &'a dyn InitiativeStore, registry: &'a FrameworkRegistry) -> Self {
        Self {
            store,
            registry,
            mirror_active: true,
        }
    }

    /// Whether to refresh the active score columns after scoring
    pub fn with_mirror_active(mut self, mirror_active: bool) -> Self {
        self.mirror_active = mirror_active;
        self
    }

    /// Score a single initiative; the caller checkpoints
    ///
    /// Leaves the active framework selection alone.
    pub async fn score_one(&self, key: &str) -> Result<ScoreOutcome> {
        let scored = match self.store.get(key).await {
            Ok(Some(initiative)) => self.score_initiative(&initiative).await,
            Ok(None) => Err(Error::NotFound(key.to_string())),
            Err(err) => Err(err),
        };
        rollback_on_fatal(self.store, scored).await
    }

    /// Score every initiative, checkpointing per `batch_size`
    ///
    /// A fatal error discards the writes made since the last checkpoint.
    pub async fn score_all(&self, batch_size: Option<usize>) -> Result<RunReport> {
        rollback_on_fatal(self.store, self.score_batches(batch_size).await).await
    }

    async fn score_batches(&self, batch_size: Option<usize>) -> Result<RunReport> {
        let mut report = RunReport::new("score_all");
        let mut checkpoints = CheckpointPolicy::new(batch_size);

        let mut initiatives = self.store.list_all();
        while let Some(initiative) = initiatives.try_next().await? {
            report.processed += 1;

            let outcome = self.score_initiative(&initiative).await?;
            if !outcome.scored.is_empty() {
                report.changed += 1;
                report.touch(&initiative.initiative_key, ProvenanceToken::ScoresComputed);
            }
            report.failures.extend(outcome.failures);

            checkpoints.record_processed(self.store).await?;
        }

        report.checkpoints = checkpoints.finish(self.store).await?;
        info!("{}", report.summary());
        Ok(report)
    }

    async fn score_initiative(&self, initiative: &Initiative) -> Result<ScoreOutcome> {
        let key = initiative.initiative_key.as_str();
        let mut outcome = ScoreOutcome::default();

        if let Some(err) = initiative.selection_error() {
            warn!(key, "{}; active scores left as mirrored", err);
            outcome.failures.push(
                RecordFailure::from_error(&err)
                    .for_key(key)
                    .for_field(ACTIVE_FRAMEWORK),
            );
        }

        for &framework in self.registry.frameworks() {
            let scored = match self.registry.compute_for(framework, &initiative.inputs) {
                Ok(triple) => self
                    .store
                    .upsert_framework_scores(key, framework, &triple)
                    .await
                    .map(|()| triple),
                Err(err) => Err(err),
            };

            match scored {
                Ok(triple) => {
                    debug!(key, %framework, overall = triple.overall, "Scored");
                    outcome.scored.push(framework);
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(key, %framework, "Not scored: {}", err);
                    outcome.failures.push(
                        RecordFailure::from_error(&err)
                            .for_key(key)
                            .for_framework(framework),
                    );
                }
            }
        }

        if self.mirror_active {
            self.store.mirror_active_scores(key).await?;
        }

        Ok(outcome)
    }
}
