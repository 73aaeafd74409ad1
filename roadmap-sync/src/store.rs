//! Initiative store contract
//!
//! Every write names exactly the columns it touches, so inputs of one framework, scores
//! of another and the active triple never overwrite each other. Writes accumulate until
//! [`InitiativeStore::checkpoint`] makes them durable or [`InitiativeStore::rollback`]
//! discards them.

use async_trait::async_trait;
use futures::stream::BoxStream;
use roadmap_common::db::Initiative;
use roadmap_common::frameworks::SHARED_FIELDS;
use roadmap_common::{FrameworkId, Result, ScoreTriple};
use std::collections::BTreeMap;
use tracing::warn;

/// Page size used by [`InitiativeStore::list_all`]
pub const LIST_PAGE_SIZE: usize = 200;

/// Which group of input columns an upsert may touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InputScope {
    Shared,
    Framework(FrameworkId),
}

impl InputScope {
    pub fn owns(&self, field: &str) -> bool {
        match self {
            InputScope::Shared => SHARED_FIELDS.iter().any(|s| s.field == field),
            InputScope::Framework(id) => id.owns_input(field),
        }
    }
}

#[async_trait]
pub trait InitiativeStore: Send + Sync {
    /// Load one initiative with every input and score
    async fn get(&self, key: &str) -> Result<Option<Initiative>>;

    /// Merge input values into an existing initiative
    ///
    /// Fields not named are left untouched. Every field must belong to `scope`
    /// (`InvalidInput` otherwise); a missing initiative is `NotFound`.
    async fn upsert_inputs(
        &self,
        key: &str,
        scope: InputScope,
        fields: &BTreeMap<String, f64>,
    ) -> Result<()>;

    /// Overwrite one framework's output triple; other frameworks are untouched
    async fn upsert_framework_scores(
        &self,
        key: &str,
        framework: FrameworkId,
        scores: &ScoreTriple,
    ) -> Result<()>;

    /// Change the active framework selection only
    async fn set_active(&self, key: &str, framework: FrameworkId) -> Result<()>;

    /// Copy the active framework's stored triple into the active score columns
    async fn mirror_active_scores(&self, key: &str) -> Result<()>;

    /// Initiatives ordered by key, strictly after `after`
    async fn list_page(&self, after: Option<&str>, limit: usize) -> Result<Vec<Initiative>>;

    /// Make every write since the previous checkpoint durable
    async fn checkpoint(&self) -> Result<()>;

    /// Discard every write since the previous checkpoint
    async fn rollback(&self) -> Result<()>;

    /// Every initiative in key order, fetched a page at a time
    fn list_all(&self) -> BoxStream<'_, Result<Initiative>> {
        Box::pin(async_stream::try_stream! {
            let mut after: Option<String> = None;
            loop {
                let page = self.list_page(after.as_deref(), LIST_PAGE_SIZE).await?;
                let exhausted = page.len() < LIST_PAGE_SIZE;
                after = page.last().map(|i| i.initiative_key.clone());
                for initiative in page {
                    yield initiative;
                }
                if exhausted {
                    break;
                }
            }
        })
    }
}

/// Pass `result` through, discarding uncommitted writes when it is a fatal error
///
/// An aborted pass must not leave a partial batch for the next checkpoint to commit.
pub async fn rollback_on_fatal<T>(store: &dyn InitiativeStore, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        if err.is_fatal() {
            match store.rollback().await {
                Ok(()) => warn!("Pass failed ({}); uncommitted writes discarded", err),
                Err(rollback_err) => {
                    warn!("Pass failed ({}); rollback failed: {}", err, rollback_err)
                }
            }
        }
    }
    result
}

/// Checkpoint cadence for a pass over many records
///
/// With a batch size, the store is checkpointed after every `batch_size` records and
/// once more at the end if records remain uncommitted. Without one, once at the end.
#[derive(Debug, Clone)]
pub struct CheckpointPolicy {
    batch_size: Option<usize>,
    pending: usize,
    taken: usize,
}

impl CheckpointPolicy {
    pub fn new(batch_size: Option<usize>) -> Self {
        Self {
            batch_size: batch_size.filter(|&n| n > 0),
            pending: 0,
            taken: 0,
        }
    }

    /// Count one processed record, checkpointing when the batch is full
    pub async fn record_processed(&mut self, store: &dyn InitiativeStore) -> Result<()> {
        self.pending += 1;
        if let Some(size) = self.batch_size {
            if self.pending >= size {
                self.take(store).await?;
            }
        }
        Ok(())
    }

    /// Final checkpoint; returns the total taken during the pass
    pub async fn finish(mut self, store: &dyn InitiativeStore) -> Result<usize> {
        if self.pending > 0 || self.batch_size.is_none() {
            self.take(store).await?;
        }
        Ok(self.taken)
    }

    async fn take(&mut self, store: &dyn InitiativeStore) -> Result<()> {
        store.checkpoint().await?;
        self.pending = 0;
        self.taken += 1;
        Ok(())
    }
}
