//! Initiative persistence on SQLite
//!
//! Writes go through one lazily-opened transaction that [`checkpoint`] commits. Reads
//! use that transaction while it is open, so a pass sees its own uncommitted writes.
//! Dynamic column names only ever come from the framework registry.
//!
//! [`checkpoint`]: InitiativeStore::checkpoint

use crate::store::{InitiativeStore, InputScope};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use roadmap_common::db::{init_database, Initiative};
use roadmap_common::frameworks::{self, SHARED_FIELDS};
use roadmap_common::scoring::StoredScores;
use roadmap_common::{Error, FrameworkId, Result, ScoreComponent, ScoreTriple};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Copies the active framework's triple into the active columns in one statement
static MIRROR_SQL: Lazy<String> = Lazy::new(|| {
    let assignments: Vec<String> = ScoreComponent::ALL
        .iter()
        .map(|component| {
            let arms: String = FrameworkId::ALL
                .iter()
                .map(|id| format!(" WHEN '{}' THEN {}", id.as_str(), id.output_field(*component)))
                .collect();
            format!(
                "{active} = CASE UPPER(TRIM(active_scoring_framework)){arms} ELSE {active} END",
                active = component.active_field(),
                arms = arms
            )
        })
        .collect();

    format!(
        "UPDATE initiatives SET {}, updated_at = CURRENT_TIMESTAMP WHERE initiative_key = ?",
        assignments.join(", ")
    )
});

/// SQLite-backed [`InitiativeStore`]
pub struct SqliteInitiativeStore {
    pool: SqlitePool,
    tx: Mutex<Option<Transaction<'static, Sqlite>>>,
}

impl SqliteInitiativeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            tx: Mutex::new(None),
        }
    }

    /// Open (creating if needed) the database file and wrap it
    pub async fn open(db_path: &Path) -> Result<Self> {
        Ok(Self::new(init_database(db_path).await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Register an initiative; returns false when the key already exists
    ///
    /// The sync passes never create initiatives, only update them.
    pub async fn create_initiative(&self, key: &str, title: Option<&str>) -> Result<bool> {
        let created = self
            .execute(
                sqlx::query(
                    r#"
                    INSERT OR IGNORE INTO initiatives (initiative_key, title)
                    VALUES (?, ?)
                    "#,
                )
                .bind(key)
                .bind(title),
            )
            .await?;
        Ok(created == 1)
    }

    async fn execute(&self, query: SqliteQuery<'_>) -> Result<u64> {
        let mut guard = self.tx.lock().await;
        let tx = match guard.take() {
            Some(tx) => tx,
            None => self.pool.begin().await?,
        };
        let tx = guard.insert(tx);
        Ok(query.execute(&mut **tx).await?.rows_affected())
    }

    async fn fetch_all(&self, query: SqliteQuery<'_>) -> Result<Vec<SqliteRow>> {
        let mut guard = self.tx.lock().await;
        let rows = match guard.as_mut() {
            Some(tx) => query.fetch_all(&mut **tx).await?,
            None => query.fetch_all(&self.pool).await?,
        };
        Ok(rows)
    }

    async fn execute_for_key(&self, key: &str, query: SqliteQuery<'_>) -> Result<()> {
        match self.execute(query).await? {
            0 => Err(Error::NotFound(key.to_string())),
            _ => Ok(()),
        }
    }
}

fn row_to_initiative(row: &SqliteRow) -> Result<Initiative> {
    let mut initiative = Initiative::new(row.try_get::<String, _>("initiative_key")?);
    initiative.title = row.try_get("title")?;
    let selection: String = row.try_get("active_scoring_framework")?;
    match selection.parse() {
        Ok(framework) => initiative.active_scoring_framework = framework,
        Err(_) => initiative.unknown_active_framework = Some(selection),
    }

    for shared in SHARED_FIELDS.iter() {
        initiative
            .shared_inputs
            .insert(shared.field.to_string(), row.try_get(shared.field)?);
    }
    for (_, param) in frameworks::input_fields() {
        initiative
            .inputs
            .insert(param.field.to_string(), row.try_get(param.field)?);
    }
    for id in FrameworkId::ALL {
        let scores = StoredScores {
            value: row.try_get(id.output_field(ScoreComponent::Value))?,
            effort: row.try_get(id.output_field(ScoreComponent::Effort))?,
            overall: row.try_get(id.output_field(ScoreComponent::Overall))?,
        };
        initiative.framework_scores.insert(id, scores);
    }
    initiative.active_scores = StoredScores {
        value: row.try_get(ScoreComponent::Value.active_field())?,
        effort: row.try_get(ScoreComponent::Effort.active_field())?,
        overall: row.try_get(ScoreComponent::Overall.active_field())?,
    };

    Ok(initiative)
}

fn ensure_finite(field: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("{} must be finite, got {}", field, value)))
    }
}

#[async_trait]
impl InitiativeStore for SqliteInitiativeStore {
    async fn get(&self, key: &str) -> Result<Option<Initiative>> {
        let rows = self
            .fetch_all(sqlx::query("SELECT * FROM initiatives WHERE initiative_key = ?").bind(key))
            .await?;
        rows.first().map(row_to_initiative).transpose()
    }

    async fn upsert_inputs(
        &self,
        key: &str,
        scope: InputScope,
        fields: &BTreeMap<String, f64>,
    ) -> Result<()> {
        if let Some(foreign) = fields.keys().find(|field| !scope.owns(field)) {
            return Err(Error::InvalidInput(format!(
                "field {} is not an input of {:?}",
                foreign, scope
            )));
        }
        for (field, value) in fields {
            ensure_finite(field, *value)?;
        }
        if fields.is_empty() {
            return Ok(());
        }

        let assignments: Vec<String> = fields.keys().map(|f| format!("{} = ?", f)).collect();
        let sql = format!(
            "UPDATE initiatives SET {}, updated_at = CURRENT_TIMESTAMP WHERE initiative_key = ?",
            assignments.join(", ")
        );
        let mut query = sqlx::query(&sql);
        for value in fields.values() {
            query = query.bind(*value);
        }

        self.execute_for_key(key, query.bind(key)).await?;
        debug!(key, ?scope, fields = fields.len(), "Upserted inputs");
        Ok(())
    }

    async fn upsert_framework_scores(
        &self,
        key: &str,
        framework: FrameworkId,
        scores: &ScoreTriple,
    ) -> Result<()> {
        for component in ScoreComponent::ALL {
            ensure_finite(framework.output_field(component), scores.get(component))?;
        }

        let sql = format!(
            "UPDATE initiatives SET {} = ?, {} = ?, {} = ?, updated_at = CURRENT_TIMESTAMP WHERE initiative_key = ?",
            framework.output_field(ScoreComponent::Value),
            framework.output_field(ScoreComponent::Effort),
            framework.output_field(ScoreComponent::Overall),
        );
        let query = sqlx::query(&sql)
            .bind(scores.value)
            .bind(scores.effort)
            .bind(scores.overall)
            .bind(key);

        self.execute_for_key(key, query).await
    }

    async fn set_active(&self, key: &str, framework: FrameworkId) -> Result<()> {
        let query = sqlx::query(
            r#"
            UPDATE initiatives
            SET active_scoring_framework = ?, updated_at = CURRENT_TIMESTAMP
            WHERE initiative_key = ?
            "#,
        )
        .bind(framework.as_str())
        .bind(key);

        self.execute_for_key(key, query).await
    }

    async fn mirror_active_scores(&self, key: &str) -> Result<()> {
        self.execute_for_key(key, sqlx::query(MIRROR_SQL.as_str()).bind(key))
            .await
    }

    async fn list_page(&self, after: Option<&str>, limit: usize) -> Result<Vec<Initiative>> {
        let query = sqlx::query(
            r#"
            SELECT * FROM initiatives
            WHERE ? IS NULL OR initiative_key > ?
            ORDER BY initiative_key
            LIMIT ?
            "#,
        )
        .bind(after)
        .bind(after)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX));

        self.fetch_all(query)
            .await?
            .iter()
            .map(row_to_initiative)
            .collect()
    }

    async fn checkpoint(&self) -> Result<()> {
        if let Some(tx) = self.tx.lock().await.take() {
            tx.commit().await?;
            debug!("Checkpoint committed");
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        if let Some(tx) = self.tx.lock().await.take() {
            tx.rollback().await?;
            debug!("Uncommitted writes rolled back");
        }
        Ok(())
    }
}
