//! Database initialization
//!
//! Opens the database, creating it on first run, then brings the `initiatives` table
//! up to the declared schema.

use crate::db::schema_sync::create_table_sql;
use crate::db::table_schemas::{sync_all_table_schemas, InitiativesTableSchema};
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_CONNECTIONS: u32 = 4;

/// Open the initiatives database at `db_path`
///
/// Missing parent directories and the file itself are created. Tables written by an
/// older build gain any framework columns they lack.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let fresh = !db_path.exists();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // WAL: readers are not blocked by a pass holding its write transaction
    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(db_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(BUSY_TIMEOUT),
        )
        .await?;
    info!(
        "{} database {}",
        if fresh { "Created" } else { "Opened" },
        db_path.display()
    );

    create_initiatives_table(&pool).await?;
    sync_all_table_schemas(&pool).await?;
    Ok(pool)
}

/// Create `initiatives` with every declared column if it does not exist yet
pub async fn create_initiatives_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(&create_table_sql::<InitiativesTableSchema>())
        .execute(pool)
        .await?;
    Ok(())
}
