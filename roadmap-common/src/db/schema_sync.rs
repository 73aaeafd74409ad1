//! Declarative schema synchronization
//!
//! A table's columns are declared in code. On startup the live table is compared with
//! the declaration and each missing column is added with `ALTER TABLE ADD COLUMN`, so a
//! new framework's columns appear without a hand-written migration. Columns are never
//! dropped or retyped; a type conflict is only logged.

use crate::Result;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

/// Declared SQL type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Real,
    Timestamp,
}

impl SqlType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Real => "REAL",
            SqlType::Timestamp => "TIMESTAMP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    Nullable,
    PrimaryKey,
    /// `NOT NULL DEFAULT <sql literal or expression>`
    NotNullDefault(&'static str),
}

/// One declared column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub constraint: Constraint,
}

impl ColumnSpec {
    pub const fn nullable(name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            sql_type,
            constraint: Constraint::Nullable,
        }
    }

    pub const fn primary_key(name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            sql_type,
            constraint: Constraint::PrimaryKey,
        }
    }

    pub const fn not_null_default(
        name: &'static str,
        sql_type: SqlType,
        default: &'static str,
    ) -> Self {
        Self {
            name,
            sql_type,
            constraint: Constraint::NotNullDefault(default),
        }
    }

    /// Full column clause for `CREATE TABLE`
    pub fn definition(&self) -> String {
        let base = format!("{} {}", self.name, self.sql_type.as_sql());
        match self.constraint {
            Constraint::Nullable => base,
            Constraint::PrimaryKey => format!("{} PRIMARY KEY", base),
            Constraint::NotNullDefault(default) => format!("{} NOT NULL DEFAULT {}", base, default),
        }
    }

    /// Column clause for `ALTER TABLE .. ADD COLUMN`
    ///
    /// SQLite refuses PRIMARY KEY here and accepts NOT NULL only with a constant
    /// default, so such columns degrade to plain nullable ones.
    pub fn add_column_clause(&self) -> String {
        let base = format!("{} {}", self.name, self.sql_type.as_sql());
        match self.constraint {
            Constraint::NotNullDefault(default) if is_constant(default) => {
                format!("{} NOT NULL DEFAULT {}", base, default)
            }
            _ => base,
        }
    }

    fn degrades_on_add(&self) -> bool {
        match self.constraint {
            Constraint::Nullable => false,
            Constraint::PrimaryKey => true,
            Constraint::NotNullDefault(default) => !is_constant(default),
        }
    }
}

fn is_constant(default: &str) -> bool {
    !default.trim().to_uppercase().starts_with("CURRENT_")
}

/// Declared schema of one table
pub trait TableSchema {
    const TABLE: &'static str;

    /// Declared columns, in creation order
    fn columns() -> Vec<ColumnSpec>;
}

/// `CREATE TABLE IF NOT EXISTS` statement with every declared column
pub fn create_table_sql<T: TableSchema>() -> String {
    let columns: Vec<String> = T::columns().iter().map(ColumnSpec::definition).collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        T::TABLE,
        columns.join(",\n    ")
    )
}

/// A column as the live table reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingColumn {
    pub name: String,
    pub declared_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Affinity {
    Integer,
    Text,
    Blob,
    Real,
    Numeric,
}

/// SQLite's column affinity rules, applied in their documented order
fn affinity(declared: &str) -> Affinity {
    let upper = declared.to_uppercase();
    if upper.contains("INT") {
        Affinity::Integer
    } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        Affinity::Text
    } else if upper.is_empty() || upper.contains("BLOB") {
        Affinity::Blob
    } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
        Affinity::Real
    } else {
        Affinity::Numeric
    }
}

/// One step between a live table and its declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    AddColumn(ColumnSpec),
    TypeConflict {
        column: &'static str,
        declared: SqlType,
        found: String,
    },
}

/// Columns of `table` in table order; empty when the table does not exist
pub async fn existing_columns(pool: &SqlitePool, table: &str) -> Result<Vec<ExistingColumn>> {
    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT name, type FROM pragma_table_info(?) ORDER BY cid")
            .bind(table)
            .fetch_all(pool)
            .await?;

    Ok(rows
        .into_iter()
        .map(|(name, declared_type)| ExistingColumn {
            name,
            declared_type,
        })
        .collect())
}

/// Changes that take `existing` to `declared`, in declaration order
pub fn plan_changes(declared: &[ColumnSpec], existing: &[ExistingColumn]) -> Vec<SchemaChange> {
    declared
        .iter()
        .filter_map(|spec| {
            let Some(live) = existing
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(spec.name))
            else {
                return Some(SchemaChange::AddColumn(*spec));
            };
            (affinity(&live.declared_type) != affinity(spec.sql_type.as_sql())).then(|| {
                SchemaChange::TypeConflict {
                    column: spec.name,
                    declared: spec.sql_type,
                    found: live.declared_type.clone(),
                }
            })
        })
        .collect()
}

/// Add every declared column `T::TABLE` lacks; returns how many were added
///
/// The table must already exist; a missing table is skipped with a warning.
pub async fn sync_table<T: TableSchema>(pool: &SqlitePool) -> Result<usize> {
    let existing = existing_columns(pool, T::TABLE).await?;
    if existing.is_empty() {
        warn!("Table '{}' does not exist; skipping schema sync", T::TABLE);
        return Ok(0);
    }

    let mut added = 0;
    for change in plan_changes(&T::columns(), &existing) {
        match change {
            SchemaChange::AddColumn(spec) => {
                if spec.degrades_on_add() {
                    warn!(
                        "{}.{} added without its {:?} constraint",
                        T::TABLE,
                        spec.name,
                        spec.constraint
                    );
                }
                let sql = format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    T::TABLE,
                    spec.add_column_clause()
                );
                debug!("{}", sql);
                sqlx::query(&sql).execute(pool).await?;
                added += 1;
            }
            SchemaChange::TypeConflict {
                column,
                declared,
                found,
            } => warn!(
                "{}.{} is declared {} but the table has '{}'; leaving it as is",
                T::TABLE,
                column,
                declared.as_sql(),
                found
            ),
        }
    }

    if added > 0 {
        info!("Added {} column(s) to '{}'", added, T::TABLE);
    }
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    struct ScoresSchema;

    impl TableSchema for ScoresSchema {
        const TABLE: &'static str = "scores";

        fn columns() -> Vec<ColumnSpec> {
            vec![
                ColumnSpec::primary_key("key", SqlType::Text),
                ColumnSpec::nullable("rice_reach", SqlType::Real),
                ColumnSpec::not_null_default("framework", SqlType::Text, "'RICE'"),
                ColumnSpec::not_null_default("updated_at", SqlType::Timestamp, "CURRENT_TIMESTAMP"),
            ]
        }
    }

    async fn memory_pool(create: &str) -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(create).execute(&pool).await.unwrap();
        pool
    }

    fn live(name: &str, declared_type: &str) -> ExistingColumn {
        ExistingColumn {
            name: name.to_string(),
            declared_type: declared_type.to_string(),
        }
    }

    #[test]
    fn test_add_column_clause() {
        let [key, reach, framework, updated] = <[ColumnSpec; 4]>::try_from(ScoresSchema::columns())
            .unwrap();
        assert_eq!(key.add_column_clause(), "key TEXT");
        assert_eq!(reach.add_column_clause(), "rice_reach REAL");
        assert_eq!(
            framework.add_column_clause(),
            "framework TEXT NOT NULL DEFAULT 'RICE'"
        );
        assert_eq!(updated.add_column_clause(), "updated_at TIMESTAMP");
        assert!(key.degrades_on_add() && updated.degrades_on_add());
        assert!(!framework.degrades_on_add());
    }

    #[test]
    fn test_create_table_sql_keeps_constraints() {
        let sql = create_table_sql::<ScoresSchema>();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS scores ("));
        assert!(sql.contains("key TEXT PRIMARY KEY,"));
        assert!(sql.contains("updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP\n)"));
    }

    #[test]
    fn test_affinity() {
        assert_eq!(affinity("REAL"), affinity("DOUBLE PRECISION"));
        assert_eq!(affinity("text"), affinity("VARCHAR(40)"));
        assert_eq!(affinity("INTEGER"), affinity("BIGINT"));
        assert_eq!(affinity("TIMESTAMP"), Affinity::Numeric);
        assert_ne!(affinity("REAL"), affinity("TEXT"));
    }

    #[test]
    fn test_plan_lists_conflicts_and_missing_columns() {
        let plan = plan_changes(
            &ScoresSchema::columns(),
            &[live("KEY", "TEXT"), live("rice_reach", "TEXT")],
        );

        assert_eq!(plan.len(), 3);
        assert_eq!(
            plan[0],
            SchemaChange::TypeConflict {
                column: "rice_reach",
                declared: SqlType::Real,
                found: "TEXT".to_string(),
            }
        );
        assert!(matches!(plan[1], SchemaChange::AddColumn(spec) if spec.name == "framework"));
        assert!(matches!(plan[2], SchemaChange::AddColumn(spec) if spec.name == "updated_at"));
    }

    #[tokio::test]
    async fn test_sync_adds_missing_columns_once() {
        let pool = memory_pool("CREATE TABLE scores (key TEXT PRIMARY KEY)").await;

        assert_eq!(sync_table::<ScoresSchema>(&pool).await.unwrap(), 3);
        assert_eq!(sync_table::<ScoresSchema>(&pool).await.unwrap(), 0);

        let names: Vec<String> = existing_columns(&pool, "scores")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["key", "rice_reach", "framework", "updated_at"]);
    }

    #[tokio::test]
    async fn test_added_default_reaches_existing_rows() {
        let pool = memory_pool("CREATE TABLE scores (key TEXT PRIMARY KEY)").await;
        sqlx::query("INSERT INTO scores (key) VALUES ('INIT-001')")
            .execute(&pool)
            .await
            .unwrap();

        sync_table::<ScoresSchema>(&pool).await.unwrap();

        let framework: String = sqlx::query_scalar("SELECT framework FROM scores")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(framework, "RICE");
    }

    #[tokio::test]
    async fn test_conflicting_column_is_left_alone() {
        let pool =
            memory_pool("CREATE TABLE scores (key TEXT PRIMARY KEY, rice_reach TEXT)").await;

        assert_eq!(sync_table::<ScoresSchema>(&pool).await.unwrap(), 2);
        let reach = existing_columns(&pool, "scores").await.unwrap()[1].clone();
        assert_eq!(reach, live("rice_reach", "TEXT"));
    }

    #[tokio::test]
    async fn test_missing_table_is_skipped() {
        let pool = memory_pool("CREATE TABLE other (id INTEGER)").await;
        assert!(existing_columns(&pool, "scores").await.unwrap().is_empty());
        assert_eq!(sync_table::<ScoresSchema>(&pool).await.unwrap(), 0);
    }
}
