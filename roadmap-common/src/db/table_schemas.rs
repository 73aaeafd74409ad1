//! Table schema definitions
//!
//! The `initiatives` column set is derived from the framework registry: one nullable
//! `REAL` column per framework input and per framework output score.

use crate::db::schema_sync::{sync_table, ColumnSpec, SqlType, TableSchema};
use crate::frameworks::{self, ScoreComponent, SHARED_FIELDS};
use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

/// `initiatives` table schema
pub struct InitiativesTableSchema;

impl TableSchema for InitiativesTableSchema {
    const TABLE: &'static str = "initiatives";

    fn columns() -> Vec<ColumnSpec> {
        let real = |name| ColumnSpec::nullable(name, SqlType::Real);

        let mut columns = vec![
            ColumnSpec::primary_key("initiative_key", SqlType::Text),
            ColumnSpec::nullable("title", SqlType::Text),
            ColumnSpec::not_null_default("active_scoring_framework", SqlType::Text, "'RICE'"),
        ];
        columns.extend(SHARED_FIELDS.iter().map(|shared| real(shared.field)));
        columns.extend(ScoreComponent::ALL.iter().map(|c| real(c.active_field())));
        columns.extend(frameworks::input_fields().map(|(_, param)| real(param.field)));
        columns.extend(frameworks::output_fields().map(|(_, _, field)| real(field)));
        for stamp in ["created_at", "updated_at"] {
            columns.push(ColumnSpec::not_null_default(
                stamp,
                SqlType::Timestamp,
                "CURRENT_TIMESTAMP",
            ));
        }
        columns
    }
}

/// Add any declared column the live tables lack
///
/// Runs after CREATE TABLE IF NOT EXISTS.
pub async fn sync_all_table_schemas(pool: &SqlitePool) -> Result<()> {
    let added = sync_table::<InitiativesTableSchema>(pool).await?;
    info!("Schema synchronization complete ({} column(s) added)", added);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema_sync::Constraint;
    use crate::frameworks::FrameworkId;

    #[test]
    fn test_every_framework_field_has_a_column() {
        let columns = InitiativesTableSchema::columns();
        let has = |name: &str| columns.iter().any(|c| c.name == name);

        assert_eq!(columns[0].constraint, Constraint::PrimaryKey);
        assert_eq!(columns[0].name, "initiative_key");
        for id in FrameworkId::ALL {
            for param in id.definition().params {
                assert!(has(param.field), "missing input column {}", param.field);
            }
            for component in ScoreComponent::ALL {
                assert!(has(id.output_field(component)));
            }
        }
        assert!(has("value_score"));
        assert!(has("priority_coefficient"));
    }

    #[test]
    fn test_framework_columns_are_nullable_real() {
        for column in InitiativesTableSchema::columns()
            .iter()
            .filter(|c| c.name.starts_with("rice_") || c.name.starts_with("wsjf_"))
        {
            assert_eq!(column.sql_type, SqlType::Real);
            assert_eq!(column.constraint, Constraint::Nullable);
        }
    }

    #[test]
    fn test_column_names_are_unique() {
        let columns = InitiativesTableSchema::columns();
        let mut names: Vec<&str> = columns.iter().map(|c| c.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), columns.len());
    }
}
