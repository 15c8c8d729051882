//! Schema introspection.
//!
//! SQL text lives in the `queries` submodule, one set of constants per
//! database. Each database-specific submodule exposes the same two
//! functions: list the user's base tables, and read one table's columns in
//! ordinal order.

use crate::db::mssql::SqlServerPool;
use crate::db::pool::DbPool;
use crate::error::DbResult;
use crate::models::{ColumnDescriptor, TableIdentifier};
use tracing::debug;

/// Schema inspector for database introspection.
pub struct SchemaInspector;

impl SchemaInspector {
    /// List every user base table, ordered by schema then name.
    pub async fn list_tables(pool: &DbPool) -> DbResult<Vec<TableIdentifier>> {
        let tables = match pool {
            DbPool::Postgres(p) => postgres::list_tables(p).await?,
            DbPool::MySql(p) => mysql::list_tables(p).await?,
            DbPool::SQLite(p) => sqlite::list_tables(p).await?,
            DbPool::SqlServer(p) => mssql::list_tables(p).await?,
        };
        debug!(count = tables.len(), db_type = %pool.db_type(), "Listed tables");
        Ok(tables)
    }

    /// Columns of one table in ordinal order. An unknown table yields an
    /// empty list rather than an error.
    pub async fn table_columns(
        pool: &DbPool,
        table: &TableIdentifier,
    ) -> DbResult<Vec<ColumnDescriptor>> {
        match pool {
            DbPool::Postgres(p) => postgres::table_columns(p, table).await,
            DbPool::MySql(p) => mysql::table_columns(p, table).await,
            DbPool::SQLite(p) => sqlite::table_columns(p, table).await,
            DbPool::SqlServer(p) => mssql::table_columns(p, table).await,
        }
    }
}

// =============================================================================
// SQL Query Templates
// =============================================================================

mod queries {
    pub mod postgres {
        pub const LIST_TABLES: &str = r#"
            SELECT table_schema::text AS table_schema, table_name::text AS table_name
            FROM information_schema.tables
            WHERE table_type = 'BASE TABLE'
            AND table_schema NOT IN ('pg_catalog', 'information_schema')
            AND table_schema NOT LIKE 'pg_toast%'
            ORDER BY table_schema, table_name
            "#;

        pub const TABLE_COLUMNS: &str = r#"
            SELECT
                column_name::text AS column_name,
                CASE WHEN data_type = 'USER-DEFINED' THEN udt_name::text
                     ELSE data_type::text END AS data_type,
                character_maximum_length::int4 AS max_length,
                is_nullable::text AS is_nullable
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
            "#;
    }

    pub mod mysql {
        pub const LIST_TABLES: &str = r#"
            SELECT
                CONVERT(TABLE_SCHEMA USING utf8) AS table_schema,
                CONVERT(TABLE_NAME USING utf8) AS table_name
            FROM information_schema.TABLES
            WHERE TABLE_TYPE = 'BASE TABLE'
            AND TABLE_SCHEMA NOT IN ('mysql', 'information_schema', 'performance_schema', 'sys')
            AND (DATABASE() IS NULL OR TABLE_SCHEMA = DATABASE())
            ORDER BY TABLE_SCHEMA, TABLE_NAME
            "#;

        pub const TABLE_COLUMNS: &str = r#"
            SELECT
                CONVERT(COLUMN_NAME USING utf8) AS column_name,
                CONVERT(DATA_TYPE USING utf8) AS data_type,
                CHARACTER_MAXIMUM_LENGTH AS max_length,
                CONVERT(IS_NULLABLE USING utf8) AS is_nullable
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
            "#;
    }

    pub mod sqlite {
        pub const LIST_TABLES: &str = r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#;

        pub const TABLE_COLUMNS: &str =
            r#"SELECT name, type, "notnull" FROM pragma_table_info(?1) ORDER BY cid"#;
    }

    pub mod mssql {
        pub const LIST_TABLES: &str = r#"
            SELECT TABLE_SCHEMA, TABLE_NAME
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_TYPE = 'BASE TABLE'
            AND TABLE_SCHEMA NOT IN ('sys', 'INFORMATION_SCHEMA')
            ORDER BY TABLE_SCHEMA, TABLE_NAME
            "#;

        pub const TABLE_COLUMNS: &str = r#"
            SELECT COLUMN_NAME, DATA_TYPE, CHARACTER_MAXIMUM_LENGTH, IS_NULLABLE
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2
            ORDER BY ORDINAL_POSITION
            "#;
    }
}

fn nullable_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("YES")
}

fn column(name: String, data_type: String, max_length: Option<i64>, nullable: bool) -> ColumnDescriptor {
    let descriptor = ColumnDescriptor::new(name, data_type, nullable);
    match max_length {
        Some(len) => descriptor.with_max_length(len),
        None => descriptor,
    }
}

// =============================================================================
// PostgreSQL
// =============================================================================

mod postgres {
    use super::*;
    use sqlx::{PgPool, Row};

    pub async fn list_tables(pool: &PgPool) -> DbResult<Vec<TableIdentifier>> {
        let rows = sqlx::query(queries::postgres::LIST_TABLES)
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                TableIdentifier::new(
                    row.get::<String, _>("table_schema"),
                    row.get::<String, _>("table_name"),
                )
            })
            .collect())
    }

    pub async fn table_columns(
        pool: &PgPool,
        table: &TableIdentifier,
    ) -> DbResult<Vec<ColumnDescriptor>> {
        let rows = sqlx::query(queries::postgres::TABLE_COLUMNS)
            .bind(&table.schema)
            .bind(&table.name)
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                column(
                    row.get("column_name"),
                    row.get("data_type"),
                    row.get::<Option<i32>, _>("max_length").map(i64::from),
                    nullable_flag(&row.get::<String, _>("is_nullable")),
                )
            })
            .collect())
    }
}

// =============================================================================
// MySQL
// =============================================================================

mod mysql {
    use super::*;
    use sqlx::mysql::MySqlRow;
    use sqlx::{MySqlPool, Row};

    /// MySQL 5.x reports lengths as BIGINT, 8.x as BIGINT UNSIGNED.
    fn try_get_length(row: &MySqlRow, column: &str) -> Option<i64> {
        if let Ok(Some(v)) = row.try_get::<Option<u64>, _>(column) {
            return Some(i64::try_from(v).unwrap_or(i64::MAX));
        }
        row.try_get::<Option<i64>, _>(column).ok().flatten()
    }

    /// Metadata text may come back as VARBINARY depending on the server charset.
    fn get_string(row: &MySqlRow, column: &str) -> String {
        row.try_get::<String, _>(column)
            .ok()
            .or_else(|| {
                row.try_get::<Vec<u8>, _>(column)
                    .ok()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
            })
            .unwrap_or_default()
    }

    pub async fn list_tables(pool: &MySqlPool) -> DbResult<Vec<TableIdentifier>> {
        let rows = sqlx::query(queries::mysql::LIST_TABLES)
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| TableIdentifier::new(get_string(row, "table_schema"), get_string(row, "table_name")))
            .collect())
    }

    pub async fn table_columns(
        pool: &MySqlPool,
        table: &TableIdentifier,
    ) -> DbResult<Vec<ColumnDescriptor>> {
        let rows = sqlx::query(queries::mysql::TABLE_COLUMNS)
            .bind(&table.schema)
            .bind(&table.name)
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                column(
                    get_string(row, "column_name"),
                    get_string(row, "data_type"),
                    try_get_length(row, "max_length"),
                    nullable_flag(&get_string(row, "is_nullable")),
                )
            })
            .collect())
    }
}

// =============================================================================
// SQLite
// =============================================================================

mod sqlite {
    use super::*;
    use sqlx::{Row, SqlitePool};

    pub const MAIN_SCHEMA: &str = "main";

    /// Split a declared type such as `VARCHAR(50)` into `VARCHAR` and 50.
    /// Types without a declaration report `ANY`.
    pub fn split_declared_type(declared: &str) -> (String, Option<i64>) {
        let declared = declared.trim();
        if declared.is_empty() {
            return ("ANY".to_string(), None);
        }
        match declared.split_once('(') {
            Some((base, rest)) => {
                let length = rest
                    .trim_end_matches(')')
                    .split(',')
                    .next()
                    .and_then(|n| n.trim().parse::<i64>().ok());
                (base.trim().to_string(), length)
            }
            None => (declared.to_string(), None),
        }
    }

    pub async fn list_tables(pool: &SqlitePool) -> DbResult<Vec<TableIdentifier>> {
        let rows = sqlx::query(queries::sqlite::LIST_TABLES)
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| TableIdentifier::new(MAIN_SCHEMA, row.get::<String, _>("name")))
            .collect())
    }

    pub async fn table_columns(
        pool: &SqlitePool,
        table: &TableIdentifier,
    ) -> DbResult<Vec<ColumnDescriptor>> {
        if !table.schema.eq_ignore_ascii_case(MAIN_SCHEMA) {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(queries::sqlite::TABLE_COLUMNS)
            .bind(&table.name)
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let (data_type, length) = split_declared_type(&row.get::<String, _>("type"));
                column(
                    row.get("name"),
                    data_type,
                    length,
                    row.get::<i64, _>("notnull") == 0,
                )
            })
            .collect())
    }
}

// =============================================================================
// SQL Server
// =============================================================================

mod mssql {
    use super::*;
    use tiberius::Row;

    fn text(row: &Row, idx: usize) -> Option<&str> {
        row.try_get::<&str, _>(idx).ok().flatten()
    }

    pub async fn list_tables(pool: &SqlServerPool) -> DbResult<Vec<TableIdentifier>> {
        let rows = pool.query(queries::mssql::LIST_TABLES, &[]).await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let schema = text(row, 0)?;
                let name = text(row, 1)?;
                Some(TableIdentifier::new(schema, name))
            })
            .collect())
    }

    pub async fn table_columns(
        pool: &SqlServerPool,
        table: &TableIdentifier,
    ) -> DbResult<Vec<ColumnDescriptor>> {
        let rows = pool
            .query(queries::mssql::TABLE_COLUMNS, &[table.schema.as_str(), table.name.as_str()])
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let name = text(row, 0)?;
                let data_type = text(row, 1)?;
                let max_length = row.try_get::<i32, _>(2).ok().flatten().map(i64::from);
                let nullable = text(row, 3).is_some_and(nullable_flag);
                Some(column(name.to_string(), data_type.to_string(), max_length, nullable))
            })
            .collect())
    }
}
