//! The database provider capability set.
//!
//! [`DatabaseProvider`] is everything the catalog builder and the repair
//! loop need from a database: its name, dialect label, table listing, DDL
//! synthesis, prompt hints, query normalization and execution. [`Provider`]
//! is the real implementation over a [`DbPool`]; tests substitute fakes.

use crate::db::executor::QueryExecutor;
use crate::db::pool::DbPool;
use crate::db::schema::SchemaInspector;
use crate::error::{DbError, DbResult};
use crate::models::{
    ColumnExclusions, ConnectionConfig, ConnectionInfo, DEFAULT_QUERY_TIMEOUT_SECS,
    DEFAULT_ROW_LIMIT, DatabaseType, NameSet, RowSet, TableIdentifier, filter_tables,
};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

/// What a database offers to schema discovery and query repair.
#[async_trait]
pub trait DatabaseProvider: Send + Sync {
    /// Human-readable database name, e.g. "SQL Server".
    fn name(&self) -> &str;

    /// SQL dialect label used in prompts, e.g. "Transact-SQL (T-SQL)".
    fn dialect_label(&self) -> &str;

    /// User tables after applying the include/exclude filters.
    async fn list_tables(
        &self,
        included: &NameSet,
        excluded: &NameSet,
    ) -> DbResult<Vec<TableIdentifier>>;

    /// Newline-joined `CREATE TABLE` statements for `tables`, in order.
    async fn synthesize_ddl(
        &self,
        tables: &[TableIdentifier],
        excluded_columns: &ColumnExclusions,
    ) -> DbResult<String>;

    /// Dialect-specific guidance for the model, if any.
    fn query_hints(&self) -> Option<&str>;

    /// Rewrite model output into something this dialect accepts.
    fn normalize_query(&self, sql: &str) -> String;

    async fn execute(&self, sql: &str) -> DbResult<RowSet>;
}

/// Timeouts and limits applied to every provider.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub query_timeout: Duration,
    pub connect_timeout: Duration,
    pub row_limit: u32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS as u64),
            connect_timeout: Duration::from_secs(10),
            row_limit: DEFAULT_ROW_LIMIT,
        }
    }
}

#[derive(Debug)]
enum ResourceState {
    Open(DbPool),
    Disposed,
}

/// A live connection to one database.
#[derive(Debug)]
pub struct Provider {
    id: String,
    db_type: DatabaseType,
    writable: bool,
    database: Option<String>,
    executor: QueryExecutor,
    state: RwLock<ResourceState>,
}

impl Provider {
    pub async fn connect(config: &ConnectionConfig, settings: &ProviderSettings) -> DbResult<Self> {
        let pool = DbPool::connect(config, settings.connect_timeout).await?;
        if let Some(version) = pool.server_version().await {
            debug!(connection_id = %config.id, version = %version, "Got server version");
        }

        let mut provider = Self::from_pool(config.id.clone(), pool, config.writable, settings);
        provider.database = config.database.clone();
        Ok(provider)
    }

    /// Wrap an already-open pool.
    pub fn from_pool(
        id: impl Into<String>,
        pool: DbPool,
        writable: bool,
        settings: &ProviderSettings,
    ) -> Self {
        Self {
            id: id.into(),
            db_type: pool.db_type(),
            writable,
            database: None,
            executor: QueryExecutor::new(settings.query_timeout, settings.row_limit),
            state: RwLock::new(ResourceState::Open(pool)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            connection_id: self.id.clone(),
            database_type: self.db_type,
            dialect: self.db_type.dialect_label().to_string(),
            writable: self.writable,
            database: self.database.clone(),
        }
    }

    /// Borrow the open pool for the duration of one operation. `dispose`
    /// waits for outstanding borrows.
    async fn pool(&self) -> DbResult<RwLockReadGuard<'_, DbPool>> {
        let guard = self.state.read().await;
        RwLockReadGuard::try_map(guard, |state| match state {
            ResourceState::Open(pool) => Some(pool),
            ResourceState::Disposed => None,
        })
        .map_err(|_| DbError::provider_disposed(&self.id))
    }

    /// Close the pool. Every later operation fails with `ProviderDisposed`.
    /// Disposing twice is a no-op.
    pub async fn dispose(&self) {
        let previous = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut *state, ResourceState::Disposed)
        };
        if let ResourceState::Open(pool) = previous {
            pool.close().await;
            info!(connection_id = %self.id, "Provider disposed");
        }
    }

    pub async fn is_disposed(&self) -> bool {
        matches!(*self.state.read().await, ResourceState::Disposed)
    }
}

#[async_trait]
impl DatabaseProvider for Provider {
    fn name(&self) -> &str {
        self.db_type.display_name()
    }

    fn dialect_label(&self) -> &str {
        self.db_type.dialect_label()
    }

    async fn list_tables(
        &self,
        included: &NameSet,
        excluded: &NameSet,
    ) -> DbResult<Vec<TableIdentifier>> {
        let pool = self.pool().await?;
        let tables = SchemaInspector::list_tables(&pool)
            .await
            .map_err(metadata_unavailable)?;
        Ok(filter_tables(tables, included, excluded))
    }

    async fn synthesize_ddl(
        &self,
        tables: &[TableIdentifier],
        excluded_columns: &ColumnExclusions,
    ) -> DbResult<String> {
        let pool = self.pool().await?;
        let mut statements = Vec::with_capacity(tables.len());

        for table in tables {
            let columns = match SchemaInspector::table_columns(&pool, table).await {
                Ok(columns) => columns,
                Err(e @ DbError::ProviderUnavailable { .. }) => return Err(e),
                Err(e) => {
                    warn!(table = %table, error = %e, "Skipping table: column metadata unavailable");
                    continue;
                }
            };

            let columns: Vec<_> = columns
                .into_iter()
                .filter(|c| !excluded_columns.excludes(table, &c.name))
                .collect();
            if columns.is_empty() {
                warn!(table = %table, "Skipping table with no columns");
                continue;
            }

            statements.push(self.db_type.render_create_table(table, &columns));
        }

        Ok(statements.join("\n"))
    }

    fn query_hints(&self) -> Option<&str> {
        self.db_type.query_hints()
    }

    fn normalize_query(&self, sql: &str) -> String {
        self.db_type.normalize_query(sql)
    }

    async fn execute(&self, sql: &str) -> DbResult<RowSet> {
        let pool = self.pool().await?;
        self.executor.execute(&pool, sql).await
    }
}

/// A table listing the database refuses to run means the catalog cannot be
/// read at all, whatever the driver called the failure.
fn metadata_unavailable(err: DbError) -> DbError {
    match err {
        DbError::ProviderUnavailable { .. } | DbError::ProviderDisposed { .. } => err,
        other => DbError::provider_unavailable(
            format!("Cannot list tables: {}", other),
            "Check that the login can read the database catalog",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    async fn memory_provider() -> Provider {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE items (id INTEGER NOT NULL, label VARCHAR(20))")
            .execute(&pool)
            .await
            .unwrap();
        Provider::from_pool("mem", DbPool::SQLite(pool), true, &ProviderSettings::default())
    }

    #[tokio::test]
    async fn test_facets_follow_dialect() {
        let provider = memory_provider().await;
        assert_eq!(provider.name(), "SQLite");
        assert_eq!(provider.dialect_label(), "SQLite SQL");
        assert!(provider.query_hints().is_none());
        assert_eq!(provider.normalize_query("SELECT 1;"), "SELECT 1");
    }

    #[tokio::test]
    async fn test_synthesize_ddl_for_memory_table() {
        let provider = memory_provider().await;
        let tables = provider
            .list_tables(&NameSet::default(), &NameSet::default())
            .await
            .unwrap();
        assert_eq!(tables, vec![TableIdentifier::new("main", "items")]);

        let ddl = provider
            .synthesize_ddl(&tables, &ColumnExclusions::default())
            .await
            .unwrap();
        assert_eq!(
            ddl,
            r#"CREATE TABLE "main"."items" ("id" INTEGER NOT NULL, "label" VARCHAR(20) NULL);"#
        );
    }

    #[tokio::test]
    async fn test_unreadable_catalog_is_provider_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.db");
        std::fs::write(&path, "this is not a database file\n".repeat(64)).unwrap();

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_lazy_with(SqliteConnectOptions::new().filename(&path));
        let provider =
            Provider::from_pool("garbage", DbPool::SQLite(pool), false, &ProviderSettings::default());

        let err = provider
            .list_tables(&NameSet::default(), &NameSet::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ProviderUnavailable { .. }), "{err:?}");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_metadata_errors_keep_connection_failures() {
        let err = metadata_unavailable(DbError::query_execution(
            "permission denied for schema information_schema",
            Some("42501".to_string()),
        ));
        assert!(matches!(err, DbError::ProviderUnavailable { .. }));
        assert!(err.to_string().contains("permission denied"));

        let disposed = metadata_unavailable(DbError::provider_disposed("pg"));
        assert!(matches!(disposed, DbError::ProviderDisposed { .. }));
    }

    #[tokio::test]
    async fn test_disposed_provider_rejects_operations() {
        let provider = memory_provider().await;
        provider.dispose().await;
        assert!(provider.is_disposed().await);

        let err = provider.execute("SELECT 1").await.unwrap_err();
        assert!(matches!(err, DbError::ProviderDisposed { .. }));
        let err = provider
            .list_tables(&NameSet::default(), &NameSet::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ProviderDisposed { .. }));

        // second dispose is harmless
        provider.dispose().await;
    }
}
