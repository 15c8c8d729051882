//! Integration tests for table filtering and schema document synthesis
//! against a file-backed SQLite database.

use db_nl2sql_server::catalog::build_schema_document;
use db_nl2sql_server::config::PoolOptions;
use db_nl2sql_server::db::{ConnectionManager, DatabaseProvider};
use db_nl2sql_server::error::DbError;
use db_nl2sql_server::models::{
    CatalogFilters, ColumnExclusions, ConnectionConfig, NameSet, TableIdentifier,
};
use db_nl2sql_server::tools::schema::{
    DescribeSchemaInput, ListTablesInput, SchemaToolHandler,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::sync::Arc;
use tempfile::TempDir;

/// Create four tables and register the file as a read-only connection
/// named `shop`.
async fn setup_shop() -> (TempDir, Arc<ConnectionManager>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.db");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(&path)
                .create_if_missing(true),
        )
        .await
        .unwrap();
    for sql in [
        "CREATE TABLE Audit (id INTEGER NOT NULL, actor TEXT, ssn TEXT)",
        "CREATE TABLE Customers (id INTEGER NOT NULL, name VARCHAR(80) NOT NULL, ssn TEXT)",
        "CREATE TABLE Orders (id INTEGER NOT NULL, customer_id INTEGER NOT NULL, total NUMERIC(10, 2))",
        "CREATE TABLE Secrets (ssn TEXT)",
    ] {
        sqlx::query(sql).execute(&pool).await.unwrap();
    }
    pool.close().await;

    let manager = Arc::new(ConnectionManager::default());
    let config = ConnectionConfig::new(
        "shop",
        format!("sqlite:{}", path.display()),
        false,
        None,
        PoolOptions::default(),
    )
    .unwrap();
    manager.connect(config).await.unwrap();
    (dir, manager)
}

fn names(tables: &[TableIdentifier]) -> Vec<String> {
    tables.iter().map(|t| t.qualified_name()).collect()
}

#[tokio::test]
async fn test_excluded_table_is_not_listed() {
    let (_dir, manager) = setup_shop().await;
    let provider = manager.get("shop").await.unwrap();

    let tables = provider
        .list_tables(&NameSet::default(), &NameSet::new(["main.Audit"]))
        .await
        .unwrap();

    assert_eq!(
        names(&tables),
        vec!["main.Customers", "main.Orders", "main.Secrets"]
    );
}

#[tokio::test]
async fn test_inclusion_takes_precedence_over_exclusion() {
    let (_dir, manager) = setup_shop().await;
    let provider = manager.get("shop").await.unwrap();

    let tables = provider
        .list_tables(
            &NameSet::new(["orders", "MAIN.AUDIT"]),
            &NameSet::new(["main.Audit", "Orders"]),
        )
        .await
        .unwrap();

    assert_eq!(names(&tables), vec!["main.Audit", "main.Orders"]);
}

#[tokio::test]
async fn test_bare_column_exclusion_applies_to_every_table() {
    let (_dir, manager) = setup_shop().await;
    let provider = manager.get("shop").await.unwrap();

    let tables = provider
        .list_tables(&NameSet::default(), &NameSet::default())
        .await
        .unwrap();
    let ddl = provider
        .synthesize_ddl(&tables, &ColumnExclusions::new(["SSN"]))
        .await
        .unwrap();

    assert!(!ddl.contains(r#""ssn""#));
    assert!(ddl.contains(r#""actor" TEXT NULL"#));
    assert!(ddl.contains(r#""name" VARCHAR(80) NOT NULL"#));
    // a table with nothing left to describe is dropped
    assert!(!ddl.contains("Secrets"));
    assert_eq!(ddl.lines().count(), 3);
}

#[tokio::test]
async fn test_schema_document_follows_filters() {
    let (_dir, manager) = setup_shop().await;
    let provider = manager.get("shop").await.unwrap();
    let filters = CatalogFilters::new(&[] as &[&str], &["Audit", "Secrets"], &["customers.ssn"]);

    let document = build_schema_document(provider.as_ref(), &filters)
        .await
        .unwrap();

    assert_eq!(document.len(), 2);
    assert_eq!(
        document.statements[0],
        r#"CREATE TABLE "main"."Customers" ("id" INTEGER NOT NULL, "name" VARCHAR(80) NOT NULL);"#
    );
    assert!(document.statements[1].starts_with(r#"CREATE TABLE "main"."Orders""#));
    assert!(document.statements[1].contains(r#""total" NUMERIC NULL"#));
}

#[tokio::test]
async fn test_unknown_table_is_skipped() {
    let (_dir, manager) = setup_shop().await;
    let provider = manager.get("shop").await.unwrap();

    let ddl = provider
        .synthesize_ddl(
            &[
                TableIdentifier::new("main", "Vanished"),
                TableIdentifier::new("main", "Secrets"),
            ],
            &ColumnExclusions::default(),
        )
        .await
        .unwrap();

    assert_eq!(ddl, r#"CREATE TABLE "main"."Secrets" ("ssn" TEXT NULL);"#);
}

#[tokio::test]
async fn test_schema_tools() {
    let (_dir, manager) = setup_shop().await;
    let filters = Arc::new(CatalogFilters::new(
        &["Orders", "Customers"],
        &[] as &[&str],
        &["ssn"],
    ));
    let handler = SchemaToolHandler::new(manager.clone(), filters);

    let listed = handler
        .list_tables(ListTablesInput {
            connection_id: "shop".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(listed.count, 2);

    let described = handler
        .describe_schema(DescribeSchemaInput {
            connection_id: "shop".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(described.table_count, 2);
    assert_eq!(described.dialect, "SQLite SQL");
    assert_eq!(described.ddl, described.statements.join("\n"));

    let err = handler
        .list_tables(ListTablesInput {
            connection_id: "missing".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::ConnectionNotFound { .. }));
}

#[tokio::test]
async fn test_closed_connections_are_disposed() {
    let (_dir, manager) = setup_shop().await;
    let provider = manager.get("shop").await.unwrap();

    manager.close_all().await;

    assert!(provider.is_disposed().await);
    assert_eq!(manager.connection_count().await, 0);
    let err = provider.execute("SELECT 1").await.unwrap_err();
    assert!(matches!(err, DbError::ProviderDisposed { .. }));
    assert!(matches!(
        manager.get("shop").await.unwrap_err(),
        DbError::ConnectionNotFound { .. }
    ));
}
