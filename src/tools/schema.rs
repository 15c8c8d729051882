//! Schema tools: `list_tables` and `describe_schema`.
//!
//! Both apply the configured catalog filters, so they show exactly the part
//! of the database the model gets to see.

use crate::catalog::build_schema_document;
use crate::db::{ConnectionManager, DatabaseProvider};
use crate::error::DbResult;
use crate::models::{CatalogFilters, TableIdentifier};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    /// Database connection ID from list_connections
    pub connection_id: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListTablesOutput {
    pub tables: Vec<TableIdentifier>,
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeSchemaInput {
    /// Database connection ID from list_connections
    pub connection_id: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DescribeSchemaOutput {
    pub connection_id: String,
    /// SQL dialect the statements are written in
    pub dialect: String,
    /// The full schema document, one CREATE TABLE statement per line
    pub ddl: String,
    pub statements: Vec<String>,
    pub table_count: usize,
}

/// Handler for schema tools.
pub struct SchemaToolHandler {
    connection_manager: Arc<ConnectionManager>,
    filters: Arc<CatalogFilters>,
}

impl SchemaToolHandler {
    pub fn new(connection_manager: Arc<ConnectionManager>, filters: Arc<CatalogFilters>) -> Self {
        Self {
            connection_manager,
            filters,
        }
    }

    pub async fn list_tables(&self, input: ListTablesInput) -> DbResult<ListTablesOutput> {
        let provider = self.connection_manager.get(&input.connection_id).await?;
        let tables = provider
            .list_tables(&self.filters.included_tables, &self.filters.excluded_tables)
            .await?;
        let count = tables.len();

        info!(connection_id = %input.connection_id, count, "Listed tables");
        Ok(ListTablesOutput { tables, count })
    }

    pub async fn describe_schema(&self, input: DescribeSchemaInput) -> DbResult<DescribeSchemaOutput> {
        let provider = self.connection_manager.get(&input.connection_id).await?;
        let document = build_schema_document(provider.as_ref(), &self.filters).await?;

        info!(
            connection_id = %input.connection_id,
            tables = document.len(),
            "Described schema"
        );

        Ok(DescribeSchemaOutput {
            connection_id: input.connection_id,
            dialect: provider.dialect_label().to_string(),
            ddl: document.render(),
            table_count: document.len(),
            statements: document.statements,
        })
    }
}
