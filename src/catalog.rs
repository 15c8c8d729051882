//! Schema catalog: the `CREATE TABLE` document the model writes SQL against.

use crate::db::DatabaseProvider;
use crate::error::DbResult;
use crate::models::{CatalogFilters, SchemaDocument};
use tracing::{debug, instrument};

/// List the tables the filters allow and synthesize their DDL, one
/// statement per table in listing order.
#[instrument(skip_all, fields(provider = provider.name()))]
pub async fn build_schema_document<P>(provider: &P, filters: &CatalogFilters) -> DbResult<SchemaDocument>
where
    P: DatabaseProvider + ?Sized,
{
    let tables = provider
        .list_tables(&filters.included_tables, &filters.excluded_tables)
        .await?;
    let script = provider
        .synthesize_ddl(&tables, &filters.excluded_columns)
        .await?;
    let document = SchemaDocument::from_script(&script);

    debug!(
        tables = tables.len(),
        statements = document.len(),
        "Built schema document"
    );
    Ok(document)
}
