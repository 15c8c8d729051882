//! Data models for the NL-to-SQL server.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod conversation;
pub mod query;
pub mod schema;

pub use connection::{ConnectionConfig, ConnectionConfigError, ConnectionInfo, DatabaseType};
pub use conversation::{Conversation, Role, Turn};
pub use query::{
    AttemptOutcome, ColumnMetadata, DEFAULT_MAX_RETRIES, DEFAULT_QUERY_TIMEOUT_SECS,
    DEFAULT_ROW_LIMIT, MAX_QUERY_TIMEOUT_SECS, MAX_ROW_LIMIT, QueryAttempt, RowSet,
};
pub use schema::{
    CatalogFilters, ColumnDescriptor, ColumnExclusions, NameSet, SchemaDocument, TableIdentifier,
    filter_tables,
};
