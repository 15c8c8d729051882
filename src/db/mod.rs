//! Database access layer.
//!
//! - Connection pools and the connection manager
//! - Query execution with timeouts and row limits
//! - Schema introspection and dialect-specific rendering
//! - Row decoding
//! - The [`DatabaseProvider`] capability trait

pub mod dialect;
pub mod executor;
pub mod mssql;
pub mod pool;
pub mod provider;
pub mod schema;
pub mod types;

pub use executor::QueryExecutor;
pub use pool::{ConnectionManager, DbPool};
pub use provider::{DatabaseProvider, Provider, ProviderSettings};
pub use schema::SchemaInspector;
