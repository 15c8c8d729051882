//! DB NL2SQL Server Library
//!
//! Answers plain-language questions about SQL databases (PostgreSQL, MySQL,
//! SQLite, SQL Server) by generating SQL with a language model, running it,
//! and repairing it from the database's own error messages.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod mcp;
pub mod models;
pub mod orchestrator;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::DbError;
pub use mcp::Nl2SqlService;
