//! MCP server integration module.

pub mod service;

pub use service::Nl2SqlService;
