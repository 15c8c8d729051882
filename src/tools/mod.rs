//! MCP tool implementations.
//!
//! - `schema`: `list_tables` and `describe_schema`
//! - `ask`: natural-language questions answered through the repair loop
//! - `format`: text rendering of row sets

pub mod ask;
pub mod format;
pub mod schema;

pub use ask::{AskInput, AskOutput, AskSettings, AskToolHandler, answer_question};
pub use format::{OutputFormat, format_rows};
pub use schema::{
    DescribeSchemaInput, DescribeSchemaOutput, ListTablesInput, ListTablesOutput,
    SchemaToolHandler,
};
