//! The `ask` tool: answer a natural-language question with SQL.
//!
//! Builds the schema document for the connection, runs the repair loop and
//! returns the rows together with every SQL candidate that was tried.

use crate::catalog::build_schema_document;
use crate::db::{ConnectionManager, DatabaseProvider};
use crate::error::{DbError, DbResult};
use crate::llm::ChatClient;
use crate::models::{CatalogFilters, ColumnMetadata, QueryAttempt, RowSet};
use crate::orchestrator::{RepairLoop, RepairOptions, RepairOutcome};
use crate::tools::format::{OutputFormat, format_rows};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Upper bound for a per-request `max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 10;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AskInput {
    /// Database connection ID from list_connections
    pub connection_id: String,
    /// The question to answer, in plain language
    pub question: String,
    /// Repair rounds after the first attempt. Default from server configuration, max: 10
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// "json" returns rows only; "table" or "markdown" also return a rendered table
    #[serde(default)]
    pub format: Option<OutputFormat>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct AskOutput {
    pub connection_id: String,
    /// The statement that produced the rows
    pub sql: String,
    /// Zero-based index of the successful attempt
    pub attempt_index: u32,
    /// Every candidate tried, in order, with its outcome
    pub attempts: Vec<QueryAttempt>,
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    /// Rendered rows when format is table or markdown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    /// True if the row limit cut the result short
    pub truncated: bool,
    pub row_count: usize,
    pub execution_time_ms: u64,
}

/// Server-wide inputs to every repair loop.
#[derive(Debug, Clone, Default)]
pub struct AskSettings {
    pub filters: Arc<CatalogFilters>,
    pub domain_hints: Vec<String>,
    pub repair: RepairOptions,
}

/// A successful repair loop.
#[derive(Debug)]
pub struct Answer {
    pub sql: String,
    pub rows: RowSet,
    pub attempts: Vec<QueryAttempt>,
}

impl Answer {
    pub fn attempt_index(&self) -> u32 {
        self.attempts.last().map(|a| a.attempt_index).unwrap_or_default()
    }
}

/// Build the schema document and run one repair loop. Cancellation becomes
/// `DbError::Cancelled` carrying the attempts made so far.
pub async fn answer_question<P, C>(
    provider: &P,
    client: &C,
    settings: &AskSettings,
    question: &str,
    max_retries: Option<u32>,
    cancel: &CancellationToken,
) -> DbResult<Answer>
where
    P: DatabaseProvider + ?Sized,
    C: ChatClient + ?Sized,
{
    let question = question.trim();
    if question.is_empty() {
        return Err(DbError::invalid_input("Question cannot be empty"));
    }

    let mut options = settings.repair;
    if let Some(max_retries) = max_retries {
        options.max_retries = max_retries.min(MAX_RETRIES_LIMIT);
    }

    let schema = build_schema_document(provider, &settings.filters).await?;
    if schema.is_empty() {
        return Err(DbError::invalid_input(
            "No tables are visible with the current table filters",
        ));
    }

    let outcome = RepairLoop::new(provider, client, options)
        .run(question, &schema, &settings.domain_hints, cancel)
        .await?;

    match outcome {
        RepairOutcome::Succeeded {
            rows,
            sql,
            attempts,
            ..
        } => Ok(Answer {
            sql,
            rows,
            attempts,
        }),
        RepairOutcome::Cancelled { attempts } => Err(DbError::Cancelled { attempts }),
    }
}

/// Handler for the `ask` tool.
pub struct AskToolHandler {
    connection_manager: Arc<ConnectionManager>,
    client: Arc<dyn ChatClient>,
    settings: Arc<AskSettings>,
}

impl AskToolHandler {
    pub fn new(
        connection_manager: Arc<ConnectionManager>,
        client: Arc<dyn ChatClient>,
        settings: Arc<AskSettings>,
    ) -> Self {
        Self {
            connection_manager,
            client,
            settings,
        }
    }

    pub async fn ask(&self, input: AskInput, cancel: CancellationToken) -> DbResult<AskOutput> {
        let provider = self.connection_manager.get(&input.connection_id).await?;
        let answer = answer_question(
            provider.as_ref(),
            self.client.as_ref(),
            &self.settings,
            &input.question,
            input.max_retries,
            &cancel,
        )
        .await?;

        info!(
            connection_id = %input.connection_id,
            attempts = answer.attempts.len(),
            rows = answer.rows.row_count(),
            "Answered question"
        );

        let formatted = match input.format {
            Some(format @ (OutputFormat::Table | OutputFormat::Markdown)) => {
                Some(format_rows(&answer.rows, format))
            }
            _ => None,
        };
        let attempt_index = answer.attempt_index();
        let Answer {
            sql,
            rows,
            attempts,
        } = answer;

        Ok(AskOutput {
            connection_id: input.connection_id,
            sql,
            attempt_index,
            attempts,
            row_count: rows.row_count(),
            columns: rows.columns,
            rows: rows.rows,
            formatted,
            truncated: rows.truncated,
            execution_time_ms: rows.execution_time_ms,
        })
    }
}
