//! The generate → execute → repair loop.
//!
//! A question is answered by asking the model for SQL, running it, and on a
//! database rejection feeding the failed statement and the engine's error
//! back into the same conversation. The loop stops at the first statement
//! that runs, or once the retry budget is spent.

mod extract;
mod prompt;

pub use extract::extract_sql;
pub use prompt::{NO_QUERY_PRODUCED, build_system_prompt, retry_message};

use crate::db::DatabaseProvider;
use crate::error::{DbError, DbResult};
use crate::llm::ChatClient;
use crate::models::{
    Conversation, DEFAULT_MAX_RETRIES, QueryAttempt, RowSet, SchemaDocument, Turn,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairOptions {
    /// Repair rounds after the first attempt; 0 means a single attempt.
    pub max_retries: u32,
    /// Treat language-model failures as failed attempts instead of
    /// surfacing them immediately.
    pub retry_model_errors: bool,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_model_errors: false,
        }
    }
}

/// How a repair loop ended, short of an error.
#[derive(Debug)]
pub enum RepairOutcome {
    Succeeded {
        rows: RowSet,
        sql: String,
        attempts: Vec<QueryAttempt>,
        conversation: Conversation,
    },
    Cancelled {
        attempts: Vec<QueryAttempt>,
    },
}

impl RepairOutcome {
    pub fn attempts(&self) -> &[QueryAttempt] {
        match self {
            Self::Succeeded { attempts, .. } | Self::Cancelled { attempts } => attempts,
        }
    }
}

enum LoopState {
    Drafting,
    Executing {
        completion: String,
        sql: String,
    },
    Retrying {
        attempt: QueryAttempt,
        /// The model's reply, absent when the model call itself failed.
        completion: Option<String>,
    },
}

/// One repair loop over a provider and a chat client.
pub struct RepairLoop<'a, P: ?Sized, C: ?Sized> {
    provider: &'a P,
    client: &'a C,
    options: RepairOptions,
}

impl<'a, P, C> RepairLoop<'a, P, C>
where
    P: DatabaseProvider + ?Sized,
    C: ChatClient + ?Sized,
{
    pub fn new(provider: &'a P, client: &'a C, options: RepairOptions) -> Self {
        Self {
            provider,
            client,
            options,
        }
    }

    /// Answer `question` against `schema`.
    ///
    /// Database rejections are folded back into the conversation. Provider
    /// failures, model failures (unless `retry_model_errors`) and an
    /// exhausted budget end the loop with an error.
    #[instrument(
        skip_all,
        fields(run_id = %Uuid::new_v4(), provider = self.provider.name(), max_retries = self.options.max_retries)
    )]
    pub async fn run(
        &self,
        question: &str,
        schema: &SchemaDocument,
        domain_hints: &[String],
        cancel: &CancellationToken,
    ) -> DbResult<RepairOutcome> {
        let mut attempts: Vec<QueryAttempt> = Vec::new();
        let mut conversation = Conversation::new()
            .appended(Turn::system(build_system_prompt(
                self.provider,
                schema,
                domain_hints,
            )))
            .appended(Turn::user(question));
        let mut state = LoopState::Drafting;

        info!(tables = schema.len(), "Starting repair loop");

        loop {
            let attempt_index = attempts.len() as u32;

            state = match state {
                LoopState::Drafting => {
                    if cancel.is_cancelled() {
                        return Ok(cancelled(attempts));
                    }

                    let completion = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Ok(cancelled(attempts)),
                        result = self.client.complete(&conversation) => result,
                    };

                    match completion {
                        Ok(completion) => match extract_sql(&completion) {
                            Some(sql) => LoopState::Executing {
                                sql: self.provider.normalize_query(&sql),
                                completion,
                            },
                            None => {
                                warn!(attempt_index, "Completion contained no SQL");
                                LoopState::Retrying {
                                    attempt: QueryAttempt::pending("", attempt_index)
                                        .failed(NO_QUERY_PRODUCED),
                                    completion: Some(completion),
                                }
                            }
                        },
                        Err(e) if self.options.retry_model_errors => {
                            warn!(attempt_index, error = %e, "Language model call failed");
                            LoopState::Retrying {
                                attempt: QueryAttempt::pending("", attempt_index)
                                    .failed(e.to_string()),
                                completion: None,
                            }
                        }
                        Err(e) => return Err(DbError::model_unavailable(e.to_string())),
                    }
                }

                LoopState::Executing { completion, sql } => {
                    if cancel.is_cancelled() {
                        return Ok(cancelled(attempts));
                    }

                    debug!(attempt_index, sql = %sql, "Executing candidate");
                    let attempt = QueryAttempt::pending(sql.clone(), attempt_index);

                    match self.provider.execute(&sql).await {
                        Ok(rows) => {
                            info!(
                                attempt_index,
                                rows = rows.row_count(),
                                "Candidate query succeeded"
                            );
                            attempts.push(attempt.succeeded());
                            return Ok(RepairOutcome::Succeeded {
                                rows,
                                sql,
                                attempts,
                                conversation: conversation.appended(Turn::assistant(completion)),
                            });
                        }
                        Err(DbError::QueryExecution { driver_message, .. }) => {
                            warn!(attempt_index, error = %driver_message, "Candidate query rejected");
                            LoopState::Retrying {
                                attempt: attempt.failed(driver_message),
                                completion: Some(completion),
                            }
                        }
                        Err(e) => return Err(e),
                    }
                }

                LoopState::Retrying {
                    attempt,
                    completion,
                } => {
                    let feedback = retry_message(&attempt.sql, attempt.error().unwrap_or_default());
                    attempts.push(attempt);

                    if attempts.len() as u32 > self.options.max_retries {
                        warn!(attempts = attempts.len(), "Retry budget exhausted");
                        return Err(DbError::RepairExhausted { attempts });
                    }

                    if let Some(completion) = completion {
                        conversation = conversation
                            .appended(Turn::assistant(completion))
                            .appended(Turn::user(feedback));
                    }
                    LoopState::Drafting
                }
            };
        }
    }
}

fn cancelled(attempts: Vec<QueryAttempt>) -> RepairOutcome {
    info!(attempts = attempts.len(), "Repair loop cancelled");
    RepairOutcome::Cancelled { attempts }
}
