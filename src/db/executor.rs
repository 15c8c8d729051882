//! Query execution.
//!
//! Every statement runs under the configured timeout, and at most
//! `row_limit` rows are decoded. sqlx results are streamed so only
//! `row_limit + 1` rows are ever fetched; the extra row tells us whether the
//! result was cut short.

use crate::db::pool::DbPool;
use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::{DEFAULT_QUERY_TIMEOUT_SECS, DEFAULT_ROW_LIMIT, MAX_ROW_LIMIT, RowSet};
use futures_util::{Stream, StreamExt};
use sqlx::Executor;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs SQL against a pool with a timeout and row limit.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    query_timeout: Duration,
    row_limit: u32,
}

impl QueryExecutor {
    pub fn new(query_timeout: Duration, row_limit: u32) -> Self {
        Self {
            query_timeout,
            row_limit: row_limit.clamp(1, MAX_ROW_LIMIT),
        }
    }

    /// Execute one statement and decode its rows.
    pub async fn execute(&self, pool: &DbPool, sql: &str) -> DbResult<RowSet> {
        let start = Instant::now();
        let limit = self.row_limit as usize;

        debug!(
            sql = %sql,
            limit = self.row_limit,
            timeout_secs = self.query_timeout.as_secs(),
            "Executing query"
        );

        let result = match pool {
            DbPool::MySql(p) => self.collect(p.fetch(sql), start).await,
            DbPool::Postgres(p) => self.collect(p.fetch(sql), start).await,
            DbPool::SQLite(p) => self.collect(p.fetch(sql), start).await,
            DbPool::SqlServer(p) => match timeout(self.query_timeout, p.fetch_limited(sql, limit)).await {
                Ok(Ok((rows, truncated))) => Ok(row_set(&rows, truncated, start)),
                Ok(Err(e)) => Err(e),
                Err(_) => {
                    p.discard().await;
                    Err(self.timeout_error())
                }
            },
        }?;

        if result.truncated {
            warn!(limit = self.row_limit, "Query result truncated");
        }
        Ok(result)
    }

    async fn collect<R, S>(&self, stream: S, start: Instant) -> DbResult<RowSet>
    where
        R: RowToJson,
        S: Stream<Item = Result<R, sqlx::Error>>,
    {
        let fetch_limit = self.row_limit as usize + 1;
        let results = timeout(self.query_timeout, stream.take(fetch_limit).collect::<Vec<_>>())
            .await
            .map_err(|_| self.timeout_error())?;

        let mut rows = results
            .into_iter()
            .collect::<Result<Vec<R>, sqlx::Error>>()
            .map_err(DbError::from)?;

        let truncated = rows.len() > self.row_limit as usize;
        rows.truncate(self.row_limit as usize);
        Ok(row_set(&rows, truncated, start))
    }

    fn timeout_error(&self) -> DbError {
        DbError::query_execution(
            format!("Query exceeded {}s timeout", self.query_timeout.as_secs()),
            None,
        )
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS as u64),
            DEFAULT_ROW_LIMIT,
        )
    }
}

fn row_set<R: RowToJson>(rows: &[R], truncated: bool, start: Instant) -> RowSet {
    let execution_time_ms = start.elapsed().as_millis() as u64;
    let Some(first) = rows.first() else {
        return RowSet::empty(execution_time_ms);
    };

    RowSet {
        columns: first.column_metadata(),
        rows: rows.iter().map(RowToJson::to_json_map).collect(),
        truncated,
        execution_time_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_limit_is_clamped() {
        assert_eq!(QueryExecutor::new(Duration::from_secs(1), 0).row_limit, 1);
        assert_eq!(
            QueryExecutor::new(Duration::from_secs(1), MAX_ROW_LIMIT + 5).row_limit,
            MAX_ROW_LIMIT
        );
    }

    #[test]
    fn test_timeout_error_is_an_execution_failure() {
        let executor = QueryExecutor::new(Duration::from_secs(7), 10);
        let err = executor.timeout_error();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("7s timeout"));
    }
}
