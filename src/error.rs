//! Error types for the NL-to-SQL server.
//!
//! This module defines all error types using `thiserror`. Only
//! [`DbError::QueryExecution`] is recoverable: it is the feedback signal the
//! repair loop folds back into the conversation. Everything else ends the
//! current request.

use crate::models::QueryAttempt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// The database cannot be reached (connect, I/O, TLS, pool failures).
    #[error("Database unavailable: {message}")]
    ProviderUnavailable { message: String, suggestion: String },

    /// The database rejected a candidate query.
    #[error("Query rejected: {driver_message}")]
    QueryExecution {
        driver_message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
    },

    #[error("Language model unavailable: {message}")]
    ModelUnavailable { message: String },

    #[error("No working query after {} attempts", .attempts.len())]
    RepairExhausted { attempts: Vec<QueryAttempt> },

    #[error("Request cancelled after {} attempts", .attempts.len())]
    Cancelled { attempts: Vec<QueryAttempt> },

    #[error("Provider '{provider}' has been disposed")]
    ProviderDisposed { provider: String },

    #[error("Connection not found: {connection_id}")]
    ConnectionNotFound { connection_id: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a provider-unavailable error with a helpful suggestion.
    pub fn provider_unavailable(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a query execution error with optional SQL state.
    pub fn query_execution(driver_message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::QueryExecution {
            driver_message: driver_message.into(),
            sql_state,
        }
    }

    pub fn model_unavailable(message: impl Into<String>) -> Self {
        Self::ModelUnavailable {
            message: message.into(),
        }
    }

    pub fn provider_disposed(provider: impl Into<String>) -> Self {
        Self::ProviderDisposed {
            provider: provider.into(),
        }
    }

    pub fn connection_not_found(connection_id: impl Into<String>) -> Self {
        Self::ConnectionNotFound {
            connection_id: connection_id.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::ProviderUnavailable { suggestion, .. } => Some(suggestion),
            Self::ModelUnavailable { .. } => {
                Some("Check the language model endpoint, model name and API key")
            }
            Self::RepairExhausted { .. } => {
                Some("Rephrase the question or add domain hints describing the relevant columns")
            }
            Self::ConnectionNotFound { .. } => {
                Some("Use list_connections to see the configured connection IDs")
            }
            _ => None,
        }
    }

    /// True when the error describes a bad query rather than broken infrastructure.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::QueryExecution { .. })
    }

    /// The attempt trail carried by terminal repair-loop errors.
    pub fn attempts(&self) -> Option<&[QueryAttempt]> {
        match self {
            Self::RepairExhausted { attempts } | Self::Cancelled { attempts } => Some(attempts),
            _ => None,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// Anything the server said about the statement itself is a
/// `QueryExecution`; transport and pool failures are `ProviderUnavailable`.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::provider_unavailable(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::query_execution(db_err.message(), code)
            }
            sqlx::Error::RowNotFound => DbError::query_execution("No rows returned", None),
            sqlx::Error::PoolTimedOut => DbError::provider_unavailable(
                "Timed out acquiring a connection from the pool",
                "Increase max_connections or acquire_timeout",
            ),
            sqlx::Error::PoolClosed => DbError::provider_unavailable(
                "Connection pool is closed",
                "Reconnect to the database",
            ),
            sqlx::Error::Io(io_err) => DbError::provider_unavailable(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::provider_unavailable(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::provider_unavailable(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::TypeNotFound { type_name } => {
                DbError::query_execution(format!("Type not found: {}", type_name), None)
            }
            sqlx::Error::ColumnNotFound(col) => {
                DbError::query_execution(format!("Column not found: {}", col), None)
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::query_execution(
                format!("Column index {} out of bounds (len: {})", index, len),
                None,
            ),
            sqlx::Error::ColumnDecode { index, source } => DbError::query_execution(
                format!("Failed to decode column {}: {}", index, source),
                None,
            ),
            sqlx::Error::Decode(source) => {
                DbError::query_execution(format!("Decode error: {}", source), None)
            }
            sqlx::Error::WorkerCrashed => DbError::provider_unavailable(
                "Database worker crashed",
                "Reconnect to the database",
            ),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Convert SQL Server driver errors to DbError.
impl From<tiberius::error::Error> for DbError {
    fn from(err: tiberius::error::Error) -> Self {
        use tiberius::error::Error as TdsError;
        match err {
            TdsError::Server(token) => {
                DbError::query_execution(token.message(), Some(token.code().to_string()))
            }
            TdsError::Io { message, .. } => DbError::provider_unavailable(
                format!("I/O error: {}", message),
                "Check network connectivity and database server status",
            ),
            TdsError::Tls(message) => DbError::provider_unavailable(
                format!("TLS error: {}", message),
                "Add TrustServerCertificate=true for self-signed certificates",
            ),
            TdsError::Routing { host, port } => DbError::provider_unavailable(
                format!("Server requested routing to {}:{}", host, port),
                "Connect to the routed host directly",
            ),
            TdsError::Protocol(message) => DbError::provider_unavailable(
                format!("Protocol error: {}", message),
                "Check database server compatibility",
            ),
            other => DbError::query_execution(other.to_string(), None),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

fn error_data(err: &DbError) -> Option<serde_json::Value> {
    let mut data = serde_json::Map::new();
    if let Some(suggestion) = err.suggestion() {
        data.insert("suggestion".into(), suggestion.into());
    }
    if let Some(attempts) = err.attempts() {
        if let Ok(value) = serde_json::to_value(attempts) {
            data.insert("attempts".into(), value);
        }
    }
    (!data.is_empty()).then_some(serde_json::Value::Object(data))
}

/// Convert DbError to MCP ErrorData for semantic error categorization.
/// Includes the suggestion and any attempt trail in the `data` object.
impl From<DbError> for rmcp::ErrorData {
    fn from(err: DbError) -> Self {
        let data = error_data(&err);
        match &err {
            DbError::InvalidInput { .. } => rmcp::ErrorData::invalid_params(err.to_string(), data),

            DbError::QueryExecution {
                driver_message,
                sql_state,
            } => {
                let msg = match sql_state {
                    Some(code) => format!("{} (SQLSTATE: {})", driver_message, code),
                    None => driver_message.clone(),
                };
                rmcp::ErrorData::invalid_params(msg, data)
            }

            DbError::ConnectionNotFound { .. } => {
                rmcp::ErrorData::resource_not_found(err.to_string(), data)
            }

            DbError::ProviderUnavailable { .. }
            | DbError::ModelUnavailable { .. }
            | DbError::RepairExhausted { .. }
            | DbError::Cancelled { .. }
            | DbError::ProviderDisposed { .. }
            | DbError::Internal { .. } => rmcp::ErrorData::internal_error(err.to_string(), data),
        }
    }
}
