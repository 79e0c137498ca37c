//! Error types for snapshot operations
//!
//! Every data-access failure raised while a snapshot runs is surfaced as a
//! single fatal [`SnapshotError`]. Cancellation is not an error; it is reported
//! through [`SnapshotResult::Aborted`](crate::snapshot::SnapshotResult).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error categories for metrics and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Lock acquisition failed or timed out
    Locking,
    /// Position marker or metadata could not be read
    Metadata,
    /// Generic driver/query failure
    Database,
    /// Transaction or tenant session handling
    Session,
    /// Delivery of schema change events
    Delivery,
    /// Configuration errors (invalid settings)
    Configuration,
    /// Serialization and offset storage
    Storage,
}

/// Snapshot-phase errors
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// The store refused or timed out an exclusive table lock
    #[error("Failed to lock table {table}: {message}")]
    LockAcquisition { table: String, message: String },

    /// The store returned no change counter
    #[error("Position marker unavailable: {0}")]
    PositionUnavailable(String),

    /// Table definition could not be extracted or modelled
    #[error("Metadata unavailable for {table}: {message}")]
    MetadataUnavailable { table: String, message: String },

    /// Query execution failed
    #[error("Query error: {0}")]
    Query(String),

    /// Transaction begin/rollback failed
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Schema history rejected an event
    #[error("Schema history error: {0}")]
    SchemaHistory(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// PostgreSQL driver error
    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
}

impl SnapshotError {
    /// Create a lock acquisition error
    pub fn lock(table: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::LockAcquisition {
            table: table.into(),
            message: msg.into(),
        }
    }

    /// Create a position unavailable error
    pub fn position_unavailable(msg: impl Into<String>) -> Self {
        Self::PositionUnavailable(msg.into())
    }

    /// Create a metadata unavailable error
    pub fn metadata(table: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::MetadataUnavailable {
            table: table.into(),
            message: msg.into(),
        }
    }

    /// Create a query error
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Create a transaction error
    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    /// Create a schema history error
    pub fn schema_history(msg: impl Into<String>) -> Self {
        Self::SchemaHistory(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Check if re-running the whole snapshot may succeed.
    ///
    /// Informational only: the snapshot phase never retries internally, the
    /// connector's run controller decides whether to restart.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::LockAcquisition { message, .. } => {
                let msg = message.to_lowercase();
                msg.contains("timeout") || msg.contains("deadlock") || msg.contains("busy")
            }
            Self::Transaction(_) | Self::Query(_) => true,
            Self::Io(e) => {
                use std::io::ErrorKind;
                matches!(
                    e.kind(),
                    ErrorKind::ConnectionReset
                        | ErrorKind::ConnectionAborted
                        | ErrorKind::TimedOut
                        | ErrorKind::Interrupted
                )
            }
            #[cfg(feature = "postgres")]
            Self::Postgres(e) => e.is_closed(),
            Self::PositionUnavailable(_)
            | Self::MetadataUnavailable { .. }
            | Self::SchemaHistory(_)
            | Self::Config(_)
            | Self::Serialization(_)
            | Self::Json(_) => false,
        }
    }

    /// Get the error category for metrics and alerting.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::LockAcquisition { .. } => ErrorCategory::Locking,
            Self::PositionUnavailable(_) => ErrorCategory::Metadata,
            Self::MetadataUnavailable { .. } => ErrorCategory::Metadata,
            Self::Query(_) => ErrorCategory::Database,
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => ErrorCategory::Database,
            Self::Transaction(_) => ErrorCategory::Session,
            Self::SchemaHistory(_) => ErrorCategory::Delivery,
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Storage,
            Self::Json(_) => ErrorCategory::Storage,
            Self::Io(_) => ErrorCategory::Storage,
        }
    }

    /// Get a metric-safe error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::LockAcquisition { .. } => "lock_acquisition",
            Self::PositionUnavailable(_) => "position_unavailable",
            Self::MetadataUnavailable { .. } => "metadata_unavailable",
            Self::Query(_) => "query_error",
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => "postgres_error",
            Self::Transaction(_) => "transaction_error",
            Self::SchemaHistory(_) => "schema_history_error",
            Self::Config(_) => "config_error",
            Self::Serialization(_) => "serialization_error",
            Self::Json(_) => "json_error",
            Self::Io(_) => "io_error",
        }
    }
}

/// Result type for snapshot operations
pub type Result<T> = std::result::Result<T, SnapshotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SnapshotError::lock("INVENTORY.ORDERS", "ORA-00054: resource busy");
        assert!(err.to_string().contains("INVENTORY.ORDERS"));
        assert!(err.to_string().contains("resource busy"));

        let err = SnapshotError::position_unavailable("empty result");
        assert_eq!(err.to_string(), "Position marker unavailable: empty result");
    }

    #[test]
    fn test_error_category() {
        assert_eq!(SnapshotError::lock("t", "x").category(), ErrorCategory::Locking);
        assert_eq!(
            SnapshotError::metadata("t", "x").category(),
            ErrorCategory::Metadata
        );
        assert_eq!(
            SnapshotError::position_unavailable("x").category(),
            ErrorCategory::Metadata
        );
        assert_eq!(
            SnapshotError::transaction("x").category(),
            ErrorCategory::Session
        );
        assert_eq!(
            SnapshotError::config("x").category(),
            ErrorCategory::Configuration
        );
    }

    #[test]
    fn test_error_is_retriable() {
        assert!(SnapshotError::lock("t", "lock timeout exceeded").is_retriable());
        assert!(SnapshotError::lock("t", "ORA-00054: resource busy").is_retriable());
        assert!(!SnapshotError::lock("t", "permission denied").is_retriable());
        assert!(SnapshotError::query("connection reset").is_retriable());

        assert!(!SnapshotError::metadata("t", "no ddl").is_retriable());
        assert!(!SnapshotError::config("bad").is_retriable());
    }

    #[test]
    fn test_error_code() {
        assert_eq!(SnapshotError::lock("t", "x").error_code(), "lock_acquisition");
        assert_eq!(
            SnapshotError::schema_history("x").error_code(),
            "schema_history_error"
        );
        assert_eq!(SnapshotError::config("x").error_code(), "config_error");
    }
}
