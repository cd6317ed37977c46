//! Unified error types for the network metrics processor.
//!
//! Error codes:
//! - STORE_001-003: Event store / metadata store errors
//! - CONFIG_001: Configuration errors

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Store error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    /// STORE_001: A read query failed
    QueryFailed,
    /// STORE_002: An insert, upsert or delete failed
    WriteFailed,
    /// STORE_003: Could not reach the store
    ConnectionFailed,
}

impl StoreErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::QueryFailed => "STORE_001",
            Self::WriteFailed => "STORE_002",
            Self::ConnectionFailed => "STORE_003",
        }
    }
}

/// Which backing store produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Analytical event store (ClickHouse).
    Events,
    /// Relational metadata store (Postgres).
    Metadata,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Events => "events",
            Self::Metadata => "metadata",
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the processor.
#[derive(Debug, Error)]
pub enum Error {
    /// Store error with code.
    #[error("[{code}] {store} store: {message}")]
    Store {
        code: &'static str,
        store: StoreKind,
        message: String,
    },

    #[error("[CONFIG_001] configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("sketch error: {0}")]
    Sketch(String),
}

impl Error {
    /// Create a store error.
    pub fn store(store: StoreKind, code: StoreErrorCode, msg: impl Into<String>) -> Self {
        Self::Store {
            code: code.code(),
            store,
            message: msg.into(),
        }
    }

    /// Shorthand for a failed read against the event store.
    pub fn events_query(msg: impl Into<String>) -> Self {
        Self::store(StoreKind::Events, StoreErrorCode::QueryFailed, msg)
    }

    /// Shorthand for a failed write against the event store.
    pub fn events_write(msg: impl Into<String>) -> Self {
        Self::store(StoreKind::Events, StoreErrorCode::WriteFailed, msg)
    }

    /// Shorthand for a failed read against the metadata store.
    pub fn metadata_query(msg: impl Into<String>) -> Self {
        Self::store(StoreKind::Metadata, StoreErrorCode::QueryFailed, msg)
    }

    /// Shorthand for a failed write against the metadata store.
    pub fn metadata_write(msg: impl Into<String>) -> Self {
        Self::store(StoreKind::Metadata, StoreErrorCode::WriteFailed, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn sketch(msg: impl Into<String>) -> Self {
        Self::Sketch(msg.into())
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Store { code, .. } => Some(*code),
            Self::Config(_) => Some("CONFIG_001"),
            _ => None,
        }
    }
}
