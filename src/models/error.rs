use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProgressionError {
    #[error("Invalid token amount: {0}")]
    InvalidAmount(String),

    #[error("Ledger error on {source_name}: {message}")]
    LedgerError { source_name: String, message: String },

    #[error("Ledger query timed out for {source_name}")]
    LedgerTimeout { source_name: String },

    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Unsupported profile record version {found} (expected <= {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

pub type Result<T> = std::result::Result<T, ProgressionError>;
