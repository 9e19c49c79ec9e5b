//! Error types for voucher storage.

use voucher_core::LedgerError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Applying migrations failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// A stored row could not be decoded into a domain type.
    #[error("decode error: {0}")]
    Decode(String),

    /// A ledger rule rejected the operation. The transaction was rolled back.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl StoreError {
    /// The ledger error, if this is a rule violation rather than a storage fault.
    #[must_use]
    pub fn as_ledger(&self) -> Option<&LedgerError> {
        match self {
            Self::Ledger(err) => Some(err),
            _ => None,
        }
    }
}
