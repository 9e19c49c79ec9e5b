//! Error types for the voucher ledger.

use crate::ids::IdError;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur in ledger operations.
///
/// The variants follow one taxonomy: malformed input, a missing entity, a
/// state conflict, or an unexpected internal failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Malformed, missing or out-of-range input. Raised before any write.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity that was looked up.
        entity: &'static str,
        /// The key that was not found.
        id: String,
    },

    /// Not enough stock left for a sale.
    #[error("insufficient stock: available={available}, requested={requested}")]
    InsufficientStock {
        /// Remaining stock on the row.
        available: i64,
        /// Quantity the sale asked for.
        requested: i64,
    },

    /// The current state does not allow the operation.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// Unexpected failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Shorthand for [`LedgerError::InvalidArgument`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Shorthand for [`LedgerError::FailedPrecondition`].
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::FailedPrecondition(message.into())
    }

    /// Shorthand for [`LedgerError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<IdError> for LedgerError {
    fn from(err: IdError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}
