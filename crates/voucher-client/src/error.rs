//! Client error types.

/// Errors that can occur when using the voucher ledger client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// The Link does not hold enough vouchers.
    #[error("insufficient stock: available={available}, requested={requested}")]
    InsufficientStock {
        /// Vouchers held.
        available: i64,
        /// Vouchers asked for.
        requested: i64,
    },

    /// A referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The ledger state does not allow the operation.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// The request was malformed or violated a domain rule.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or rejected credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// The caller may not perform the operation.
    #[error("forbidden")]
    Forbidden,

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}
