//! Delivery error types.

use thiserror::Error;

/// Result type for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Errors raised while composing or sending an email.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// A sender or recipient address did not parse.
    #[error("Invalid address {address:?}: {reason}")]
    InvalidAddress {
        /// The rejected address
        address: String,
        /// Parser message
        reason: String,
    },

    /// The MIME message could not be assembled.
    #[error("Failed to build email: {0}")]
    Build(String),

    /// The transport could not be configured or reached.
    #[error("SMTP transport error: {0}")]
    Transport(String),

    /// The relay rejected the message or the session failed mid-send.
    #[error("Failed to send email: {0}")]
    Send(String),
}
