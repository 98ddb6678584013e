//! Delivery backend trait.

use crate::error::Result;
use std::future::Future;

/// A fully rendered email, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// HTML alternative
    pub html: String,
    /// Plain-text alternative
    pub text: String,
}

/// What the relay said when it accepted a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// First line of the relay's final response, typically carrying a queue id
    pub message_id: String,
}

/// Email delivery backend.
///
/// This trait abstracts over the mail transport so the delivery service can
/// be exercised without a relay.
pub trait DeliveryBackend: Send + Sync {
    /// Send one email.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - An address is invalid
    /// - The relay cannot be reached
    /// - The relay rejects the message
    fn send(&self, email: &OutboundEmail) -> impl Future<Output = Result<DeliveryReceipt>> + Send;

    /// Check that the relay accepts connections without sending anything.
    ///
    /// # Errors
    ///
    /// Returns error if the relay cannot be reached or refuses the session.
    fn verify(&self) -> impl Future<Output = Result<()>> + Send;
}
