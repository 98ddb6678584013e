//! Message handler trait and the header-tag registry.
//!
//! The router never looks inside a record. It reads the `event-type` header,
//! asks the [`HandlerRegistry`] for the handler registered under that tag and
//! hands the record over. Tags nobody registered resolve to [`IgnoreHandler`],
//! so producers can start emitting new event types before this service knows
//! about them.
//!
//! # Example
//!
//! ```rust,ignore
//! use notifier_runtime::handlers::{HandlerRegistry, MessageHandler};
//!
//! let registry = HandlerRegistry::new()
//!     .register("auth.otp.generated", Arc::new(OtpEventHandler::new(delivery)));
//!
//! let handler = registry.resolve(message.header("event-type"));
//! handler.handle(&message).await?;
//! ```

use crate::metrics::ConsumerMetrics;
use async_trait::async_trait;
use notifier_core::message::InboundMessage;
use std::collections::HashMap;
use std::sync::Arc;

/// Error type returned by handlers.
///
/// The router logs it and moves on; it never stops the consumption loop.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Processes one inbound record.
///
/// Implementors should absorb per-message failures themselves (logging with
/// the record coordinates); an `Err` is treated as a bug-level signal and is
/// only logged by the router.
///
/// # Thread Safety
///
/// Implementors must be `Send + Sync + 'static` because handlers are shared
/// with the consumption task.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Handler name for logs.
    fn name(&self) -> &str;

    /// Handle a record.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures the handler chose not to absorb.
    async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError>;
}

/// Fallback for tags without a registered handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreHandler;

#[async_trait]
impl MessageHandler for IgnoreHandler {
    fn name(&self) -> &str {
        "ignore"
    }

    async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError> {
        ConsumerMetrics::record_ignored();
        tracing::debug!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            tag = message.header(notifier_core::EVENT_TYPE_HEADER).unwrap_or("<none>"),
            "No handler registered for message, skipping"
        );
        Ok(())
    }
}

/// Mapping from routing tag to handler.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
    fallback: Arc<dyn MessageHandler>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    /// Registry with no entries; every tag resolves to [`IgnoreHandler`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: Arc::new(IgnoreHandler),
        }
    }

    /// Register `handler` for `tag`, replacing any previous entry.
    #[must_use]
    pub fn register(mut self, tag: impl Into<String>, handler: Arc<dyn MessageHandler>) -> Self {
        let tag = tag.into();
        tracing::debug!(tag = %tag, handler = handler.name(), "Registered message handler");
        self.handlers.insert(tag, handler);
        self
    }

    /// Handler for `tag`, or the fallback when the tag is unknown or absent.
    #[must_use]
    pub fn resolve(&self, tag: Option<&str>) -> &Arc<dyn MessageHandler> {
        tag.and_then(|t| self.handlers.get(t))
            .unwrap_or(&self.fallback)
    }

    /// Whether `tag` has a registered handler.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.handlers.contains_key(tag)
    }

    /// Registered tags, unordered.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}
