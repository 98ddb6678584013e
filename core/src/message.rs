//! Owned inbound broker records.
//!
//! The Kafka client hands out borrowed messages tied to the consumer's
//! lifetime. The consumer adapter detaches each one into an
//! [`InboundMessage`] so it can cross task boundaries and be handed to
//! handlers, and so tests can build records without a broker.

use std::collections::HashMap;

/// A record read from a topic partition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the record was read from
    pub topic: String,
    /// Partition within the topic
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
    /// Record key, if any
    pub key: Option<Vec<u8>>,
    /// Transport headers with UTF-8 values
    pub headers: HashMap<String, String>,
    /// Record value; `None` for tombstones
    pub payload: Option<Vec<u8>>,
}

impl InboundMessage {
    /// Create a record at the given coordinates with no headers, key, or value.
    #[must_use]
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            ..Self::default()
        }
    }

    /// Attach a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Attach a value.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Attach a key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Look up a header value.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// The record value, treating an empty value like an absent one.
    #[must_use]
    pub fn value(&self) -> Option<&[u8]> {
        self.payload.as_deref().filter(|bytes| !bytes.is_empty())
    }

    /// Key rendered lossily for logs.
    #[must_use]
    pub fn key_lossy(&self) -> Option<String> {
        self.key
            .as_deref()
            .map(|k| String::from_utf8_lossy(k).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_value_is_treated_as_absent() {
        let message = InboundMessage::new("auth-events", 0, 1).with_payload(Vec::new());
        assert!(message.value().is_none());

        let tombstone = InboundMessage::new("auth-events", 0, 2);
        assert!(tombstone.value().is_none());
    }

    #[test]
    fn header_lookup() {
        let message = InboundMessage::new("auth-events", 2, 7)
            .with_header("event-type", "auth.otp.generated")
            .with_key("user-1");

        assert_eq!(message.header("event-type"), Some("auth.otp.generated"));
        assert_eq!(message.header("missing"), None);
        assert_eq!(message.key_lossy().as_deref(), Some("user-1"));
    }
}
