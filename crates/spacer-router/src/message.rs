//! Messages crossing the broker boundary.
//!
//! [`Message`] is what the write proxy hands to the producer bridge,
//! [`InboundMessage`] is a detached copy of a consumed record, and
//! [`DeliveryAck`] is the producer's per-message delivery report.

use bytes::Bytes;

/// An outbound message addressed to a broker topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Destination topic.
    pub topic: String,
    /// Message key.
    pub key: Bytes,
    /// Message value.
    pub value: Bytes,
    /// Explicit partition, or `None` for the broker's default partitioner.
    pub partition: Option<i32>,
}

impl Message {
    /// Creates a message for the default partition.
    #[must_use]
    pub fn new(topic: impl Into<String>, key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            key: key.into(),
            value: value.into(),
            partition: None,
        }
    }
}

/// A consumed record, detached from the broker client's buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Source topic.
    pub topic: String,
    /// Source partition.
    pub partition: i32,
    /// Offset assigned by the broker.
    pub offset: i64,
    /// Record key, if any.
    pub key: Option<Bytes>,
    /// Record value, if any.
    pub value: Option<Bytes>,
}

impl InboundMessage {
    /// Returns the value forwarded to handlers. A missing value is an empty body.
    #[must_use]
    pub fn payload(&self) -> Bytes {
        self.value.clone().unwrap_or_default()
    }

    /// Offset to commit once this message is handled (the next one to read).
    #[must_use]
    pub fn commit_offset(&self) -> i64 {
        self.offset + 1
    }
}

/// Delivery report for one produced message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAck {
    /// Topic the message was produced to.
    pub topic: String,
    /// Partition the broker placed it in.
    pub partition: i32,
    /// Offset assigned by the broker (meaningless on failure).
    pub offset: i64,
    /// Broker error, if delivery failed.
    pub error: Option<String>,
}

impl DeliveryAck {
    /// A successful delivery.
    #[must_use]
    pub fn delivered(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            error: None,
        }
    }

    /// A failed delivery.
    #[must_use]
    pub fn failed(topic: impl Into<String>, partition: i32, error: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset: -1,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_defaults_to_any_partition() {
        let msg = Message::new("PoESocial_stat", "a", "1");
        assert_eq!(msg.partition, None);
    }

    #[test]
    fn test_missing_value_is_empty_payload() {
        let msg = InboundMessage {
            topic: "PoESocial_stat".into(),
            partition: 0,
            offset: 41,
            key: None,
            value: None,
        };
        assert!(msg.payload().is_empty());
        assert_eq!(msg.commit_offset(), 42);
    }

    #[test]
    fn test_delivery_ack() {
        assert!(DeliveryAck::delivered("t", 0, 7).error.is_none());
        let failed = DeliveryAck::failed("t", -1, "broker down");
        assert_eq!(failed.error.as_deref(), Some("broker down"));
        assert_eq!(failed.offset, -1);
    }
}
