//! # Messages and batches handed to the work wrapper.

use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;

/// One message pulled from a broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Topic the message was read from.
    pub topic: Arc<str>,
    /// Partition within the topic.
    pub partition: i32,
    /// Offset within the partition.
    pub offset: i64,
    /// Optional message key.
    pub key: Option<Bytes>,
    /// Raw payload; deserialization belongs to the handler.
    pub payload: Bytes,
    /// Broker or producer timestamp, when known.
    pub timestamp: Option<SystemTime>,
}

impl Message {
    /// Creates a message with no key and no timestamp.
    pub fn new(
        topic: impl Into<Arc<str>>,
        partition: i32,
        offset: i64,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            payload: payload.into(),
            timestamp: None,
        }
    }

    /// Attaches a key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attaches a timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, at: SystemTime) -> Self {
        self.timestamp = Some(at);
        self
    }
}

/// Messages from one `fetch`, together with where they came from.
///
/// Under `DispatchPolicy::PerMessage` every batch holds exactly one message.
#[derive(Clone, Debug)]
pub struct Batch {
    /// Topic of the binding.
    pub topic: Arc<str>,
    /// Consumer group of the binding.
    pub group: Arc<str>,
    /// Messages in poll order.
    pub messages: Vec<Message>,
}

impl Batch {
    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True for an empty poll.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Highest offset in the batch, if any.
    pub fn last_offset(&self) -> Option<i64> {
        self.messages.iter().map(|m| m.offset).max()
    }
}
