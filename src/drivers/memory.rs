//! # In-process broker.
//!
//! [`MemoryBroker`] keeps an append-only log per topic (single partition `0`) and one
//! committed position per consumer group. [`MemoryDriver`] connects [`MemoryConsumer`]s
//! to it.
//!
//! ## Rules
//! - Offsets start at `0` and grow by one per published message.
//! - A poll returns at most `max_batch` messages and commits them for the group.
//! - Consumers of the same group and topic compete for messages.
//! - A poll with nothing to read waits up to `poll_timeout`, then returns empty.
//! - Connecting to a topic that was never created fails.
//! - `max.poll.records` on a binding overrides the driver's batch size.
//!
//! ## Example
//! ```rust
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use std::time::Duration;
//! use consumervisor::{Batch, Consumer, Driver, HandlerError, HandlerFn, ListenerBinding};
//! use consumervisor::{MemoryBroker, MemoryDriver};
//!
//! let broker = MemoryBroker::new();
//! broker.create_topic("payments");
//! broker.publish("payments", "first");
//!
//! let handler = HandlerFn::arc("noop", |_b: Batch| async { Ok::<_, HandlerError>(()) });
//! let binding = ListenerBinding::new("payments", "orders", handler);
//! let driver = MemoryDriver::new(broker.clone()).with_poll_timeout(Duration::from_millis(10));
//!
//! let mut consumer = driver.connect(&binding).unwrap();
//! let batch = consumer.poll().await.unwrap();
//! assert_eq!(batch.len(), 1);
//! assert_eq!(broker.lag("payments", "orders"), 0);
//! # }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::ConsumerError;
use crate::listener::{Consumer, Driver, ListenerBinding, Message};

const MAX_POLL_RECORDS: &str = "max.poll.records";

#[derive(Default)]
struct Topic {
    log: Vec<Message>,
    positions: HashMap<Arc<str>, usize>,
    faults: VecDeque<String>,
}

#[derive(Default)]
struct Shared {
    topics: Mutex<HashMap<Arc<str>, Topic>>,
    published: Notify,
}

/// In-process broker. Clones share the same topics.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    shared: Arc<Shared>,
}

impl MemoryBroker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn topics(&self) -> MutexGuard<'_, HashMap<Arc<str>, Topic>> {
        self.shared
            .topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates `topic` if it does not exist yet.
    pub fn create_topic(&self, topic: &str) {
        self.topics().entry(Arc::from(topic)).or_default();
    }

    /// True if `topic` was created (explicitly or by a publish).
    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics().contains_key(topic)
    }

    /// Appends a message and returns its offset. Creates the topic if needed.
    pub fn publish(&self, topic: &str, payload: impl Into<Bytes>) -> i64 {
        self.append(topic, None, payload.into())
    }

    /// Appends a keyed message and returns its offset. Creates the topic if needed.
    pub fn publish_keyed(
        &self,
        topic: &str,
        key: impl Into<Bytes>,
        payload: impl Into<Bytes>,
    ) -> i64 {
        self.append(topic, Some(key.into()), payload.into())
    }

    /// Makes the next poll on `topic` fail with `error`, whichever group polls it.
    pub fn inject_fault(&self, topic: &str, error: impl Into<String>) {
        self.topics()
            .entry(Arc::from(topic))
            .or_default()
            .faults
            .push_back(error.into());
    }

    /// Messages in `topic` not yet read by `group`.
    pub fn lag(&self, topic: &str, group: &str) -> usize {
        self.topics().get(topic).map_or(0, |t| {
            t.log.len() - t.positions.get(group).copied().unwrap_or(0)
        })
    }

    /// Number of messages ever published to `topic`.
    pub fn len(&self, topic: &str) -> usize {
        self.topics().get(topic).map_or(0, |t| t.log.len())
    }

    fn append(&self, topic: &str, key: Option<Bytes>, payload: Bytes) -> i64 {
        let offset = {
            let mut topics = self.topics();
            let name = topics
                .get_key_value(topic)
                .map_or_else(|| Arc::from(topic), |(name, _)| Arc::clone(name));
            let t = topics.entry(Arc::clone(&name)).or_default();
            let offset = t.log.len() as i64;
            let mut msg = Message::new(name, 0, offset, payload).with_timestamp(SystemTime::now());
            msg.key = key;
            t.log.push(msg);
            offset
        };
        self.shared.published.notify_waiters();
        offset
    }

    /// Takes up to `max` unread messages for `group`, committing them.
    fn take(
        &self,
        topic: &str,
        group: &Arc<str>,
        max: usize,
    ) -> Result<Vec<Message>, ConsumerError> {
        let mut topics = self.topics();
        let t = topics.get_mut(topic).ok_or_else(|| ConsumerError::Poll {
            error: format!("unknown topic {topic}"),
        })?;
        if let Some(error) = t.faults.pop_front() {
            return Err(ConsumerError::Poll { error });
        }
        let pos = t.positions.entry(Arc::clone(group)).or_insert(0);
        let end = pos.saturating_add(max).min(t.log.len());
        let batch = t.log[*pos..end].to_vec();
        *pos = end;
        Ok(batch)
    }
}

impl std::fmt::Debug for MemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let topics = self.topics();
        let mut names: Vec<_> = topics.keys().map(|k| k.as_ref()).collect();
        names.sort_unstable();
        f.debug_struct("MemoryBroker").field("topics", &names).finish()
    }
}

/// Connects [`MemoryConsumer`]s to a [`MemoryBroker`].
#[derive(Clone, Debug)]
pub struct MemoryDriver {
    broker: MemoryBroker,
    poll_timeout: Duration,
    max_batch: usize,
}

impl MemoryDriver {
    /// Driver with a 100ms poll timeout and batches of at most 100 messages.
    #[must_use]
    pub fn new(broker: MemoryBroker) -> Self {
        Self {
            broker,
            poll_timeout: Duration::from_millis(100),
            max_batch: 100,
        }
    }

    /// How long an empty poll waits for new messages.
    #[must_use]
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Upper bound on messages per poll (clamped to at least 1).
    #[must_use]
    pub fn with_max_batch(mut self, max: usize) -> Self {
        self.max_batch = max.max(1);
        self
    }

    pub fn broker(&self) -> &MemoryBroker {
        &self.broker
    }
}

impl Driver for MemoryDriver {
    fn connect(&self, binding: &ListenerBinding) -> Result<Box<dyn Consumer>, ConsumerError> {
        let topic = binding.topic();
        if !self.broker.has_topic(topic) {
            return Err(ConsumerError::Connect {
                error: format!("unknown topic {topic}"),
            });
        }
        let max_batch = match binding.property(MAX_POLL_RECORDS) {
            None => self.max_batch,
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConsumerError::Connect {
                        error: format!(
                            "{MAX_POLL_RECORDS} must be a positive integer, got {raw:?}"
                        ),
                    });
                }
            },
        };

        Ok(Box::new(MemoryConsumer {
            broker: self.broker.clone(),
            topic: Arc::clone(topic),
            group: Arc::clone(binding.group()),
            poll_timeout: self.poll_timeout,
            max_batch,
            closed: false,
        }))
    }
}

/// Consumer reading one topic for one group from a [`MemoryBroker`].
#[derive(Debug)]
pub struct MemoryConsumer {
    broker: MemoryBroker,
    topic: Arc<str>,
    group: Arc<str>,
    poll_timeout: Duration,
    max_batch: usize,
    closed: bool,
}

#[async_trait]
impl Consumer for MemoryConsumer {
    async fn poll(&mut self) -> Result<Vec<Message>, ConsumerError> {
        if self.closed {
            return Err(ConsumerError::Closed);
        }
        let deadline = Instant::now() + self.poll_timeout;
        loop {
            let published = self.broker.shared.published.notified();
            tokio::pin!(published);
            published.as_mut().enable();

            let batch = self.broker.take(&self.topic, &self.group, self.max_batch)?;
            if !batch.is_empty() {
                return Ok(batch);
            }
            if tokio::time::timeout_at(deadline, published).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn close(&mut self) -> Result<(), ConsumerError> {
        if std::mem::replace(&mut self.closed, true) {
            return Err(ConsumerError::Closed);
        }
        Ok(())
    }
}
