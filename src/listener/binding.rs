//! # Listener bindings.
//!
//! A [`ListenerBinding`] describes one consumption target: broker addresses, topic,
//! consumer group, client properties, dispatch policy and the processing entry point.
//! It is immutable once built; builder methods consume and return it.
//!
//! ## Validation
//! [`ListenerBinding::validate`] runs before any consumer is created:
//! - topic: 1..=249 characters from `[A-Za-z0-9._-]`, not `.` or `..`
//! - group: non-empty, no whitespace or control characters
//! - brokers: at least one, each `host:port` with a non-empty host and a non-zero port
//!
//! ## Example
//! ```rust
//! use consumervisor::{Batch, DispatchPolicy, HandlerError, HandlerFn, ListenerBinding};
//!
//! let handler = HandlerFn::arc("payments", |_batch: Batch| async { Ok::<_, HandlerError>(()) });
//! let binding = ListenerBinding::new("payments", "orders", handler)
//!     .with_brokers(["kafka-1:9092", "kafka-2:9092"])
//!     .with_dispatch(DispatchPolicy::PerMessage)
//!     .with_property("auto.offset.reset", "earliest");
//!
//! assert!(binding.validate().is_ok());
//! assert_eq!(binding.name(), "orders/payments");
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::BindingError;
use crate::listener::HandlerRef;

const MAX_TOPIC_LEN: usize = 249;

/// How fetched messages are handed to the work wrapper.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DispatchPolicy {
    /// One `perform` call per polled batch.
    #[default]
    PerBatch,
    /// One `perform` call per message, in poll order.
    PerMessage,
}

/// One consumption target.
#[derive(Clone)]
pub struct ListenerBinding {
    topic: Arc<str>,
    group: Arc<str>,
    brokers: Vec<String>,
    properties: BTreeMap<String, String>,
    dispatch: DispatchPolicy,
    handler: HandlerRef,
}

impl ListenerBinding {
    /// Creates a binding for `topic` consumed by `group` and processed by `handler`.
    ///
    /// Brokers default to `localhost:9092`.
    pub fn new(
        topic: impl Into<Arc<str>>,
        group: impl Into<Arc<str>>,
        handler: HandlerRef,
    ) -> Self {
        Self {
            topic: topic.into(),
            group: group.into(),
            brokers: vec!["localhost:9092".to_string()],
            properties: BTreeMap::new(),
            dispatch: DispatchPolicy::default(),
            handler,
        }
    }

    /// Replaces the broker address list.
    #[must_use]
    pub fn with_brokers<I, S>(mut self, brokers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.brokers = brokers.into_iter().map(Into::into).collect();
        self
    }

    /// Sets a consumer client property, passed through to the driver untouched.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Sets the dispatch policy.
    #[must_use]
    pub fn with_dispatch(mut self, dispatch: DispatchPolicy) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// `group/topic`, used as the listener name in logs and events.
    pub fn name(&self) -> String {
        format!("{}/{}", self.group, self.topic)
    }

    pub fn topic(&self) -> &Arc<str> {
        &self.topic
    }

    pub fn group(&self) -> &Arc<str> {
        &self.group
    }

    pub fn brokers(&self) -> &[String] {
        &self.brokers
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Looks up one client property.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn dispatch(&self) -> DispatchPolicy {
        self.dispatch
    }

    pub fn handler(&self) -> &HandlerRef {
        &self.handler
    }

    /// Checks topic, group and broker addresses.
    pub fn validate(&self) -> Result<(), BindingError> {
        validate_topic(&self.topic)?;
        validate_group(&self.group)?;
        if self.brokers.is_empty() {
            return Err(BindingError::NoBrokers);
        }
        for broker in &self.brokers {
            validate_broker(broker)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ListenerBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerBinding")
            .field("topic", &self.topic)
            .field("group", &self.group)
            .field("brokers", &self.brokers)
            .field("properties", &self.properties)
            .field("dispatch", &self.dispatch)
            .field("handler", &self.handler.name())
            .finish()
    }
}

fn validate_topic(topic: &str) -> Result<(), BindingError> {
    let invalid = |reason| BindingError::InvalidTopic {
        topic: topic.to_string(),
        reason,
    };
    if topic.is_empty() {
        return Err(BindingError::EmptyTopic);
    }
    if topic == "." || topic == ".." {
        return Err(invalid("reserved name"));
    }
    if topic.len() > MAX_TOPIC_LEN {
        return Err(invalid("longer than 249 characters"));
    }
    if !topic
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(invalid("allowed characters are [A-Za-z0-9._-]"));
    }
    Ok(())
}

fn validate_group(group: &str) -> Result<(), BindingError> {
    if group.is_empty() {
        return Err(BindingError::EmptyGroup);
    }
    if group.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(BindingError::InvalidGroup {
            group: group.to_string(),
        });
    }
    Ok(())
}

fn validate_broker(broker: &str) -> Result<(), BindingError> {
    let invalid = || BindingError::InvalidBroker {
        broker: broker.to_string(),
    };
    let (host, port) = broker.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() || host.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(invalid()),
        Ok(_) => Ok(()),
    }
}
