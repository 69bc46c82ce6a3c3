//! # ListenerUnit: one binding, one consumer, one fetch at a time.
//!
//! ```text
//! fetch(work)
//!   └─► consumer.poll()                        (exactly once)
//!         ├─ empty           → Ok(0), work not called
//!         ├─ Err             → FetchFailed, ListenerError::Poll
//!         └─ messages
//!              ├─ PerBatch   → work.perform(handler, batch)
//!              └─ PerMessage → work.perform(handler, [msg]) for each msg, in order
//!                    ├─ Err  → FetchFailed, ListenerError::Work (remaining messages skipped)
//!                    └─ Ok   → BatchProcessed(count)
//! ```
//!
//! `fetch` never loops; the orchestrator decides when to call it again.

use std::sync::Arc;

use crate::error::{HandlerError, ListenerError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::listener::{Batch, Consumer, DispatchPolicy, Driver, ListenerBinding, Message, Work};

/// A connected listener for one binding.
pub struct ListenerUnit {
    binding: ListenerBinding,
    name: Arc<str>,
    consumer: Box<dyn Consumer>,
    bus: Bus,
}

impl ListenerUnit {
    /// Validates `binding` and connects its consumer.
    pub(crate) fn connect(
        binding: &ListenerBinding,
        driver: &dyn Driver,
        bus: Bus,
    ) -> Result<Self, RuntimeError> {
        let name = binding.name();
        binding
            .validate()
            .map_err(|source| RuntimeError::InvalidBinding {
                binding: name.clone(),
                source,
            })?;
        let consumer = driver
            .connect(binding)
            .map_err(|source| RuntimeError::Connect {
                binding: name.clone(),
                source,
            })?;

        tracing::debug!(listener = %name, brokers = ?binding.brokers(), "listener connected");
        Ok(Self {
            binding: binding.clone(),
            name: name.into(),
            consumer,
            bus,
        })
    }

    /// `group/topic`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn binding(&self) -> &ListenerBinding {
        &self.binding
    }

    /// Polls once and dispatches what arrived. Returns the number of messages handled.
    pub async fn fetch(&mut self, work: &dyn Work) -> Result<usize, ListenerError> {
        let res = self.poll_and_dispatch(work).await;
        match &res {
            Ok(0) => {}
            Ok(n) => self.bus.publish(
                Event::new(EventKind::BatchProcessed)
                    .with_source(Arc::clone(&self.name))
                    .with_count(*n),
            ),
            Err(e) => self.bus.publish(
                Event::new(EventKind::FetchFailed)
                    .with_source(Arc::clone(&self.name))
                    .with_reason(e.to_string()),
            ),
        }
        res
    }

    /// Closes the consumer. Failures are logged, never returned.
    pub async fn close(mut self) {
        if let Err(e) = self.consumer.close().await {
            tracing::warn!(listener = %self.name, error = %e, "consumer close failed");
        }
        self.bus
            .publish(Event::new(EventKind::ListenerStopped).with_source(Arc::clone(&self.name)));
    }

    async fn poll_and_dispatch(&mut self, work: &dyn Work) -> Result<usize, ListenerError> {
        let messages = self
            .consumer
            .poll()
            .await
            .map_err(|source| ListenerError::Poll {
                listener: self.name.to_string(),
                source,
            })?;
        if messages.is_empty() {
            return Ok(0);
        }

        let count = messages.len();
        let topic = Arc::clone(self.binding.topic());
        let group = Arc::clone(self.binding.group());
        let handler = Arc::clone(self.binding.handler());
        let batch = |messages: Vec<Message>| Batch {
            topic: Arc::clone(&topic),
            group: Arc::clone(&group),
            messages,
        };

        let res: Result<(), HandlerError> = match self.binding.dispatch() {
            DispatchPolicy::PerBatch => work.perform(handler, batch(messages)).await,
            DispatchPolicy::PerMessage => {
                let mut res = Ok(());
                for msg in messages {
                    res = work.perform(Arc::clone(&handler), batch(vec![msg])).await;
                    if res.is_err() {
                        break;
                    }
                }
                res
            }
        };
        res.map_err(|source| ListenerError::Work {
            listener: self.name.to_string(),
            source,
        })?;
        Ok(count)
    }
}

impl std::fmt::Debug for ListenerUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerUnit")
            .field("name", &self.name)
            .field("dispatch", &self.binding.dispatch())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BindingError, ConsumerError};
    use crate::listener::scripted::{Probe, ScriptedDriver};
    use crate::listener::{HandlerFn, HandlerRef, Inline};
    use std::sync::Mutex;

    fn recording_handler(seen: Arc<Mutex<Vec<usize>>>) -> HandlerRef {
        HandlerFn::arc("rec", move |batch: Batch| {
            seen.lock().unwrap().push(batch.len());
            async { Ok::<_, HandlerError>(()) }
        })
    }

    fn msgs(topic: &str, n: i64) -> Vec<Message> {
        (0..n).map(|i| Message::new(topic, 0, i, "x")).collect()
    }

    #[tokio::test]
    async fn per_batch_dispatches_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let probe = Probe::default();
        let driver = ScriptedDriver::new().with(probe.clone(), vec![Ok(msgs("t", 3))]);
        let binding = ListenerBinding::new("t", "g", recording_handler(seen.clone()));
        let bus = Bus::new(8);
        let mut events = bus.subscribe();

        let mut unit = ListenerUnit::connect(&binding, &driver, bus).unwrap();
        assert_eq!(unit.name(), "g/t");
        assert_eq!(unit.fetch(&Inline).await.unwrap(), 3);

        assert_eq!(*seen.lock().unwrap(), vec![3]);
        assert_eq!(probe.polls(), 1);
        let ev = events.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::BatchProcessed);
        assert_eq!(ev.count, Some(3));
    }

    #[tokio::test]
    async fn per_message_dispatches_each_message() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let driver = ScriptedDriver::new().with(Probe::default(), vec![Ok(msgs("t", 3))]);
        let binding = ListenerBinding::new("t", "g", recording_handler(seen.clone()))
            .with_dispatch(DispatchPolicy::PerMessage);

        let mut unit = ListenerUnit::connect(&binding, &driver, Bus::new(8)).unwrap();
        assert_eq!(unit.fetch(&Inline).await.unwrap(), 3);
        assert_eq!(*seen.lock().unwrap(), vec![1, 1, 1]);
    }

    #[tokio::test]
    async fn empty_poll_skips_work() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let driver = ScriptedDriver::new().with(Probe::default(), vec![]);
        let binding = ListenerBinding::new("t", "g", recording_handler(seen.clone()));

        let mut unit = ListenerUnit::connect(&binding, &driver, Bus::new(8)).unwrap();
        assert_eq!(unit.fetch(&Inline).await.unwrap(), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn poll_and_work_failures_are_distinguished() {
        let driver = ScriptedDriver::new().with(
            Probe::default(),
            vec![Err(ConsumerError::Poll {
                error: "broker down".into(),
            })],
        );
        let ok = HandlerFn::arc("ok", |_b: Batch| async { Ok::<_, HandlerError>(()) });
        let binding = ListenerBinding::new("t", "g", ok);
        let mut unit = ListenerUnit::connect(&binding, &driver, Bus::new(8)).unwrap();
        let err = unit.fetch(&Inline).await.unwrap_err();
        assert_eq!(err.as_label(), "listener_poll_failed");

        let driver = ScriptedDriver::new().with(Probe::default(), vec![Ok(msgs("t", 1))]);
        let failing = HandlerFn::arc("bad", |_b: Batch| async {
            Err::<(), _>(HandlerError::fail("bad payload"))
        });
        let binding = ListenerBinding::new("t", "g", failing);
        let mut unit = ListenerUnit::connect(&binding, &driver, Bus::new(8)).unwrap();
        let err = unit.fetch(&Inline).await.unwrap_err();
        assert_eq!(err.as_label(), "listener_work_failed");
        assert_eq!(err.listener(), "g/t");
    }

    #[test]
    fn invalid_binding_never_connects() {
        let driver = ScriptedDriver::new().with(Probe::default(), vec![]);
        let ok = HandlerFn::arc("ok", |_b: Batch| async { Ok::<_, HandlerError>(()) });
        let binding = ListenerBinding::new("", "g", ok);

        let err = ListenerUnit::connect(&binding, &driver, Bus::new(8)).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::InvalidBinding {
                source: BindingError::EmptyTopic,
                ..
            }
        ));
        assert_eq!(driver.connects(), 0);
    }

    #[tokio::test]
    async fn close_closes_consumer_and_reports() {
        let probe = Probe::default();
        let driver = ScriptedDriver::new().with(probe.clone(), vec![]);
        let ok = HandlerFn::arc("ok", |_b: Batch| async { Ok::<_, HandlerError>(()) });
        let binding = ListenerBinding::new("t", "g", ok);
        let bus = Bus::new(8);
        let mut events = bus.subscribe();

        let unit = ListenerUnit::connect(&binding, &driver, bus).unwrap();
        unit.close().await;

        assert!(probe.closed());
        let ev = events.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::ListenerStopped);
        assert_eq!(ev.source.as_deref(), Some("g/t"));
    }
}
