//! Scripted consumers for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ConsumerError;
use crate::listener::{Consumer, Driver, ListenerBinding, Message};

pub(crate) type Step = Result<Vec<Message>, ConsumerError>;

/// Observes a scripted consumer after it was boxed away.
#[derive(Clone, Default)]
pub(crate) struct Probe {
    polls: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl Probe {
    pub(crate) fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Replays its steps, then returns empty polls.
struct Scripted {
    steps: VecDeque<Step>,
    probe: Probe,
}

#[async_trait]
impl Consumer for Scripted {
    async fn poll(&mut self) -> Result<Vec<Message>, ConsumerError> {
        self.probe.polls.fetch_add(1, Ordering::SeqCst);
        match self.steps.pop_front() {
            Some(step) => step,
            None => {
                tokio::time::sleep(Duration::from_millis(1)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn close(&mut self) -> Result<(), ConsumerError> {
        self.probe.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out scripted consumers in connect order.
#[derive(Default)]
pub(crate) struct ScriptedDriver {
    queue: Mutex<VecDeque<Scripted>>,
    connects: AtomicUsize,
}

impl ScriptedDriver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(self, probe: Probe, steps: Vec<Step>) -> Self {
        self.queue.lock().unwrap().push_back(Scripted {
            steps: steps.into(),
            probe,
        });
        self
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Driver for ScriptedDriver {
    fn connect(&self, _binding: &ListenerBinding) -> Result<Box<dyn Consumer>, ConsumerError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match self.queue.lock().unwrap().pop_front() {
            Some(consumer) => Ok(Box::new(consumer)),
            None => Err(ConsumerError::Connect {
                error: "no scripted consumer left".into(),
            }),
        }
    }
}
