//! Scripted in-memory transport for driver tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::time::Instant;

use super::{CLOSE_ABNORMAL, EventSink, Transport, TransportHandle};
use crate::error::TransportError;

/// What the next `open` call does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behavior {
    /// Report open and stay up.
    Accept,
    /// Report close without ever opening.
    Refuse,
    /// Return an error from `open` itself.
    FailOpen,
    /// Stay in the handshake until the test emits something.
    Hang,
}

#[derive(Debug, Default)]
struct Inner {
    script: VecDeque<Behavior>,
    fallback: Option<Behavior>,
    opened_at: Vec<Instant>,
    sinks: Vec<EventSink>,
    sent: Vec<String>,
    closes: usize,
}

/// Records every open, send and close, and plays back a script of behaviors.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl MockTransport {
    /// Every open is accepted.
    pub(crate) fn accepting() -> Self {
        Self::with_fallback(Behavior::Accept)
    }

    /// Every open closes immediately.
    pub(crate) fn refusing() -> Self {
        Self::with_fallback(Behavior::Refuse)
    }

    pub(crate) fn with_fallback(fallback: Behavior) -> Self {
        let mock = Self::default();
        lock(&mock.inner).fallback = Some(fallback);
        mock
    }

    /// Queues behaviors for the next opens, ahead of the fallback.
    pub(crate) fn script(&self, behaviors: impl IntoIterator<Item = Behavior>) {
        lock(&self.inner).script.extend(behaviors);
    }

    pub(crate) fn open_count(&self) -> usize {
        lock(&self.inner).opened_at.len()
    }

    pub(crate) fn opened_at(&self) -> Vec<Instant> {
        lock(&self.inner).opened_at.clone()
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        lock(&self.inner).sent.clone()
    }

    pub(crate) fn close_calls(&self) -> usize {
        lock(&self.inner).closes
    }

    /// Sink of the most recently opened handle.
    pub(crate) fn latest(&self) -> Option<EventSink> {
        lock(&self.inner).sinks.last().cloned()
    }

    /// Sink of the `n`th opened handle (0-indexed).
    pub(crate) fn sink(&self, n: usize) -> Option<EventSink> {
        lock(&self.inner).sinks.get(n).cloned()
    }
}

impl Transport for MockTransport {
    fn open(&self, url: &str, events: EventSink) -> Result<Box<dyn TransportHandle>, TransportError> {
        let mut inner = lock(&self.inner);
        inner.opened_at.push(Instant::now());
        let behavior = inner
            .script
            .pop_front()
            .or(inner.fallback)
            .unwrap_or(Behavior::Accept);
        match behavior {
            Behavior::Accept => events.opened(),
            Behavior::Refuse => events.closed(CLOSE_ABNORMAL, "refused"),
            Behavior::FailOpen => {
                return Err(TransportError::InvalidUrl {
                    url: url.to_string(),
                    reason: "scripted failure".to_string(),
                });
            }
            Behavior::Hang => {}
        }
        inner.sinks.push(events);
        Ok(Box::new(MockHandle {
            inner: Arc::clone(&self.inner),
            open: true,
        }))
    }
}

#[derive(Debug)]
struct MockHandle {
    inner: Arc<Mutex<Inner>>,
    open: bool,
}

impl TransportHandle for MockHandle {
    fn send(&mut self, text: String) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        lock(&self.inner).sent.push(text);
        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            lock(&self.inner).closes += 1;
        }
    }
}
