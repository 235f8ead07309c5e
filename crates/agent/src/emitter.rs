//! Stream emitter — the order-preserving sink between the loop and a transport.
//!
//! The loop only ever talks to an [`EventSink`]. A sink delivers events in
//! the exact order `emit` is called and applies no logic of its own; when
//! the consumer is gone, `emit` fails and `closed` resolves, which the loop
//! treats as cancellation.

use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::stream_event::StreamEvent;

/// The consumer of a stream went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("event consumer disconnected")]
pub struct SinkClosed;

#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event. Waits for capacity; never reorders.
    async fn emit(&self, event: StreamEvent) -> Result<(), SinkClosed>;

    /// Resolves once the consumer has gone away. Never resolves for sinks
    /// that cannot be disconnected.
    async fn closed(&self) {
        std::future::pending::<()>().await
    }
}

/// Sink backed by a bounded channel; the receiving half goes to the transport.
pub struct ChannelSink {
    tx: mpsc::Sender<StreamEvent>,
}

impl ChannelSink {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, event: StreamEvent) -> Result<(), SinkClosed> {
        self.tx.send(event).await.map_err(|_| SinkClosed)
    }

    async fn closed(&self) {
        self.tx.closed().await
    }
}

/// In-memory collector, for tests and non-streaming callers.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<StreamEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StreamEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn into_events(self) -> Vec<StreamEvent> {
        self.events.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl EventSink for CollectingSink {
    async fn emit(&self, event: StreamEvent) -> Result<(), SinkClosed> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
        Ok(())
    }
}
