//! Event sinks
//!
//! A sink accepts one event at a time and may suspend to apply
//! backpressure. A sink error means the consumer is gone; the streamer
//! treats that as a cancellation signal.

use crate::event::ProgressEvent;
use async_trait::async_trait;
use intelscout_core::{IntelScoutError, Result};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Sink contract for the progress streamer
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event. Suspending applies backpressure to the mission;
    /// an error signals the consumer has disconnected.
    async fn emit(&self, event: ProgressEvent) -> Result<()>;
}

/// Bounded-channel sink; the receiver side is the transport's NDJSON writer.
pub struct ChannelSink {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ChannelSink {
    /// Create a sink and its receiver with the given buffer capacity.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Adapt a receiver into a `Stream` for transport layers that want one.
    pub fn into_stream(rx: mpsc::Receiver<ProgressEvent>) -> ReceiverStream<ProgressEvent> {
        ReceiverStream::new(rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, event: ProgressEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| IntelScoutError::Cancelled {
                reason: "event consumer disconnected".to_string(),
            })
    }
}

/// In-memory sink collecting every event, for tests and buffered execution.
#[derive(Default)]
pub struct CollectingSink {
    events: tokio::sync::Mutex<Vec<ProgressEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventSink for CollectingSink {
    async fn emit(&self, event: ProgressEvent) -> Result<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelSink::new(8);
        sink.emit(ProgressEvent::progress(1, 2)).await.unwrap();
        sink.emit(ProgressEvent::progress(2, 2)).await.unwrap();
        drop(sink);

        assert_eq!(rx.recv().await.unwrap().progress_step(), Some(1));
        assert_eq!(rx.recv().await.unwrap().progress_step(), Some(2));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_receiver_reads_as_cancellation() {
        let (sink, rx) = ChannelSink::new(1);
        drop(rx);
        let err = sink.emit(ProgressEvent::progress(1, 1)).await.unwrap_err();
        assert!(matches!(err, IntelScoutError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_stream_adapter() {
        let (sink, rx) = ChannelSink::new(4);
        sink.emit(ProgressEvent::Thinking {
            content: "x".to_string(),
        })
        .await
        .unwrap();
        drop(sink);

        let events: Vec<_> = ChannelSink::into_stream(rx).collect().await;
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingSink::new();
        sink.emit(ProgressEvent::progress(1, 1)).await.unwrap();
        assert_eq!(sink.events().await.len(), 1);
    }
}
