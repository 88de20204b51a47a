//! Ordering-enforcing wrapper between the executor and a sink
//!
//! Guarantees the stream contract mechanically: at most one terminal event,
//! nothing emitted after it, and monotonic progress steps. A sink failure
//! (consumer gone) trips the cancellation token so the executor winds down
//! at its next transition check.

use crate::event::ProgressEvent;
use crate::sink::EventSink;
use intelscout_core::IntelScoutError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct ProgressStreamer {
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
    terminal_sent: AtomicBool,
    last_progress_step: AtomicUsize,
}

impl ProgressStreamer {
    pub fn new(sink: Arc<dyn EventSink>, cancel: CancellationToken) -> Self {
        Self {
            sink,
            cancel,
            terminal_sent: AtomicBool::new(false),
            last_progress_step: AtomicUsize::new(0),
        }
    }

    /// The token checked by the executor at every transition and before
    /// each tool dispatch.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether a terminal event has already been delivered.
    pub fn is_terminated(&self) -> bool {
        self.terminal_sent.load(Ordering::SeqCst)
    }

    /// Emit one event, enforcing the stream contract. Never fails the
    /// caller: contract violations are dropped with a log line, and sink
    /// disconnection is converted into cancellation.
    pub async fn emit(&self, event: ProgressEvent) {
        if self.terminal_sent.load(Ordering::SeqCst) {
            warn!(?event, "event after terminal dropped");
            return;
        }

        if let Some(step) = event.progress_step() {
            let last = self.last_progress_step.load(Ordering::SeqCst);
            if step < last {
                debug!(step, last, "non-monotonic progress event dropped");
                return;
            }
            self.last_progress_step.store(step, Ordering::SeqCst);
        }

        if event.is_terminal() {
            self.terminal_sent.store(true, Ordering::SeqCst);
        }

        if let Err(e) = self.sink.emit(event).await {
            warn!(error = %e, "sink rejected event, cancelling mission");
            self.cancel.cancel();
        }
    }

    /// Convenience: emit the terminal error event for a failure.
    pub async fn emit_error(&self, error: &IntelScoutError, context: Option<String>) {
        self.emit(ProgressEvent::Error {
            error: error.to_string(),
            context,
        })
        .await;
    }

    /// Convenience: emit the terminal completion event.
    pub async fn emit_complete(&self, report: String) {
        self.emit(ProgressEvent::Complete { report }).await;
    }
}

/// Streamers are built per mission; a helper for the common wiring.
pub fn streaming_pair(sink: Arc<dyn EventSink>) -> (ProgressStreamer, CancellationToken) {
    let cancel = CancellationToken::new();
    let streamer = ProgressStreamer::new(sink, cancel.clone());
    (streamer, cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CollectingSink;

    fn streamer_with_sink() -> (ProgressStreamer, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::new());
        let streamer = ProgressStreamer::new(sink.clone(), CancellationToken::new());
        (streamer, sink)
    }

    #[tokio::test]
    async fn test_no_events_after_terminal() {
        let (streamer, sink) = streamer_with_sink();
        streamer.emit_complete("report".to_string()).await;
        streamer
            .emit(ProgressEvent::Thinking {
                content: "late".to_string(),
            })
            .await;

        let events = sink.events().await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_terminal());
    }

    #[tokio::test]
    async fn test_exactly_one_terminal() {
        let (streamer, sink) = streamer_with_sink();
        streamer.emit_complete("first".to_string()).await;
        streamer
            .emit_error(
                &IntelScoutError::internal("late failure"),
                None,
            )
            .await;

        let events = sink.events().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ProgressEvent::Complete { .. }));
    }

    #[tokio::test]
    async fn test_progress_monotonicity() {
        let (streamer, sink) = streamer_with_sink();
        streamer.emit(ProgressEvent::progress(1, 3)).await;
        streamer.emit(ProgressEvent::progress(3, 3)).await;
        streamer.emit(ProgressEvent::progress(2, 3)).await; // dropped

        let steps: Vec<_> = sink
            .events()
            .await
            .iter()
            .filter_map(ProgressEvent::progress_step)
            .collect();
        assert_eq!(steps, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_sink_failure_cancels() {
        let (sink, rx) = crate::sink::ChannelSink::new(1);
        drop(rx);
        let streamer = ProgressStreamer::new(Arc::new(sink), CancellationToken::new());
        assert!(!streamer.is_cancelled());
        streamer
            .emit(ProgressEvent::Thinking {
                content: "x".to_string(),
            })
            .await;
        assert!(streamer.is_cancelled());
    }

    #[tokio::test]
    async fn test_external_cancellation_visible() {
        let (streamer, _sink) = streamer_with_sink();
        let token = streamer.cancellation();
        token.cancel();
        assert!(streamer.is_cancelled());
    }
}
