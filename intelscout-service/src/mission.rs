//! Mission execution interface: streaming and buffered

use crate::validate::validate_objective;
use intelscout_agents::{MissionExecutor, MissionOutcome};
use intelscout_core::{MissionStatus, Result, TraceEntry};
use intelscout_events::{
    streaming_pair, CollectingSink, EventSink, ProgressEvent, ProgressStreamer,
    CancellationToken,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Inbound mission request
#[derive(Debug, Clone)]
pub struct MissionRequest {
    pub user_input: String,
    pub conversation_id: Option<i64>,
}

/// Buffered execution response
#[derive(Debug, Clone, Serialize)]
pub struct BufferedOutcome {
    pub status: String,
    pub mission_id: i64,
    pub report: String,
    pub trace: Vec<TraceEntry>,
}

/// Entry point for mission execution.
#[derive(Clone)]
pub struct MissionService {
    executor: Arc<MissionExecutor>,
}

impl MissionService {
    pub fn new(executor: Arc<MissionExecutor>) -> Self {
        Self { executor }
    }

    /// Streaming execution: events flow into `sink` as they happen. The
    /// returned token cancels the mission; the outcome future resolves when
    /// the mission reaches a terminal state.
    ///
    /// Invalid input is rejected before any MissionLog row exists; the sink
    /// still receives a single terminal `error` event.
    pub async fn run_streaming(
        &self,
        request: MissionRequest,
        sink: Arc<dyn EventSink>,
    ) -> Result<MissionOutcome> {
        if let Err(e) = validate_objective(&request.user_input) {
            let _ = sink
                .emit(ProgressEvent::Error {
                    error: e.to_string(),
                    context: Some("request validation".to_string()),
                })
                .await;
            return Err(e);
        }

        let (streamer, _token) = streaming_pair(sink);
        Ok(self.run_validated(&request, &streamer).await)
    }

    /// Streaming execution with an externally owned cancellation token.
    pub async fn run_streaming_with_cancel(
        &self,
        request: MissionRequest,
        sink: Arc<dyn EventSink>,
        cancel: CancellationToken,
    ) -> Result<MissionOutcome> {
        if let Err(e) = validate_objective(&request.user_input) {
            let _ = sink
                .emit(ProgressEvent::Error {
                    error: e.to_string(),
                    context: Some("request validation".to_string()),
                })
                .await;
            return Err(e);
        }
        let streamer = ProgressStreamer::new(sink, cancel);
        Ok(self.run_validated(&request, &streamer).await)
    }

    /// Buffered execution: runs to completion and returns one envelope.
    pub async fn run_buffered(&self, request: MissionRequest) -> Result<BufferedOutcome> {
        validate_objective(&request.user_input)?;

        let sink = Arc::new(CollectingSink::new());
        let (streamer, _token) = streaming_pair(sink);
        let outcome = self.run_validated(&request, &streamer).await;

        Ok(BufferedOutcome {
            status: match outcome.status {
                MissionStatus::Completed => "complete".to_string(),
                _ => "failed".to_string(),
            },
            mission_id: outcome.mission_id,
            report: outcome.report,
            trace: outcome.trace,
        })
    }

    async fn run_validated(
        &self,
        request: &MissionRequest,
        streamer: &ProgressStreamer,
    ) -> MissionOutcome {
        info!(
            conversation_id = ?request.conversation_id,
            "mission accepted"
        );
        self.executor
            .run(&request.user_input, request.conversation_id, streamer)
            .await
    }
}
