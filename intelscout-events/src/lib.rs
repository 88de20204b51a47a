//! Progress event stream for mission execution
//!
//! Turns the executor's internal trace into an ordered, cancellable event
//! stream. Sinks accept one event at a time and may apply backpressure;
//! the streamer guarantees `tool_start` precedes `tool_complete`, exactly
//! one terminal event, and nothing after it.

pub mod event;
pub mod sink;
pub mod streamer;

pub use event::ProgressEvent;
pub use sink::{ChannelSink, CollectingSink, EventSink};
pub use streamer::{streaming_pair, ProgressStreamer};
pub use tokio_util::sync::CancellationToken;
