//! Frame delivery to consumers
//!
//! One delivery loop runs per consumer connection. It never touches the
//! capture thread directly; it only drains the consumer's own buffer:
//!
//! 1. take the oldest pending frame, if any, and write it to the transport
//! 2. wait one pacing interval, or until the consumer disconnects or the
//!    server shuts down
//!
//! The loop owns the consumer's `Attachment`, so it detaches on every exit.

pub mod multipart;
pub mod websocket;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::registry::{Attachment, Frame};
use crate::stats::DeliveryStats;

pub use multipart::MultipartSink;
pub use websocket::WsSink;

/// Error writing to a consumer transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The consumer went away
    Closed,
    /// The transport failed while writing
    Transport(String),
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryError::Closed => write!(f, "Consumer closed the connection"),
            DeliveryError::Transport(msg) => write!(f, "Transport error: {}", msg),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// Why a delivery loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The consumer disconnected or a write failed
    ConsumerDisconnected,
    /// The server is shutting down
    Shutdown,
}

/// Consumer-facing transport for encoded frames
#[async_trait]
pub trait FrameSink: Send {
    /// Write one JPEG frame
    async fn send_frame(&mut self, frame: &Frame) -> Result<(), DeliveryError>;

    /// Resolve once the consumer has disconnected
    async fn closed(&mut self);

    /// Close the transport; best effort
    async fn close(&mut self) {}
}

/// Run the delivery loop for one consumer until it disconnects or the
/// server shuts down
pub async fn run_delivery<S: FrameSink>(attachment: Attachment, sink: &mut S) -> DeliveryOutcome {
    let pacing = attachment.pacing_interval();
    let mut shutdown = attachment.shutdown_signal();
    let mut stats = DeliveryStats::new();

    tracing::debug!(
        stream = %attachment.stream(),
        consumer = attachment.consumer(),
        pacing_ms = pacing.as_millis() as u64,
        "Delivery started"
    );

    let outcome = loop {
        if let Some(frame) = attachment.latest() {
            let sent = tokio::select! {
                result = sink.send_frame(&frame) => Some(result),
                _ = signalled(&mut shutdown) => None,
            };

            match sent {
                Some(Ok(())) => stats.record_frame(frame.len()),
                Some(Err(e)) => {
                    tracing::debug!(
                        stream = %attachment.stream(),
                        consumer = attachment.consumer(),
                        error = %e,
                        "Frame write failed"
                    );
                    break DeliveryOutcome::ConsumerDisconnected;
                }
                None => break DeliveryOutcome::Shutdown,
            }
        } else {
            stats.idle_ticks += 1;
        }

        tokio::select! {
            _ = tokio::time::sleep(pacing) => {}
            _ = sink.closed() => break DeliveryOutcome::ConsumerDisconnected,
            _ = signalled(&mut shutdown) => break DeliveryOutcome::Shutdown,
        }
    };

    tracing::info!(
        stream = %attachment.stream(),
        consumer = attachment.consumer(),
        outcome = ?outcome,
        frames = stats.frames_sent,
        bytes = stats.bytes_sent,
        fps = format_args!("{:.1}", stats.framerate()),
        bitrate = stats.bitrate(),
        "Delivery ended"
    );

    outcome
}

/// Resolve when `signal` is set to true or its sender is gone
pub(crate) async fn signalled(signal: &mut watch::Receiver<bool>) {
    loop {
        if *signal.borrow_and_update() {
            return;
        }
        if signal.changed().await.is_err() {
            return;
        }
    }
}
