//! Frame delivery over WebSocket
//!
//! Each frame is one binary message holding the raw JPEG. The socket is split:
//! a reader task watches for the client's close (or any read error) while the
//! delivery loop owns the write half.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{signalled, DeliveryError, FrameSink};
use crate::registry::{Frame, StreamError};

/// Sink writing frames as binary WebSocket messages
pub struct WsSink {
    sender: SplitSink<WebSocket, Message>,
    closed: watch::Receiver<bool>,
    reader: JoinHandle<()>,
}

impl WsSink {
    /// Split `socket` and start watching its read half
    pub fn new(socket: WebSocket) -> Self {
        let (sender, receiver) = socket.split();
        let (closed_tx, closed) = watch::channel(false);
        let reader = tokio::spawn(watch_close(receiver, closed_tx));
        Self {
            sender,
            closed,
            reader,
        }
    }
}

impl Drop for WsSink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Drain client messages until the client closes or the read fails
async fn watch_close(mut receiver: SplitStream<WebSocket>, closed: watch::Sender<bool>) {
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "WebSocket read failed");
                break;
            }
        }
    }
    closed.send_replace(true);
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_frame(&mut self, frame: &Frame) -> Result<(), DeliveryError> {
        self.sender
            .send(Message::Binary(frame.data.to_vec()))
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))
    }

    async fn closed(&mut self) {
        signalled(&mut self.closed).await;
    }

    async fn close(&mut self) {
        let _ = self.sender.send(Message::Close(None)).await;
    }
}

/// JSON text sent to a client before closing on an attach error
pub fn error_message(err: &StreamError) -> String {
    json!({ "error": err.reason() }).to_string()
}

/// Report an attach error to a client, then close the socket
pub async fn reject(mut socket: WebSocket, err: &StreamError) {
    if socket.send(Message::Text(error_message(err))).await.is_ok() {
        let _ = socket.send(Message::Close(None)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StreamId;

    #[test]
    fn test_error_message() {
        let msg = error_message(&StreamError::NotFound(StreamId::new("cam9")));
        assert_eq!(msg, r#"{"error":"Stream not found"}"#);

        let msg = error_message(&StreamError::NoSource(StreamId::new("cam2")));
        let value: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(value["error"], "No video source");
    }
}
