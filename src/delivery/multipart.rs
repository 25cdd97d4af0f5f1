//! MJPEG over HTTP (`multipart/x-mixed-replace`)
//!
//! Each frame is written as one part:
//!
//! ```text
//! --frame\r\n
//! Content-Type: image/jpeg\r\n
//! \r\n
//! <jpeg bytes>\r\n
//! ```
//!
//! The response body is fed from a small channel. When the client goes away
//! the HTTP server drops the body, which closes the channel and ends the
//! delivery loop.

use async_trait::async_trait;
use axum::body::Body;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::mpsc;

use super::{DeliveryError, FrameSink};
use crate::registry::Frame;

/// Multipart boundary token
pub const BOUNDARY: &str = "frame";

/// Response content type announcing the boundary
pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Parts in flight between the delivery loop and the HTTP body
const BODY_CHANNEL_CAPACITY: usize = 2;

const PART_HEADER: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";

/// Frame one JPEG as a multipart part
pub fn encode_part(frame: &Frame) -> Bytes {
    let mut part = BytesMut::with_capacity(PART_HEADER.len() + frame.len() + 2);
    part.put_slice(PART_HEADER);
    part.put_slice(&frame.data);
    part.put_slice(b"\r\n");
    part.freeze()
}

/// Sink writing frames into a streaming HTTP response body
pub struct MultipartSink {
    tx: mpsc::Sender<Result<Bytes, std::io::Error>>,
}

impl MultipartSink {
    /// Create a sink and the response body it feeds
    pub fn channel() -> (Self, Body) {
        let (tx, rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|part| (part, rx))
        });
        (Self { tx }, Body::from_stream(stream))
    }
}

#[async_trait]
impl FrameSink for MultipartSink {
    async fn send_frame(&mut self, frame: &Frame) -> Result<(), DeliveryError> {
        self.tx
            .send(Ok(encode_part(frame)))
            .await
            .map_err(|_| DeliveryError::Closed)
    }

    async fn closed(&mut self) {
        self.tx.closed().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::StreamExt;
    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;

    fn frame(data: &'static [u8]) -> Frame {
        Frame::new(1, Bytes::from_static(data), 2, 2)
    }

    #[test]
    fn test_encode_part() {
        let part = encode_part(&frame(&[0xFF, 0xD8, 0xFF, 0xD9]));

        assert_eq!(
            &part[..],
            b"--frame\r\nContent-Type: image/jpeg\r\n\r\n\xFF\xD8\xFF\xD9\r\n"
        );
    }

    #[test]
    fn test_content_type_names_boundary() {
        assert!(CONTENT_TYPE.ends_with(&format!("boundary={}", BOUNDARY)));
        assert!(PART_HEADER.starts_with(format!("--{}\r\n", BOUNDARY).as_bytes()));
    }

    #[tokio::test]
    async fn test_body_yields_parts() {
        let (mut sink, body) = MultipartSink::channel();
        let mut stream = body.into_data_stream();

        sink.send_frame(&frame(b"abc")).await.unwrap();
        let chunk = stream.next().await.unwrap().unwrap();
        assert!(chunk.ends_with(b"abc\r\n"));

        drop(sink);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_body_closes_sink() {
        let (mut sink, body) = MultipartSink::channel();
        {
            let mut closed = task::spawn(sink.closed());
            assert_pending!(closed.poll());

            drop(body);
            assert!(closed.is_woken());
            assert_ready!(closed.poll());
        }

        tokio::time::timeout(Duration::from_millis(100), sink.closed())
            .await
            .unwrap();
        assert_eq!(
            sink.send_frame(&frame(b"x")).await,
            Err(DeliveryError::Closed)
        );
    }
}
