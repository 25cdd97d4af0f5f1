//! Frame media handling
//!
//! This module provides:
//! - Bounded per-consumer frame buffers with drop-newest backpressure
//! - Fan-out of one stream's frames to every attached consumer
//! - JPEG encoding/decoding and MJPEG stream splitting

pub mod buffer;
pub mod fanout;
pub mod jpeg;

pub use buffer::{FrameBuffer, DEFAULT_BUFFER_CAPACITY};
pub use fanout::{ConsumerId, FrameFanout};
pub use jpeg::{MjpegError, MjpegReader, DEFAULT_JPEG_QUALITY};
