//! Stream identifiers and encoded frames
//!
//! This module defines the key type for identifying streams and the frames
//! that flow from a capture thread to every attached consumer.

use std::time::Instant;

use bytes::Bytes;

/// Opaque identifier of one logical video feed (e.g. a camera document id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(String);

impl StreamId {
    /// Create a new stream identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for StreamId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One encoded (JPEG) image captured from a stream
///
/// Cheap to clone: `Bytes` is reference counted, so every consumer buffer
/// holding this frame shares the same allocation.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Capture order within the owning session, starting at 1
    pub sequence: u64,
    /// Encoded image payload
    pub data: Bytes,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// When the capture thread produced this frame
    pub captured_at: Instant,
}

impl Frame {
    /// Create a frame from an encoded payload
    pub fn new(sequence: u64, data: Bytes, width: u32, height: u32) -> Self {
        Self {
            sequence,
            data,
            width,
            height,
            captured_at: Instant::now(),
        }
    }

    /// Size of the encoded payload in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
