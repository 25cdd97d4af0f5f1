//! Registry error types
//!
//! Errors surfaced to a consumer when a stream cannot be attached. They are
//! reported before any delivery loop starts.

use super::frame::StreamId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Stream identifier unknown to the metadata store
    NotFound(StreamId),
    /// Stream exists but has no usable video source
    NoSource(StreamId),
    /// Stream's video source uses a transport this server cannot read
    UnsupportedSource(StreamId, String),
    /// The capture thread for the stream could not be spawned
    CaptureFailed(StreamId, String),
    /// The server is shutting down and accepts no new consumers
    ShutdownInProgress,
    /// The consumer limit is reached
    ConnectionLimit,
}

impl StreamError {
    /// Short reason string sent to clients
    pub fn reason(&self) -> &'static str {
        match self {
            StreamError::NotFound(_) => "Stream not found",
            StreamError::NoSource(_) => "No video source",
            StreamError::UnsupportedSource(..) => "Unsupported video source",
            StreamError::CaptureFailed(..) => "Failed to start video source",
            StreamError::ShutdownInProgress => "Server shutting down",
            StreamError::ConnectionLimit => "Too many connections",
        }
    }
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::NotFound(id) => write!(f, "Stream not found: {}", id),
            StreamError::NoSource(id) => write!(f, "No video source for stream: {}", id),
            StreamError::UnsupportedSource(id, scheme) => {
                write!(f, "Unsupported video source '{}' for stream: {}", scheme, id)
            }
            StreamError::CaptureFailed(id, reason) => {
                write!(f, "Failed to start capture for stream {}: {}", id, reason)
            }
            StreamError::ShutdownInProgress => write!(f, "Server shutting down"),
            StreamError::ConnectionLimit => write!(f, "Connection limit reached"),
        }
    }
}

impl std::error::Error for StreamError {}
