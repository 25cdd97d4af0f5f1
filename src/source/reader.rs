//! Frame reader abstraction
//!
//! A `FrameReader` is the blocking half of a frame source: it owns the
//! connection to one upstream feed and returns one decoded image per call.
//! Readers run only on a dedicated capture thread, so they may block.

use std::time::Duration;

use image::RgbImage;

use super::file::FileReader;
use super::http::HttpReader;
use super::synthetic::SyntheticReader;
use crate::metadata::{SourceDescriptor, SourceKind};

/// Error raised while opening or reading a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Could not open the upstream connection or file
    Connect(String),
    /// A read on an open connection failed
    Read(String),
    /// The upstream payload could not be decoded
    Decode(String),
    /// The upstream feed ended
    Ended,
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Connect(msg) => write!(f, "connect failed: {}", msg),
            SourceError::Read(msg) => write!(f, "read failed: {}", msg),
            SourceError::Decode(msg) => write!(f, "decode failed: {}", msg),
            SourceError::Ended => write!(f, "source ended"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Blocking reader of decoded frames from one upstream feed
pub trait FrameReader: Send {
    /// Open the upstream connection
    fn open(&mut self) -> Result<(), SourceError>;

    /// Read and decode the next frame
    ///
    /// Implementations reconnect on their own after a failure; the capture
    /// loop simply calls `read_frame` again.
    fn read_frame(&mut self) -> Result<RgbImage, SourceError>;

    /// Release the upstream connection
    fn close(&mut self) {}
}

/// Settings shared by the reader backends
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Frame rate emulated by file and synthetic readers
    pub source_fps: u32,
    /// Minimum delay between HTTP reconnect attempts
    pub reconnect_delay: Duration,
    /// Read timeout on HTTP connections
    pub read_timeout: Duration,
    /// Synthetic frame size
    pub synthetic_size: (u32, u32),
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            source_fps: 30,
            reconnect_delay: Duration::from_millis(500),
            read_timeout: Duration::from_secs(5),
            synthetic_size: (320, 240),
        }
    }
}

/// Build the reader backend for a source descriptor
pub fn open_reader(descriptor: &SourceDescriptor, config: &ReaderConfig) -> Box<dyn FrameReader> {
    match descriptor.kind {
        SourceKind::Synthetic => Box::new(SyntheticReader::new(
            config.synthetic_size.0,
            config.synthetic_size.1,
            config.source_fps,
        )),
        SourceKind::Http => Box::new(HttpReader::new(descriptor.uri.clone(), config)),
        SourceKind::File => {
            let path = descriptor
                .file_path()
                .unwrap_or_else(|| std::path::PathBuf::from(&descriptor.uri));
            Box::new(FileReader::new(path, config.source_fps))
        }
    }
}

/// Time between frames for a target rate (zero disables pacing)
pub(crate) fn frame_interval(fps: u32) -> Duration {
    if fps == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis((1000 / fps as u64).max(1))
    }
}
