//! Frame sources
//!
//! A frame source owns the connection to one upstream video feed and runs the
//! capture cycle on a dedicated thread, publishing JPEG frames into the
//! stream's fan-out.
//!
//! Supported feeds, chosen from the source descriptor:
//! - `http(s)://` MJPEG camera streams and JPEG snapshot URLs
//! - local MJPEG files (plain path or `file://`), looped
//! - `stub://name` synthetic test pattern

pub mod capture;
pub mod file;
pub mod http;
pub mod reader;
pub mod state;
pub mod synthetic;

pub use capture::FrameSource;
pub use reader::{open_reader, FrameReader, ReaderConfig, SourceError};
pub use state::{CaptureState, SourceStatus};
