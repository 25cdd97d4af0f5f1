//! Stream metadata lookup
//!
//! The server does not own stream metadata. It only needs to turn a stream
//! identifier into the address of its video source, which is a key-value read
//! from an external store. `MetadataStore` is that seam; two implementations
//! are provided:
//! - `MemoryStore`: records held in a map (tests, embedding)
//! - `TomlStore`: records loaded once from a TOML file at startup

pub mod memory;
pub mod toml_file;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::registry::StreamId;

pub use memory::MemoryStore;
pub use toml_file::TomlStore;

/// Status value of streams that are listed by `GET /streams`
pub const STATUS_ACTIVE: &str = "active";

/// One stream document as stored by the metadata backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    /// Stream identifier
    pub id: String,
    /// Human readable camera name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Address of the video source; absent or empty means "no source"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_source: Option<String>,
    /// Lifecycle status (e.g. "active", "inactive")
    #[serde(default = "default_status")]
    pub status: String,
    /// Free-form location label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

fn default_status() -> String {
    STATUS_ACTIVE.to_string()
}

impl StreamRecord {
    /// Create an active record with the given source
    pub fn new(id: impl Into<String>, video_source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            video_source: Some(video_source.into()),
            status: default_status(),
            location: None,
        }
    }

    /// Create an active record without a video source
    pub fn without_source(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            video_source: None,
            status: default_status(),
            location: None,
        }
    }

    /// Whether the record is listed as active
    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }

    /// The video source, treating blank strings as missing
    pub fn source(&self) -> Option<&str> {
        self.video_source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Lookup interface the stream registry needs from the metadata backend
pub trait MetadataStore: Send + Sync {
    /// Fetch the record for a stream, or `None` if the id is unknown
    fn lookup(&self, id: &StreamId) -> Option<StreamRecord>;

    /// Every known record
    fn list(&self) -> Vec<StreamRecord>;
}

/// How frames are pulled from a video source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// MJPEG or single-JPEG camera endpoint over HTTP(S)
    Http,
    /// Local MJPEG file (concatenated JPEG images)
    File,
    /// Generated test pattern (`stub://name`)
    Synthetic,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Http => write!(f, "http"),
            SourceKind::File => write!(f, "file"),
            SourceKind::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// A resolved video source: its address plus how to read it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    /// Source address as stored (URL or path)
    pub uri: String,
    /// Transport used to read it
    pub kind: SourceKind,
}

impl SourceDescriptor {
    /// Classify a source address
    ///
    /// Returns the unsupported scheme on failure (e.g. `rtsp`).
    pub fn parse(uri: &str) -> Result<Self, String> {
        let uri = uri.trim();
        let kind = match Url::parse(uri) {
            Ok(url) => match url.scheme() {
                "http" | "https" => SourceKind::Http,
                "file" => SourceKind::File,
                "stub" => SourceKind::Synthetic,
                other => return Err(other.to_string()),
            },
            Err(url::ParseError::RelativeUrlWithoutBase) => SourceKind::File,
            Err(e) => return Err(e.to_string()),
        };

        Ok(Self {
            uri: uri.to_string(),
            kind,
        })
    }

    /// Local filesystem path for `File` sources
    pub fn file_path(&self) -> Option<std::path::PathBuf> {
        if self.kind != SourceKind::File {
            return None;
        }
        match Url::parse(&self.uri) {
            Ok(url) => url.to_file_path().ok(),
            Err(_) => Some(std::path::PathBuf::from(&self.uri)),
        }
    }
}

impl std::fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.uri, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http() {
        let desc = SourceDescriptor::parse("http://10.0.0.5:81/stream").unwrap();
        assert_eq!(desc.kind, SourceKind::Http);
    }

    #[test]
    fn test_parse_stub() {
        let desc = SourceDescriptor::parse("stub://lobby").unwrap();
        assert_eq!(desc.kind, SourceKind::Synthetic);
    }

    #[test]
    fn test_parse_plain_path_is_file() {
        let desc = SourceDescriptor::parse("videos/entrance.mjpg").unwrap();
        assert_eq!(desc.kind, SourceKind::File);
        assert_eq!(
            desc.file_path(),
            Some(std::path::PathBuf::from("videos/entrance.mjpg"))
        );
    }

    #[test]
    fn test_parse_file_url() {
        let desc = SourceDescriptor::parse("file:///var/lib/cctv/gate.mjpg").unwrap();
        assert_eq!(desc.kind, SourceKind::File);
        assert_eq!(
            desc.file_path(),
            Some(std::path::PathBuf::from("/var/lib/cctv/gate.mjpg"))
        );
    }

    #[test]
    fn test_parse_rejects_rtsp() {
        let err = SourceDescriptor::parse("rtsp://cam/live").unwrap_err();
        assert_eq!(err, "rtsp");
    }

    #[test]
    fn test_record_blank_source_is_missing() {
        let mut record = StreamRecord::new("cam", "   ");
        assert!(record.source().is_none());
        record.video_source = None;
        assert!(record.source().is_none());
    }
}
