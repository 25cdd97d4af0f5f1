//! TOML-file metadata store
//!
//! Stream records are read once at startup from a file shaped like:
//!
//! ```toml
//! [streams.gate]
//! name = "Main gate"
//! video_source = "http://10.0.0.21:81/stream"
//! location = "north"
//!
//! [streams.lobby]
//! video_source = "stub://lobby"
//! status = "inactive"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use super::{MemoryStore, MetadataStore, StreamRecord};
use crate::error::{Error, Result};
use crate::registry::StreamId;

#[derive(Debug, Deserialize, Default)]
struct StreamsFile {
    #[serde(default)]
    streams: BTreeMap<String, StreamEntryFile>,
}

#[derive(Debug, Deserialize)]
struct StreamEntryFile {
    name: Option<String>,
    video_source: Option<String>,
    status: Option<String>,
    location: Option<String>,
}

/// Metadata store loaded from a TOML file
#[derive(Debug, Default)]
pub struct TomlStore {
    inner: MemoryStore,
}

impl TomlStore {
    /// Load records from a file on disk
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
            .map_err(|e| Error::Config(format!("invalid {}: {}", path.display(), e)))
    }

    /// Parse records from TOML text
    pub fn parse(text: &str) -> std::result::Result<Self, toml::de::Error> {
        let file: StreamsFile = toml::from_str(text)?;
        let records = file.streams.into_iter().map(|(id, entry)| StreamRecord {
            id,
            name: entry.name,
            video_source: entry.video_source,
            status: entry
                .status
                .unwrap_or_else(|| super::STATUS_ACTIVE.to_string()),
            location: entry.location,
        });

        Ok(Self {
            inner: MemoryStore::from_records(records),
        })
    }
}

impl MetadataStore for TomlStore {
    fn lookup(&self, id: &StreamId) -> Option<StreamRecord> {
        self.inner.lookup(id)
    }

    fn list(&self) -> Vec<StreamRecord> {
        self.inner.list()
    }
}
