//! Live CCTV frame re-distribution server
//!
//! Pulls frames from camera sources (HTTP MJPEG / snapshot endpoints, local
//! MJPEG files, or a synthetic test pattern), re-encodes them as JPEG and
//! serves them to any number of consumers over HTTP multipart MJPEG or
//! WebSocket.
//!
//! # Architecture
//!
//! ```text
//!   camera ──► FrameReader ──► capture thread ──► FrameFanout
//!                              (one per stream)        │
//!                                          ┌───────────┼───────────┐
//!                                          ▼           ▼           ▼
//!                                     FrameBuffer FrameBuffer FrameBuffer
//!                                     (bounded, one per consumer)
//!                                          │           │           │
//!                                          ▼           ▼           ▼
//!                                     delivery    delivery    delivery
//!                                     loop (HTTP) loop (WS)   loop (HTTP)
//! ```
//!
//! A stream's capture thread runs exactly while at least one consumer is
//! attached. Slow consumers lose frames from their own buffer without
//! affecting the capture thread or other consumers.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cctv_stream::{MemoryStore, ServerConfig, StreamRecord, VideoServer};
//!
//! # async fn run() -> cctv_stream::Result<()> {
//! let store = MemoryStore::from_records(vec![StreamRecord::new("cam1", "stub://cam1")]);
//! let server = VideoServer::new(ServerConfig::default(), Arc::new(store));
//!
//! server
//!     .run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! # }
//! ```

pub mod delivery;
pub mod error;
pub mod media;
pub mod metadata;
pub mod registry;
pub mod server;
pub mod source;
pub mod stats;

pub use error::{Error, Result};
pub use metadata::{MemoryStore, MetadataStore, StreamRecord, TomlStore};
pub use registry::{RegistryConfig, StreamError, StreamId, StreamRegistry};
pub use server::{ServerConfig, VideoServer};
