//! Stream registry
//!
//! The registry maps stream ids to live sessions. A session exists exactly
//! while at least one consumer is attached; its capture thread publishes
//! into one bounded buffer per consumer.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<StreamRegistry>
//!                     ┌─────────────────────────┐
//!                     │ sessions: HashMap<Id,   │
//!                     │   StreamSession {       │
//!                     │     source (thread),    │
//!                     │     fanout,             │
//!                     │     consumers,          │
//!                     │   }                     │
//!                     │ >                       │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!   [Capture thread]        [Attachment]            [Attachment]
//!   read → encode           buffer.latest()         buffer.latest()
//!         │                       │                       │
//!         └──► fanout.publish() ──► FrameBuffer ──► delivery loop ──► HTTP/WS
//! ```
//!
//! # Zero-Copy Design
//!
//! `bytes::Bytes` uses reference counting, so every consumer buffer holds the
//! same JPEG allocation. Publishing clones the `Frame`, not its payload.

pub mod config;
pub mod entry;
pub mod error;
pub mod frame;
pub mod store;

pub use config::RegistryConfig;
pub use entry::StreamSession;
pub use error::StreamError;
pub use frame::{Frame, StreamId};
pub use store::{Attachment, StreamRegistry};
