//! Stream session
//!
//! One entry of the registry: a running frame source, the fan-out it
//! publishes into, and the number of consumers attached to it. Consumer
//! counts are only changed while the registry lock is held.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::config::RegistryConfig;
use super::frame::StreamId;
use crate::media::{ConsumerId, FrameBuffer, FrameFanout};
use crate::metadata::SourceDescriptor;
use crate::source::{open_reader, FrameSource, SourceStatus};
use crate::stats::StreamStats;

/// A live stream: one capture thread shared by its consumers
pub struct StreamSession {
    /// Stream identifier
    pub id: StreamId,

    /// Where frames come from
    pub descriptor: SourceDescriptor,

    /// Distinguishes sessions created for the same id over time
    pub generation: u64,

    /// Capture thread owner
    source: FrameSource,

    /// Publish side shared with the capture thread
    fanout: Arc<FrameFanout>,

    /// Number of attached consumers
    consumers: usize,

    /// When the session was created
    created_at: Instant,
}

impl StreamSession {
    /// Create a session and start its capture thread
    pub(super) fn start(
        id: StreamId,
        descriptor: SourceDescriptor,
        generation: u64,
        config: &RegistryConfig,
    ) -> std::io::Result<Self> {
        let fanout = Arc::new(FrameFanout::new(config.buffer_capacity));
        let reader = open_reader(&descriptor, &config.reader);
        let mut source = FrameSource::new(
            id.clone(),
            reader,
            Arc::clone(&fanout),
            config.jpeg_quality,
        );
        source.start()?;

        Ok(Self {
            id,
            descriptor,
            generation,
            source,
            fanout,
            consumers: 0,
            created_at: Instant::now(),
        })
    }

    /// Register a consumer and return its buffer
    pub(super) fn attach(&mut self, consumer: ConsumerId) -> Arc<FrameBuffer> {
        self.consumers += 1;
        self.fanout.subscribe(consumer)
    }

    /// Remove a consumer; returns the remaining count
    ///
    /// Unknown consumers leave the count untouched, so it never underflows.
    pub(super) fn detach(&mut self, consumer: ConsumerId) -> usize {
        if self.fanout.unsubscribe(consumer) {
            self.consumers = self.consumers.saturating_sub(1);
        }
        self.consumers
    }

    /// Number of attached consumers
    pub fn consumer_count(&self) -> usize {
        self.consumers
    }

    /// Whether the capture thread is running
    pub fn is_running(&self) -> bool {
        self.source.is_running()
    }

    /// Capture state and counters
    pub fn status(&self) -> &Arc<SourceStatus> {
        self.source.status()
    }

    /// Signal the capture thread to exit
    pub(super) fn stop(&self) {
        self.source.stop();
    }

    /// Wait up to `timeout` for the capture thread to exit
    pub(super) fn join(&mut self, timeout: Duration) -> bool {
        self.source.join(timeout)
    }

    /// Point-in-time statistics
    pub fn stats(&self) -> StreamStats {
        StreamStats {
            stream_id: self.id.to_string(),
            source: self.descriptor.uri.clone(),
            consumers: self.consumers,
            frames_dropped: self.fanout.dropped(),
            age_secs: self.created_at.elapsed().as_secs(),
            capture: self.source.status().snapshot(),
        }
    }
}
