//! Fan-out from one capture thread to many consumer buffers
//!
//! Every consumer attached to a stream owns its own `FrameBuffer`. A single
//! `publish()` offers the frame to each of them, so two consumers of the same
//! camera both see every frame instead of splitting the stream between them.
//! A slow consumer only fills (and drops from) its own buffer.

use std::sync::{Arc, Mutex, MutexGuard};

use super::buffer::FrameBuffer;
use crate::registry::Frame;

/// Identifier of one consumer buffer within a fan-out
pub type ConsumerId = u64;

/// Shared publish side of one stream
#[derive(Debug)]
pub struct FrameFanout {
    /// Capacity given to each new consumer buffer
    buffer_capacity: usize,
    /// Attached consumer buffers
    consumers: Mutex<Vec<(ConsumerId, Arc<FrameBuffer>)>>,
}

impl FrameFanout {
    /// Create a fan-out whose consumer buffers hold `buffer_capacity` frames
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            buffer_capacity,
            consumers: Mutex::new(Vec::new()),
        }
    }

    /// Register a consumer and return its buffer
    pub fn subscribe(&self, consumer: ConsumerId) -> Arc<FrameBuffer> {
        let buffer = Arc::new(FrameBuffer::with_capacity(self.buffer_capacity));
        self.lock().push((consumer, Arc::clone(&buffer)));
        buffer
    }

    /// Remove a consumer's buffer
    ///
    /// Returns false if the consumer was not registered.
    pub fn unsubscribe(&self, consumer: ConsumerId) -> bool {
        let mut consumers = self.lock();
        let before = consumers.len();
        consumers.retain(|(id, _)| *id != consumer);
        consumers.len() != before
    }

    /// Offer a frame to every consumer buffer
    ///
    /// Never blocks. Returns how many buffers accepted the frame; buffers at
    /// capacity drop it.
    pub fn publish(&self, frame: &Frame) -> usize {
        let targets: Vec<Arc<FrameBuffer>> =
            self.lock().iter().map(|(_, buffer)| Arc::clone(buffer)).collect();

        targets
            .iter()
            .filter(|buffer| buffer.publish(frame.clone()))
            .count()
    }

    /// Number of attached consumer buffers
    pub fn consumer_count(&self) -> usize {
        self.lock().len()
    }

    /// Total frames dropped across the attached consumer buffers
    pub fn dropped(&self) -> u64 {
        self.lock().iter().map(|(_, buffer)| buffer.dropped()).sum()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(ConsumerId, Arc<FrameBuffer>)>> {
        self.consumers.lock().unwrap_or_else(|e| e.into_inner())
    }
}
