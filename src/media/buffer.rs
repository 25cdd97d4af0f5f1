//! Bounded per-consumer frame buffer
//!
//! A `FrameBuffer` decouples the capture cadence of one stream from the
//! delivery cadence of one consumer:
//! 1. The capture thread calls `publish()`, which never blocks. When the
//!    buffer is full the *new* frame is dropped and counted.
//! 2. The delivery loop calls `latest()`, which hands out the oldest pending
//!    frame and removes it (consume-once).
//!
//! Publishing 15 frames into a buffer of capacity 10 with no reads in
//! between leaves frames 1 to 10 in the buffer and drops 11 to 15.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::registry::Frame;

/// Default number of pending frames per consumer
pub const DEFAULT_BUFFER_CAPACITY: usize = 10;

/// Bounded FIFO of encoded frames
#[derive(Debug)]
pub struct FrameBuffer {
    /// Maximum number of pending frames
    capacity: usize,
    /// Pending frames, oldest first
    frames: Mutex<VecDeque<Frame>>,
    /// Frames accepted by `publish`
    published: AtomicU64,
    /// Frames rejected because the buffer was full
    dropped: AtomicU64,
}

impl FrameBuffer {
    /// Create a buffer with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    /// Create a buffer holding at most `capacity` frames (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Offer a frame to the buffer
    ///
    /// Returns true if the frame was queued, false if it was dropped because
    /// the buffer is at capacity.
    pub fn publish(&self, frame: Frame) -> bool {
        let mut frames = self.lock();
        if frames.len() >= self.capacity {
            drop(frames);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        frames.push_back(frame);
        drop(frames);
        self.published.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Take the oldest pending frame, if any
    pub fn latest(&self) -> Option<Frame> {
        self.lock().pop_front()
    }

    /// Number of pending frames
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no frame is pending
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Maximum number of pending frames
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames accepted so far
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Frames dropped so far because the buffer was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    // A panic while holding the lock cannot leave the queue half-updated,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Frame>> {
        self.frames.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
