//! Frame source: the dedicated capture thread of one stream
//!
//! The capture cycle runs on its own OS thread because reads from a camera
//! can block for unpredictable durations. Each iteration:
//! 1. checks the stop flag
//! 2. reads one decoded frame from the `FrameReader`
//! 3. on failure, records a stall and immediately tries again
//! 4. on success, encodes the frame as JPEG at a fixed quality
//! 5. publishes it through the stream's `FrameFanout` (never blocks)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::Bytes;

use super::reader::FrameReader;
use super::state::{CaptureState, SourceStatus};
use crate::media::jpeg::encode_rgb;
use crate::media::FrameFanout;
use crate::registry::{Frame, StreamId};

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Owner of one capture thread
pub struct FrameSource {
    stream: StreamId,
    jpeg_quality: u8,
    fanout: Arc<FrameFanout>,
    status: Arc<SourceStatus>,
    stop: Arc<AtomicBool>,
    reader: Option<Box<dyn FrameReader>>,
    handle: Option<JoinHandle<()>>,
}

impl FrameSource {
    /// Create a source that will publish frames read by `reader` into `fanout`
    pub fn new(
        stream: StreamId,
        reader: Box<dyn FrameReader>,
        fanout: Arc<FrameFanout>,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            stream,
            jpeg_quality,
            fanout,
            status: Arc::new(SourceStatus::new()),
            stop: Arc::new(AtomicBool::new(false)),
            reader: Some(reader),
            handle: None,
        }
    }

    /// Spawn the capture thread
    ///
    /// No-op if the thread was already started. Failing to reach the camera
    /// is not an error here: the thread keeps retrying in `Stalled`.
    pub fn start(&mut self) -> std::io::Result<()> {
        let Some(reader) = self.reader.take() else {
            return Ok(());
        };

        let cycle = CaptureCycle {
            stream: self.stream.clone(),
            jpeg_quality: self.jpeg_quality,
            fanout: Arc::clone(&self.fanout),
            status: Arc::clone(&self.status),
            stop: Arc::clone(&self.stop),
            reader,
        };

        let handle = std::thread::Builder::new()
            .name(format!("capture-{}", self.stream))
            .spawn(move || cycle.run())?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Ask the capture thread to exit; returns immediately
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Wait up to `timeout` for the capture thread to exit
    ///
    /// Returns true if the thread has exited (or was never started). A thread
    /// still blocked in a read after the timeout is detached; it exits on its
    /// own once the read returns.
    pub fn join(&mut self, timeout: Duration) -> bool {
        let Some(handle) = self.handle.take() else {
            return true;
        };

        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                tracing::warn!(
                    stream = %self.stream,
                    timeout_ms = timeout.as_millis() as u64,
                    "Capture thread did not exit in time, detaching"
                );
                return false;
            }
            std::thread::sleep(JOIN_POLL_INTERVAL);
        }

        if handle.join().is_err() {
            tracing::error!(stream = %self.stream, "Capture thread panicked");
        }
        true
    }

    /// Whether the capture thread was started and has not been told to stop
    pub fn is_running(&self) -> bool {
        self.handle.is_some() && !self.stop.load(Ordering::Acquire)
    }

    /// Shared state and counters
    pub fn status(&self) -> &Arc<SourceStatus> {
        &self.status
    }

    /// Stream this source captures
    pub fn stream(&self) -> &StreamId {
        &self.stream
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State moved onto the capture thread
struct CaptureCycle {
    stream: StreamId,
    jpeg_quality: u8,
    fanout: Arc<FrameFanout>,
    status: Arc<SourceStatus>,
    stop: Arc<AtomicBool>,
    reader: Box<dyn FrameReader>,
}

impl CaptureCycle {
    fn run(mut self) {
        tracing::debug!(stream = %self.stream, "Capture thread started");

        if let Err(e) = self.reader.open() {
            self.status.record_read_failure(&e.to_string());
            self.status.transition(CaptureState::Stalled);
            tracing::warn!(stream = %self.stream, error = %e, "Source not available yet");
        }

        let mut sequence = 0u64;
        while !self.stop.load(Ordering::Acquire) {
            let image = match self.reader.read_frame() {
                Ok(image) => image,
                Err(e) => {
                    self.status.record_read_failure(&e.to_string());
                    if self.status.transition(CaptureState::Stalled) {
                        tracing::warn!(stream = %self.stream, error = %e, "Capture stalled");
                    }
                    continue;
                }
            };

            let jpeg = match encode_rgb(&image, self.jpeg_quality) {
                Ok(jpeg) => jpeg,
                Err(e) => {
                    self.status.record_encode_failure(&e.to_string());
                    tracing::debug!(stream = %self.stream, error = %e, "Frame encode failed");
                    continue;
                }
            };

            sequence += 1;
            let frame = Frame::new(sequence, Bytes::from(jpeg), image.width(), image.height());
            let delivered = self.fanout.publish(&frame);
            self.status.record_frame(delivered);

            let previous = self.status.state();
            if self.status.transition(CaptureState::Streaming) && previous == CaptureState::Stalled
            {
                tracing::info!(stream = %self.stream, "Capture recovered");
            }
        }

        self.reader.close();
        self.status.transition(CaptureState::Stopped);
        tracing::debug!(
            stream = %self.stream,
            frames = sequence,
            "Capture thread exited"
        );
    }
}
