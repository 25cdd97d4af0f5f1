//! Statistics for capture threads, stream sessions and consumers

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::source::CaptureState;

/// Capture-thread statistics
#[derive(Debug, Clone, Serialize)]
pub struct CaptureStats {
    /// Current capture state
    pub state: CaptureState,
    /// Frames read and encoded
    pub frames_captured: u64,
    /// Frames accepted by at least one consumer buffer
    pub frames_published: u64,
    /// Failed reads (stalls)
    pub read_failures: u64,
    /// Frames that could not be encoded
    pub encode_failures: u64,
    /// Seconds since the capture thread was created
    pub uptime_secs: u64,
    /// Milliseconds since the last captured frame
    pub last_frame_age_ms: Option<u64>,
    /// Most recent read or encode error
    pub last_error: Option<String>,
}

/// Stream-session statistics
#[derive(Debug, Clone, Serialize)]
pub struct StreamStats {
    /// Stream identifier
    pub stream_id: String,
    /// Source address the session reads from
    pub source: String,
    /// Attached consumers
    pub consumers: usize,
    /// Frames dropped across consumer buffers because they were full
    pub frames_dropped: u64,
    /// Seconds since the session was created
    pub age_secs: u64,
    /// Capture-thread statistics
    pub capture: CaptureStats,
}

/// Per-consumer delivery statistics
#[derive(Debug, Clone)]
pub struct DeliveryStats {
    /// When the delivery loop started
    pub started_at: Instant,
    /// Frames written to the transport
    pub frames_sent: u64,
    /// Bytes written to the transport
    pub bytes_sent: u64,
    /// Pacing ticks with no frame available
    pub idle_ticks: u64,
}

impl DeliveryStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames_sent: 0,
            bytes_sent: 0,
            idle_ticks: 0,
        }
    }

    /// Record one frame written
    pub fn record_frame(&mut self, bytes: usize) {
        self.frames_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    /// Get duration since the loop started
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Calculate delivered frame rate
    pub fn framerate(&self) -> f64 {
        let secs = self.duration().as_secs_f64();
        if secs > 0.0 {
            self.frames_sent as f64 / secs
        } else {
            0.0
        }
    }

    /// Calculate bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration().as_secs();
        if secs > 0 {
            (self.bytes_sent * 8) / secs
        } else {
            0
        }
    }
}

impl Default for DeliveryStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_stats_new() {
        let stats = DeliveryStats::new();
        assert_eq!(stats.frames_sent, 0);
        assert_eq!(stats.bytes_sent, 0);
        assert_eq!(stats.idle_ticks, 0);
    }

    #[test]
    fn test_delivery_stats_record_frame() {
        let mut stats = DeliveryStats::new();
        stats.record_frame(1000);
        stats.record_frame(500);

        assert_eq!(stats.frames_sent, 2);
        assert_eq!(stats.bytes_sent, 1500);
    }

    #[test]
    fn test_delivery_stats_bitrate() {
        let mut stats = DeliveryStats::new();
        stats.started_at = Instant::now() - Duration::from_secs(10);
        stats.bytes_sent = 1_000_000;

        // 1,000,000 bytes * 8 bits / 10 seconds = 800,000 bps
        assert_eq!(stats.bitrate(), 800_000);
    }

    #[test]
    fn test_delivery_stats_framerate() {
        let mut stats = DeliveryStats::new();
        stats.started_at = Instant::now() - Duration::from_secs(2);
        stats.frames_sent = 60;

        let fps = stats.framerate();
        assert!(fps > 29.0 && fps <= 30.0);
    }

    #[test]
    fn test_capture_stats_serialize() {
        let stats = CaptureStats {
            state: CaptureState::Stalled,
            frames_captured: 3,
            frames_published: 3,
            read_failures: 1,
            encode_failures: 0,
            uptime_secs: 4,
            last_frame_age_ms: None,
            last_error: Some("timeout".into()),
        };

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["state"], "stalled");
        assert_eq!(json["read_failures"], 1);
    }
}
