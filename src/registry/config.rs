//! Registry configuration

use std::time::Duration;

use crate::media::{DEFAULT_BUFFER_CAPACITY, DEFAULT_JPEG_QUALITY};
use crate::source::ReaderConfig;

/// Default delay between delivery-loop iterations (~30 frames per second)
pub const DEFAULT_PACING_INTERVAL: Duration = Duration::from_millis(33);

/// Default bounded wait for a capture thread to exit
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration for stream sessions created by the registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Pending frames held per consumer
    pub buffer_capacity: usize,

    /// Delay between delivery-loop iterations
    pub pacing_interval: Duration,

    /// JPEG quality used when re-encoding captured frames (1-100)
    pub jpeg_quality: u8,

    /// Bounded wait for a capture thread to exit after stop
    pub join_timeout: Duration,

    /// Settings passed to the frame reader backends
    pub reader: ReaderConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            pacing_interval: DEFAULT_PACING_INTERVAL,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            reader: ReaderConfig::default(),
        }
    }
}

impl RegistryConfig {
    /// Set the per-consumer buffer capacity (minimum 1)
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity.max(1);
        self
    }

    /// Set the delivery pacing interval
    pub fn pacing_interval(mut self, interval: Duration) -> Self {
        self.pacing_interval = interval;
        self
    }

    /// Set the delivery pacing from a target frame rate
    pub fn target_fps(mut self, fps: u32) -> Self {
        self.pacing_interval = Duration::from_millis((1000 / fps.max(1) as u64).max(1));
        self
    }

    /// Set the JPEG quality (clamped to 1-100)
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Set the capture-thread join timeout
    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Set the reader backend settings
    pub fn reader_config(mut self, reader: ReaderConfig) -> Self {
        self.reader = reader;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();

        assert_eq!(config.buffer_capacity, 10);
        assert_eq!(config.pacing_interval, Duration::from_millis(33));
        assert_eq!(config.jpeg_quality, 80);
        assert_eq!(config.join_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_builder_buffer_capacity_minimum() {
        let config = RegistryConfig::default().buffer_capacity(0);
        assert_eq!(config.buffer_capacity, 1);
    }

    #[test]
    fn test_builder_jpeg_quality_clamped() {
        assert_eq!(RegistryConfig::default().jpeg_quality(0).jpeg_quality, 1);
        assert_eq!(RegistryConfig::default().jpeg_quality(255).jpeg_quality, 100);
    }

    #[test]
    fn test_builder_target_fps() {
        let config = RegistryConfig::default().target_fps(10);
        assert_eq!(config.pacing_interval, Duration::from_millis(100));

        let config = RegistryConfig::default().target_fps(0);
        assert_eq!(config.pacing_interval, Duration::from_millis(1000));
    }

    #[test]
    fn test_target_fps_never_zero() {
        let config = RegistryConfig::default().target_fps(5000);
        assert_eq!(config.pacing_interval, Duration::from_millis(1));

        let config = RegistryConfig::default().target_fps(u32::MAX);
        assert_eq!(config.pacing_interval, Duration::from_millis(1));
    }

    #[test]
    fn test_builder_chaining() {
        let config = RegistryConfig::default()
            .buffer_capacity(4)
            .pacing_interval(Duration::from_millis(5))
            .jpeg_quality(60)
            .join_timeout(Duration::from_millis(500));

        assert_eq!(config.buffer_capacity, 4);
        assert_eq!(config.pacing_interval, Duration::from_millis(5));
        assert_eq!(config.jpeg_quality, 60);
        assert_eq!(config.join_timeout, Duration::from_millis(500));
    }
}
