//! Synthetic test-pattern reader for `stub://` sources
//!
//! Produces a moving colour gradient at a fixed rate. Used by tests and for
//! running the server without a camera.

use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};

use super::reader::{frame_interval, FrameReader, SourceError};

/// Generates frames locally, paced like a camera
pub struct SyntheticReader {
    width: u32,
    height: u32,
    interval: Duration,
    frame_count: u64,
    next_due: Option<Instant>,
}

impl SyntheticReader {
    /// Create a reader producing `width` x `height` frames at `fps`
    ///
    /// `fps == 0` produces frames as fast as they are requested.
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            interval: frame_interval(fps),
            frame_count: 0,
            next_due: None,
        }
    }

    fn pace(&mut self) {
        if self.interval.is_zero() {
            return;
        }
        let now = Instant::now();
        let due = self.next_due.unwrap_or(now);
        if due > now {
            std::thread::sleep(due - now);
        }
        self.next_due = Some(due.max(now) + self.interval);
    }

    fn render(&self) -> RgbImage {
        let shift = (self.frame_count % 256) as u32;
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let r = ((x * 255 / self.width + shift) % 256) as u8;
            let g = ((y * 255 / self.height) % 256) as u8;
            let b = (shift * 3 % 256) as u8;
            Rgb([r, g, b])
        })
    }
}

impl FrameReader for SyntheticReader {
    fn open(&mut self) -> Result<(), SourceError> {
        tracing::debug!(
            width = self.width,
            height = self.height,
            "Synthetic source opened"
        );
        Ok(())
    }

    fn read_frame(&mut self) -> Result<RgbImage, SourceError> {
        self.pace();
        self.frame_count += 1;
        Ok(self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_change_over_time() {
        let mut reader = SyntheticReader::new(8, 8, 0);
        reader.open().unwrap();

        let first = reader.read_frame().unwrap();
        let second = reader.read_frame().unwrap();

        assert_eq!(first.dimensions(), (8, 8));
        assert_ne!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn test_pacing() {
        let mut reader = SyntheticReader::new(2, 2, 50);
        let start = Instant::now();
        for _ in 0..3 {
            reader.read_frame().unwrap();
        }
        // First frame is immediate, the next two wait 20ms each
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
