//! Local MJPEG file reader
//!
//! Plays a file of back-to-back JPEG images (a raw `.mjpg` capture) at a
//! fixed rate, rewinding at end of file so the feed never ends.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use image::RgbImage;

use super::reader::{frame_interval, FrameReader, SourceError};
use crate::media::jpeg::{decode_rgb, MjpegError, MjpegReader};

/// Reads frames from a local MJPEG file in a loop
pub struct FileReader {
    path: PathBuf,
    interval: Duration,
    stream: Option<MjpegReader<BufReader<File>>>,
    next_due: Option<Instant>,
    /// Frames read since the file was last (re)opened
    frames_since_open: u64,
}

impl FileReader {
    /// Create a reader for `path`, emitting at most `fps` frames per second
    pub fn new(path: PathBuf, fps: u32) -> Self {
        Self {
            path,
            interval: frame_interval(fps),
            stream: None,
            next_due: None,
            frames_since_open: 0,
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
}

impl FrameReader for FileReader {
    fn open(&mut self) -> Result<(), SourceError> {
        let file = File::open(&self.path)
            .map_err(|e| SourceError::Connect(format!("{}: {}", self.path.display(), e)))?;
        self.stream = Some(MjpegReader::new(BufReader::new(file)));
        self.frames_since_open = 0;
        tracing::debug!(path = %self.path.display(), "File source opened");
        Ok(())
    }

    fn read_frame(&mut self) -> Result<RgbImage, SourceError> {
        self.pace();
        if self.stream.is_none() {
            self.open()?;
        }

        let Some(stream) = self.stream.as_mut() else {
            return Err(SourceError::Ended);
        };

        let jpeg = match stream.next_jpeg() {
            Ok(jpeg) => jpeg,
            Err(MjpegError::Ended) => {
                let looped = self.frames_since_open > 0;
                self.stream = None;
                if !looped {
                    return Err(SourceError::Ended);
                }
                // Rewind and serve the first frame again
                self.open()?;
                self.stream
                    .as_mut()
                    .ok_or(SourceError::Ended)?
                    .next_jpeg()
                    .map_err(|e| SourceError::Read(e.to_string()))?
            }
            Err(MjpegError::Io(e)) => {
                self.stream = None;
                return Err(SourceError::Read(e.to_string()));
            }
        };

        self.frames_since_open += 1;
        decode_rgb(&jpeg).map_err(|e| SourceError::Decode(e.to_string()))
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use image::Rgb;

    use super::*;
    use crate::media::jpeg::encode_rgb;

    fn write_mjpeg(frames: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for shade in frames {
            let image = RgbImage::from_pixel(4, 4, Rgb([*shade, *shade, *shade]));
            file.write_all(&encode_rgb(&image, 90).unwrap()).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_reads_and_loops() {
        let file = write_mjpeg(&[10, 240]);
        let mut reader = FileReader::new(file.path().to_path_buf(), 0);
        reader.open().unwrap();

        let a = reader.read_frame().unwrap();
        let b = reader.read_frame().unwrap();
        let c = reader.read_frame().unwrap();

        assert_eq!(a.dimensions(), (4, 4));
        assert!(a.get_pixel(0, 0)[0] < 128);
        assert!(b.get_pixel(0, 0)[0] > 128);
        // Third read wraps back to the first frame
        assert!(c.get_pixel(0, 0)[0] < 128);
    }

    #[test]
    fn test_missing_file_fails_to_open() {
        let mut reader = FileReader::new(PathBuf::from("/nonexistent/feed.mjpg"), 0);
        assert!(matches!(reader.open(), Err(SourceError::Connect(_))));
        assert!(matches!(reader.read_frame(), Err(SourceError::Connect(_))));
    }

    #[test]
    fn test_empty_file_reports_ended() {
        let file = write_mjpeg(&[]);
        let mut reader = FileReader::new(file.path().to_path_buf(), 0);
        assert_eq!(reader.read_frame().unwrap_err(), SourceError::Ended);
    }
}
