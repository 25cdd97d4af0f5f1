//! JPEG helpers
//!
//! This module provides:
//! - Fixed-quality JPEG encoding of decoded RGB images
//! - JPEG decoding into RGB
//! - Extraction of individual JPEG images from an MJPEG byte stream
//!   (multipart HTTP bodies or concatenated `.mjpg` files)

use std::io::Read;

use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};

/// Default JPEG quality used for re-encoding captured frames
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Upper bound on one JPEG image inside an MJPEG stream
pub const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];
const READ_CHUNK: usize = 8192;

/// Encode an RGB image as JPEG at the given quality (1-100)
pub fn encode_rgb(image: &RgbImage, quality: u8) -> image::ImageResult<Vec<u8>> {
    let mut out = Vec::with_capacity(image.as_raw().len() / 8);
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    encoder.encode_image(image)?;
    Ok(out)
}

/// Decode a JPEG payload into an RGB image
pub fn decode_rgb(bytes: &[u8]) -> image::ImageResult<RgbImage> {
    Ok(image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)?.into_rgb8())
}

/// Locate the first complete JPEG image (SOI..=EOI) in `buffer`
///
/// Header segments are skipped by their length field, so an EOI inside an
/// APPn payload (an EXIF thumbnail) does not end the image. The EOI search
/// starts at the entropy-coded data after SOS. Returns the byte range
/// `(start, end)` with `end` exclusive.
pub fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = buffer.windows(2).position(|w| w == SOI)?;
    let scan_from = match scan_start(buffer, start + 2) {
        Segments::ScanData(offset) => offset,
        Segments::Incomplete => return None,
        // Not a well-formed header: fall back to the first EOI after SOI
        Segments::Malformed => start + 2,
    };
    let end = buffer[scan_from..]
        .windows(2)
        .position(|w| w == EOI)
        .map(|offset| scan_from + offset + 2)?;
    Some((start, end))
}

/// Result of walking the header segments that follow SOI
#[derive(Debug, PartialEq, Eq)]
enum Segments {
    /// Offset of the first byte after the SOS header (or of an early EOI)
    ScanData(usize),
    /// More bytes are needed before the header can be walked
    Incomplete,
    /// The bytes after SOI are not marker segments
    Malformed,
}

fn scan_start(buffer: &[u8], mut pos: usize) -> Segments {
    loop {
        let Some(&prefix) = buffer.get(pos) else {
            return Segments::Incomplete;
        };
        if prefix != 0xFF {
            return Segments::Malformed;
        }
        let Some(&marker) = buffer.get(pos + 1) else {
            return Segments::Incomplete;
        };

        match marker {
            // Fill byte before a marker
            0xFF => pos += 1,
            // Standalone markers carry no length
            0x01 | 0xD0..=0xD7 => pos += 2,
            0xD9 => return Segments::ScanData(pos),
            0x00 | 0xD8 => return Segments::Malformed,
            _ => {
                let Some(length) = buffer.get(pos + 2..pos + 4) else {
                    return Segments::Incomplete;
                };
                let length = u16::from_be_bytes([length[0], length[1]]) as usize;
                if length < 2 {
                    return Segments::Malformed;
                }
                let next = pos + 2 + length;
                if marker == 0xDA {
                    return if next <= buffer.len() {
                        Segments::ScanData(next)
                    } else {
                        Segments::Incomplete
                    };
                }
                pos = next;
            }
        }
    }
}

/// Error returned by [`MjpegReader::next_jpeg`]
#[derive(Debug)]
pub enum MjpegError {
    /// Underlying read failed
    Io(std::io::Error),
    /// The byte stream ended before another complete image
    Ended,
}

impl std::fmt::Display for MjpegError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MjpegError::Io(e) => write!(f, "mjpeg read failed: {}", e),
            MjpegError::Ended => write!(f, "mjpeg stream ended"),
        }
    }
}

impl std::error::Error for MjpegError {}

/// Splits a byte stream of back-to-back JPEG images into single images
///
/// Multipart boundaries and part headers between images are skipped, since
/// only the JPEG markers are used to delimit frames.
pub struct MjpegReader<R> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: Read> MjpegReader<R> {
    /// Wrap a reader
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
        }
    }

    /// Read until the next complete JPEG image and return it
    pub fn next_jpeg(&mut self) -> Result<Vec<u8>, MjpegError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let jpeg = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                return Ok(jpeg);
            }

            let read = self.reader.read(&mut chunk).map_err(MjpegError::Io)?;
            if read == 0 {
                return Err(MjpegError::Ended);
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            // Garbage with no end marker: keep only a tail that may hold a SOI
            if self.buffer.len() > MAX_JPEG_BYTES * 2 {
                let keep = 2.min(self.buffer.len());
                let drain_len = self.buffer.len() - keep;
                self.buffer.drain(..drain_len);
            }
        }
    }
}
