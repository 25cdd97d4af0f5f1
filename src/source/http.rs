//! HTTP camera reader
//!
//! Supports the two endpoints network cameras commonly expose:
//! - an MJPEG stream (`multipart/x-mixed-replace` body of JPEG parts)
//! - a snapshot URL returning one JPEG per request
//!
//! Snapshot endpoints are polled at most `source_fps` times per second. After
//! any failure the connection is dropped and re-opened on the next read, no
//! sooner than `reconnect_delay` after the previous attempt.

use std::io::Read;
use std::time::{Duration, Instant};

use image::RgbImage;

use super::reader::{frame_interval, FrameReader, ReaderConfig, SourceError};
use crate::media::jpeg::{decode_rgb, MjpegReader, MAX_JPEG_BYTES};

enum HttpStream {
    Mjpeg(MjpegReader<Box<dyn Read + Send + Sync>>),
    Snapshot,
}

/// Reads frames from an HTTP(S) camera endpoint
pub struct HttpReader {
    url: String,
    agent: ureq::Agent,
    reconnect_delay: Duration,
    interval: Duration,
    stream: Option<HttpStream>,
    /// Snapshot body received while opening, served by the next read
    pending: Option<Vec<u8>>,
    last_attempt: Option<Instant>,
    next_due: Option<Instant>,
}

impl HttpReader {
    /// Create a reader for `url`
    pub fn new(url: String, config: &ReaderConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.read_timeout)
            .timeout_read(config.read_timeout)
            .build();
        Self {
            url,
            agent,
            reconnect_delay: config.reconnect_delay,
            interval: frame_interval(config.source_fps),
            stream: None,
            pending: None,
            last_attempt: None,
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

    fn throttle(&mut self) {
        if let Some(last) = self.last_attempt {
            let elapsed = last.elapsed();
            if elapsed < self.reconnect_delay {
                std::thread::sleep(self.reconnect_delay - elapsed);
            }
        }
        self.last_attempt = Some(Instant::now());
    }

    fn fetch_snapshot(&self) -> Result<Vec<u8>, SourceError> {
        let response = self
            .agent
            .get(&self.url)
            .call()
            .map_err(|e| SourceError::Read(e.to_string()))?;
        read_snapshot(response)
    }
}

fn read_snapshot(response: ureq::Response) -> Result<Vec<u8>, SourceError> {
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_JPEG_BYTES as u64)
        .read_to_end(&mut bytes)
        .map_err(|e| SourceError::Read(e.to_string()))?;
    if bytes.is_empty() {
        return Err(SourceError::Read("empty jpeg snapshot".into()));
    }
    Ok(bytes)
}

impl FrameReader for HttpReader {
    fn open(&mut self) -> Result<(), SourceError> {
        self.throttle();

        let response = self
            .agent
            .get(&self.url)
            .call()
            .map_err(|e| SourceError::Connect(e.to_string()))?;

        let content_type = response.content_type().to_ascii_lowercase();
        self.stream = if content_type.contains("multipart") {
            Some(HttpStream::Mjpeg(MjpegReader::new(response.into_reader())))
        } else {
            self.pending = Some(read_snapshot(response)?);
            Some(HttpStream::Snapshot)
        };

        tracing::debug!(url = %self.url, content_type = %content_type, "HTTP source opened");
        Ok(())
    }

    fn read_frame(&mut self) -> Result<RgbImage, SourceError> {
        if self.stream.is_none() {
            self.open()?;
        }

        let jpeg = match self.stream {
            Some(HttpStream::Mjpeg(ref mut reader)) => reader
                .next_jpeg()
                .map_err(|e| SourceError::Read(e.to_string())),
            Some(HttpStream::Snapshot) => {
                self.pace();
                match self.pending.take() {
                    Some(body) => Ok(body),
                    None => self.fetch_snapshot(),
                }
            }
            None => Err(SourceError::Ended),
        };

        let jpeg = match jpeg {
            Ok(jpeg) => jpeg,
            Err(e) => {
                self.close();
                return Err(e);
            }
        };

        decode_rgb(&jpeg).map_err(|e| SourceError::Decode(e.to_string()))
    }

    fn close(&mut self) {
        self.stream = None;
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use image::Rgb;

    use super::*;
    use crate::media::jpeg::encode_rgb;

    fn config() -> ReaderConfig {
        ReaderConfig {
            reconnect_delay: Duration::from_millis(10),
            read_timeout: Duration::from_secs(2),
            ..Default::default()
        }
    }

    /// Serve one multipart response with `frames` parts, then close
    fn serve_mjpeg(frames: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request);

            let jpeg = encode_rgb(&RgbImage::from_pixel(6, 4, Rgb([1, 2, 3])), 80).unwrap();
            let _ = socket.write_all(
                b"HTTP/1.1 200 OK\r\n\
                  Content-Type: multipart/x-mixed-replace; boundary=frame\r\n\
                  Connection: close\r\n\r\n",
            );
            for _ in 0..frames {
                let _ = socket.write_all(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
                let _ = socket.write_all(&jpeg);
                let _ = socket.write_all(b"\r\n");
            }
        });

        format!("http://{}/stream", addr)
    }

    #[test]
    fn test_reads_mjpeg_stream() {
        let url = serve_mjpeg(2);
        let mut reader = HttpReader::new(url, &config());

        reader.open().unwrap();
        assert_eq!(reader.read_frame().unwrap().dimensions(), (6, 4));
        assert_eq!(reader.read_frame().unwrap().dimensions(), (6, 4));

        // Server closed the stream: the read fails and the reader disconnects
        assert!(reader.read_frame().is_err());
        assert!(reader.stream.is_none());
    }

    /// Answer every request with one JPEG, counting requests
    fn serve_snapshots() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&requests);

        std::thread::spawn(move || {
            let jpeg = encode_rgb(&RgbImage::from_pixel(4, 4, Rgb([7, 7, 7])), 80).unwrap();
            for socket in listener.incoming() {
                let Ok(mut socket) = socket else { break };
                let mut request = [0u8; 1024];
                let _ = socket.read(&mut request);
                counter.fetch_add(1, Ordering::SeqCst);

                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: image/jpeg\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n",
                    jpeg.len()
                );
                let _ = socket.write_all(head.as_bytes());
                let _ = socket.write_all(&jpeg);
            }
        });

        (format!("http://{}/snapshot.jpg", addr), requests)
    }

    #[test]
    fn test_snapshot_polling_is_paced() {
        let (url, requests) = serve_snapshots();
        let config = ReaderConfig {
            source_fps: 20,
            ..config()
        };
        let mut reader = HttpReader::new(url, &config);

        let window = Duration::from_millis(300);
        let started = Instant::now();
        let mut frames = 0;
        while started.elapsed() < window {
            assert_eq!(reader.read_frame().unwrap().dimensions(), (4, 4));
            frames += 1;
        }

        // One request per frame, the body fetched by open() included
        assert_eq!(requests.load(Ordering::SeqCst), frames);
        // 20 fps over 300 ms: the first frame plus one per 50 ms
        assert!(frames >= 2);
        assert!(frames <= 8, "{} snapshot requests in {:?}", frames, window);
    }

    #[test]
    fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut reader = HttpReader::new(format!("http://{}/stream", addr), &config());
        assert!(matches!(reader.open(), Err(SourceError::Connect(_))));
    }
}
