//! Capture state machine
//!
//! Tracks one frame source from thread start to shutdown:
//!
//! ```text
//!   Connecting ──ok──► Streaming ◄──ok── Stalled
//!       │                  │                ▲
//!       └──read failure────┴──read failure──┘
//!
//!   any state ──stop()──► Stopped (terminal)
//! ```
//!
//! The state and counters live in a `SourceStatus` shared between the
//! capture thread (writer) and the registry / stats endpoints (readers).

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::stats::CaptureStats;

/// Lifecycle state of a frame source
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    /// Thread started, no frame read yet
    Connecting,
    /// Last read succeeded
    Streaming,
    /// Last read failed; retrying
    Stalled,
    /// Capture thread has exited or was asked to
    Stopped,
}

impl CaptureState {
    fn as_u8(self) -> u8 {
        match self {
            CaptureState::Connecting => 0,
            CaptureState::Streaming => 1,
            CaptureState::Stalled => 2,
            CaptureState::Stopped => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => CaptureState::Connecting,
            1 => CaptureState::Streaming,
            2 => CaptureState::Stalled,
            _ => CaptureState::Stopped,
        }
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(self, next: CaptureState) -> bool {
        use CaptureState::*;
        matches!(
            (self, next),
            (Connecting, Streaming)
                | (Connecting, Stalled)
                | (Streaming, Stalled)
                | (Stalled, Streaming)
                | (Connecting, Stopped)
                | (Streaming, Stopped)
                | (Stalled, Stopped)
        )
    }
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CaptureState::Connecting => "connecting",
            CaptureState::Streaming => "streaming",
            CaptureState::Stalled => "stalled",
            CaptureState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Shared state and counters of one frame source
#[derive(Debug)]
pub struct SourceStatus {
    state: AtomicU8,
    frames_captured: AtomicU64,
    frames_published: AtomicU64,
    read_failures: AtomicU64,
    encode_failures: AtomicU64,
    started_at: Instant,
    last_frame_at: Mutex<Option<Instant>>,
    last_error: Mutex<Option<String>>,
}

impl SourceStatus {
    /// Create a status in the `Connecting` state
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(CaptureState::Connecting.as_u8()),
            frames_captured: AtomicU64::new(0),
            frames_published: AtomicU64::new(0),
            read_failures: AtomicU64::new(0),
            encode_failures: AtomicU64::new(0),
            started_at: Instant::now(),
            last_frame_at: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    /// Current state
    pub fn state(&self) -> CaptureState {
        CaptureState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Attempt a state transition
    ///
    /// Returns false (and leaves the state unchanged) if the transition is
    /// not legal from the current state, including same-state transitions.
    pub fn transition(&self, next: CaptureState) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if !CaptureState::from_u8(current).can_transition_to(next) {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                next.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Whether the source has reached `Stopped`
    pub fn is_stopped(&self) -> bool {
        self.state() == CaptureState::Stopped
    }

    /// Record a successfully captured and published frame
    pub(crate) fn record_frame(&self, delivered_to: usize) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
        if delivered_to > 0 {
            self.frames_published.fetch_add(1, Ordering::Relaxed);
        }
        *self.last_frame_at.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
    }

    /// Record a failed read
    pub(crate) fn record_read_failure(&self, error: &str) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(error.to_string());
    }

    /// Record a frame that could not be encoded
    pub(crate) fn record_encode_failure(&self, error: &str) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(error.to_string());
    }

    /// Frames captured and encoded so far
    pub fn frames_captured(&self) -> u64 {
        self.frames_captured.load(Ordering::Relaxed)
    }

    /// Read failures so far
    pub fn read_failures(&self) -> u64 {
        self.read_failures.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> CaptureStats {
        let last_frame_at = *self.last_frame_at.lock().unwrap_or_else(|e| e.into_inner());
        CaptureStats {
            state: self.state(),
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            uptime_secs: self.started_at.elapsed().as_secs(),
            last_frame_age_ms: last_frame_at.map(|t| t.elapsed().as_millis() as u64),
            last_error: self
                .last_error
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
        }
    }
}

impl Default for SourceStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let status = SourceStatus::new();
        assert_eq!(status.state(), CaptureState::Connecting);

        assert!(status.transition(CaptureState::Streaming));
        assert!(status.transition(CaptureState::Stalled));
        assert!(status.transition(CaptureState::Streaming));
        assert!(status.transition(CaptureState::Stopped));
        assert!(status.is_stopped());
    }

    #[test]
    fn test_open_failure_enters_stalled() {
        let status = SourceStatus::new();
        assert!(status.transition(CaptureState::Stalled));
        assert_eq!(status.state(), CaptureState::Stalled);
    }

    #[test]
    fn test_stopped_is_terminal() {
        let status = SourceStatus::new();
        assert!(status.transition(CaptureState::Stopped));

        assert!(!status.transition(CaptureState::Streaming));
        assert!(!status.transition(CaptureState::Stalled));
        assert!(!status.transition(CaptureState::Stopped));
        assert!(status.is_stopped());
    }

    #[test]
    fn test_same_state_is_not_a_transition() {
        let status = SourceStatus::new();
        assert!(status.transition(CaptureState::Stalled));
        assert!(!status.transition(CaptureState::Stalled));
    }

    #[test]
    fn test_cannot_return_to_connecting() {
        let status = SourceStatus::new();
        assert!(status.transition(CaptureState::Streaming));
        assert!(!status.transition(CaptureState::Connecting));
    }

    #[test]
    fn test_counters_in_snapshot() {
        let status = SourceStatus::new();
        status.record_frame(2);
        status.record_frame(0);
        status.record_read_failure("timed out");
        status.record_encode_failure("bad image");

        let stats = status.snapshot();
        assert_eq!(stats.frames_captured, 2);
        assert_eq!(stats.frames_published, 1);
        assert_eq!(stats.read_failures, 1);
        assert_eq!(stats.encode_failures, 1);
        assert_eq!(stats.last_error.as_deref(), Some("bad image"));
        assert!(stats.last_frame_age_ms.is_some());
    }
}
