//! Stream registry implementation
//!
//! The central registry that owns every live stream session. Attaching the
//! first consumer of a stream starts its capture thread; detaching the last
//! one stops it and removes the session.
//!
//! All session bookkeeping happens under one short-held `Mutex`. The metadata
//! lookup is done before the lock is taken, and capture threads are joined
//! after it is released.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::watch;

use super::config::RegistryConfig;
use super::entry::StreamSession;
use super::error::StreamError;
use super::frame::{Frame, StreamId};
use crate::media::{ConsumerId, FrameBuffer};
use crate::metadata::{MetadataStore, SourceDescriptor, StreamRecord};
use crate::source::SourceStatus;
use crate::stats::StreamStats;

/// Central registry for all live stream sessions
pub struct StreamRegistry {
    /// Where stream ids are resolved to video sources
    store: Arc<dyn MetadataStore>,

    /// Map of stream id to running session
    sessions: Mutex<HashMap<StreamId, StreamSession>>,

    /// Configuration
    config: RegistryConfig,

    /// Set once shutdown begins; no attach succeeds afterwards
    shutting_down: AtomicBool,

    next_consumer_id: AtomicU64,
    next_generation: AtomicU64,

    /// Broadcasts `true` to every delivery loop on shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl StreamRegistry {
    /// Create a new registry with default configuration
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self::with_config(store, RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(store: Arc<dyn MetadataStore>, config: RegistryConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            store,
            sessions: Mutex::new(HashMap::new()),
            config,
            shutting_down: AtomicBool::new(false),
            next_consumer_id: AtomicU64::new(1),
            next_generation: AtomicU64::new(1),
            shutdown_tx,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Metadata record of a stream
    pub fn lookup(&self, id: &StreamId) -> Option<StreamRecord> {
        self.store.lookup(id)
    }

    /// Records of every active stream
    pub fn list_active(&self) -> Vec<StreamRecord> {
        self.store
            .list()
            .into_iter()
            .filter(StreamRecord::is_active)
            .collect()
    }

    /// Resolve a stream id to its video source
    ///
    /// Never starts a capture thread.
    pub fn resolve(&self, id: &StreamId) -> Result<SourceDescriptor, StreamError> {
        let record = self
            .store
            .lookup(id)
            .ok_or_else(|| StreamError::NotFound(id.clone()))?;

        let uri = record
            .source()
            .ok_or_else(|| StreamError::NoSource(id.clone()))?;

        SourceDescriptor::parse(uri).map_err(|scheme| {
            tracing::warn!(stream = %id, scheme = %scheme, "Unsupported video source");
            StreamError::UnsupportedSource(id.clone(), scheme)
        })
    }

    /// Attach a consumer to a stream
    ///
    /// Starts the stream's capture thread if this is the first consumer. The
    /// returned `Attachment` detaches itself when dropped.
    pub fn attach(self: &Arc<Self>, id: &StreamId) -> Result<Attachment, StreamError> {
        if self.is_shutting_down() {
            return Err(StreamError::ShutdownInProgress);
        }

        let descriptor = self.resolve(id)?;
        let consumer = self.next_consumer_id.fetch_add(1, Ordering::Relaxed);

        let mut sessions = self.lock_sessions();

        // Re-checked under the lock: shutdown drains the map while holding it
        if self.is_shutting_down() {
            return Err(StreamError::ShutdownInProgress);
        }

        if !sessions.contains_key(id) {
            let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
            let session =
                StreamSession::start(id.clone(), descriptor.clone(), generation, &self.config)
                    .map_err(|e| {
                        tracing::error!(stream = %id, error = %e, "Failed to spawn capture thread");
                        StreamError::CaptureFailed(id.clone(), e.to_string())
                    })?;

            tracing::info!(
                stream = %id,
                source = %descriptor,
                generation = generation,
                "Session started"
            );
            sessions.insert(id.clone(), session);
        }

        let Some(session) = sessions.get_mut(id) else {
            return Err(StreamError::NotFound(id.clone()));
        };
        let buffer = session.attach(consumer);

        tracing::info!(
            stream = %id,
            consumer = consumer,
            consumers = session.consumer_count(),
            "Consumer attached"
        );

        Ok(Attachment {
            registry: Arc::clone(self),
            stream: id.clone(),
            consumer,
            generation: session.generation,
            buffer,
        })
    }

    /// Detach a consumer from a stream
    ///
    /// Stops and removes the session when its last consumer leaves. Unknown
    /// streams and consumers are ignored. Returns true if a session was
    /// stopped.
    pub fn detach(&self, id: &StreamId, consumer: ConsumerId) -> bool {
        let stopped = {
            let mut sessions = self.lock_sessions();

            let Some(session) = sessions.get_mut(id) else {
                return false;
            };

            let remaining = session.detach(consumer);
            tracing::info!(
                stream = %id,
                consumer = consumer,
                consumers = remaining,
                "Consumer detached"
            );

            if remaining > 0 {
                return false;
            }
            sessions.remove(id)
        };

        match stopped {
            Some(session) => {
                tracing::info!(stream = %id, "Last consumer left, stopping session");
                self.reap(session);
                true
            }
            None => false,
        }
    }

    /// Stop every session and refuse new consumers
    ///
    /// Delivery loops are signalled through the shutdown channel. Capture
    /// threads share one deadline of `join_timeout`. Returns the number of
    /// sessions stopped. Blocks; call from a blocking context.
    pub fn shutdown(&self) -> usize {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return 0;
        }
        self.shutdown_tx.send_replace(true);

        let drained: Vec<StreamSession> = {
            let mut sessions = self.lock_sessions();
            sessions.drain().map(|(_, session)| session).collect()
        };

        tracing::info!(sessions = drained.len(), "Registry shutting down");

        for session in &drained {
            session.stop();
        }

        let deadline = Instant::now() + self.config.join_timeout;
        let count = drained.len();
        for mut session in drained {
            let remaining = deadline.saturating_duration_since(Instant::now());
            session.join(remaining);
        }

        count
    }

    /// Whether shutdown has begun
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Receiver that flips to `true` when shutdown begins
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.lock_sessions().len()
    }

    /// Whether a stream has a live session
    pub fn is_running(&self, id: &StreamId) -> bool {
        self.lock_sessions()
            .get(id)
            .map(StreamSession::is_running)
            .unwrap_or(false)
    }

    /// Consumers attached to a stream, if it has a session
    pub fn consumer_count(&self, id: &StreamId) -> Option<usize> {
        self.lock_sessions().get(id).map(StreamSession::consumer_count)
    }

    /// Capture status of a stream, if it has a session
    pub fn source_status(&self, id: &StreamId) -> Option<Arc<SourceStatus>> {
        self.lock_sessions()
            .get(id)
            .map(|session| Arc::clone(session.status()))
    }

    /// Statistics for one stream
    pub fn stream_stats(&self, id: &StreamId) -> Option<StreamStats> {
        self.lock_sessions().get(id).map(StreamSession::stats)
    }

    /// Statistics for every live stream, ordered by id
    pub fn all_stats(&self) -> Vec<StreamStats> {
        let mut stats: Vec<StreamStats> =
            self.lock_sessions().values().map(StreamSession::stats).collect();
        stats.sort_by(|a, b| a.stream_id.cmp(&b.stream_id));
        stats
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<StreamId, StreamSession>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wait for a removed session's capture thread off the async runtime
    fn reap(&self, mut session: StreamSession) {
        session.stop();
        let timeout = self.config.join_timeout;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || {
                    session.join(timeout);
                });
            }
            Err(_) => {
                session.join(timeout);
            }
        }
    }
}

/// A consumer's handle on a stream
///
/// Holds the consumer's frame buffer. Dropping it detaches the consumer, so
/// every exit path of a delivery loop releases its slot exactly once.
pub struct Attachment {
    registry: Arc<StreamRegistry>,
    stream: StreamId,
    consumer: ConsumerId,
    generation: u64,
    buffer: Arc<FrameBuffer>,
}

impl Attachment {
    /// Stream this consumer is attached to
    pub fn stream(&self) -> &StreamId {
        &self.stream
    }

    /// Consumer id, unique across the registry
    pub fn consumer(&self) -> ConsumerId {
        self.consumer
    }

    /// Generation of the session this consumer joined
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Take the oldest pending frame, if any
    pub fn latest(&self) -> Option<Frame> {
        self.buffer.latest()
    }

    /// The consumer's frame buffer
    pub fn buffer(&self) -> &Arc<FrameBuffer> {
        &self.buffer
    }

    /// Delay between delivery-loop iterations
    pub fn pacing_interval(&self) -> Duration {
        self.registry.config.pacing_interval
    }

    /// Receiver that flips to `true` when the server shuts down
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.registry.shutdown_signal()
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        self.registry.detach(&self.stream, self.consumer);
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("stream", &self.stream)
            .field("consumer", &self.consumer)
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MemoryStore;
    use crate::source::{CaptureState, ReaderConfig};

    fn test_registry() -> Arc<StreamRegistry> {
        let store = MemoryStore::from_records(vec![
            StreamRecord::new("cam1", "stub://cam1"),
            StreamRecord::without_source("cam2"),
            StreamRecord::new("cam3", "rtsp://10.0.0.3/live"),
            StreamRecord::new("cam4", "stub://cam4"),
        ]);
        let config = RegistryConfig::default()
            .join_timeout(Duration::from_secs(2))
            .reader_config(ReaderConfig {
                source_fps: 200,
                synthetic_size: (8, 8),
                ..Default::default()
            });
        Arc::new(StreamRegistry::with_config(Arc::new(store), config))
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_resolve() {
        let registry = test_registry();

        let descriptor = registry.resolve(&StreamId::new("cam1")).unwrap();
        assert_eq!(descriptor.uri, "stub://cam1");

        assert_eq!(
            registry.resolve(&StreamId::new("nope")),
            Err(StreamError::NotFound(StreamId::new("nope")))
        );
        assert_eq!(
            registry.resolve(&StreamId::new("cam2")),
            Err(StreamError::NoSource(StreamId::new("cam2")))
        );
        assert!(matches!(
            registry.resolve(&StreamId::new("cam3")),
            Err(StreamError::UnsupportedSource(_, scheme)) if scheme == "rtsp"
        ));
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn test_shared_session_lifecycle() {
        let registry = test_registry();
        let id = StreamId::new("cam1");

        let first = registry.attach(&id).unwrap();
        let second = registry.attach(&id).unwrap();
        assert_eq!(registry.session_count(), 1);
        assert_eq!(registry.consumer_count(&id), Some(2));
        assert_eq!(first.generation(), second.generation());
        assert_ne!(first.consumer(), second.consumer());

        let status = registry.source_status(&id).unwrap();

        drop(first);
        assert!(registry.is_running(&id));
        assert_eq!(registry.consumer_count(&id), Some(1));

        drop(second);
        assert!(!registry.is_running(&id));
        assert_eq!(registry.session_count(), 0);
        assert!(wait_for(|| status.is_stopped()));
    }

    #[test]
    fn test_attach_missing_source() {
        let registry = test_registry();

        let err = registry.attach(&StreamId::new("cam2")).unwrap_err();
        assert_eq!(err, StreamError::NoSource(StreamId::new("cam2")));
        assert_eq!(err.reason(), "No video source");
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn test_attach_unknown_stream() {
        let registry = test_registry();
        let _running = registry.attach(&StreamId::new("cam1")).unwrap();

        let err = registry.attach(&StreamId::new("ghost")).unwrap_err();
        assert_eq!(err.reason(), "Stream not found");
        assert_eq!(registry.session_count(), 1);
        assert!(registry.source_status(&StreamId::new("ghost")).is_none());
    }

    #[test]
    fn test_attach_unsupported_source() {
        let registry = test_registry();

        let err = registry.attach(&StreamId::new("cam3")).unwrap_err();
        assert_eq!(err.reason(), "Unsupported video source");
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn test_reattach_creates_fresh_session() {
        let registry = test_registry();
        let id = StreamId::new("cam1");

        let first = registry.attach(&id).unwrap();
        let old_generation = first.generation();
        let old_status = registry.source_status(&id).unwrap();
        drop(first);

        let second = registry.attach(&id).unwrap();
        let new_status = registry.source_status(&id).unwrap();

        assert_ne!(second.generation(), old_generation);
        assert!(!Arc::ptr_eq(&old_status, &new_status));
        assert!(wait_for(|| old_status.is_stopped()));
        assert!(registry.is_running(&id));
    }

    #[test]
    fn test_consumers_receive_every_frame() {
        let registry = test_registry();
        let id = StreamId::new("cam1");

        let a = registry.attach(&id).unwrap();
        let b = registry.attach(&id).unwrap();

        assert!(wait_for(|| a.buffer().len() >= 3 && b.buffer().len() >= 3));

        let frame_a = a.latest().unwrap();
        let frame_b = b.latest().unwrap();
        assert_eq!(&frame_a.data[..2], &[0xFF, 0xD8]);
        assert!(frame_a.sequence >= 1 && frame_b.sequence >= 1);
    }

    #[test]
    fn test_independent_streams() {
        let registry = test_registry();

        let cam1 = registry.attach(&StreamId::new("cam1")).unwrap();
        let cam4 = registry.attach(&StreamId::new("cam4")).unwrap();
        assert_eq!(registry.session_count(), 2);

        drop(cam1);
        assert_eq!(registry.session_count(), 1);
        assert!(registry.is_running(&StreamId::new("cam4")));

        let stats = registry.all_stats();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].stream_id, "cam4");
        assert_eq!(stats[0].consumers, 1);
        drop(cam4);
    }

    #[test]
    fn test_detach_unknown_is_noop() {
        let registry = test_registry();
        let id = StreamId::new("cam1");
        let attachment = registry.attach(&id).unwrap();

        assert!(!registry.detach(&StreamId::new("ghost"), 1));
        assert!(!registry.detach(&id, attachment.consumer() + 1000));
        assert_eq!(registry.consumer_count(&id), Some(1));
    }

    #[test]
    fn test_shutdown_stops_all_sessions() {
        let registry = test_registry();
        let mut signal = registry.shutdown_signal();

        let cam1 = registry.attach(&StreamId::new("cam1")).unwrap();
        let cam4 = registry.attach(&StreamId::new("cam4")).unwrap();
        let status = registry.source_status(&StreamId::new("cam1")).unwrap();

        assert_eq!(registry.shutdown(), 2);
        assert_eq!(registry.session_count(), 0);
        assert!(status.is_stopped());
        assert_eq!(status.state(), CaptureState::Stopped);
        assert!(*signal.borrow_and_update());

        // New consumers are refused
        assert_eq!(
            registry.attach(&StreamId::new("cam1")).unwrap_err(),
            StreamError::ShutdownInProgress
        );

        // Late detaches are harmless
        drop(cam1);
        drop(cam4);
        assert_eq!(registry.session_count(), 0);

        // Second shutdown is a no-op
        assert_eq!(registry.shutdown(), 0);
    }

    #[tokio::test]
    async fn test_detach_inside_runtime() {
        let registry = test_registry();
        let id = StreamId::new("cam1");

        let attachment = registry.attach(&id).unwrap();
        let status = registry.source_status(&id).unwrap();
        drop(attachment);

        assert_eq!(registry.session_count(), 0);

        let deadline = Instant::now() + Duration::from_secs(5);
        while !status.is_stopped() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(status.is_stopped());
    }

    #[test]
    fn test_list_active() {
        let mut inactive = StreamRecord::new("cam9", "stub://cam9");
        inactive.status = "inactive".into();
        let store = MemoryStore::from_records(vec![
            StreamRecord::new("cam1", "stub://cam1"),
            inactive,
        ]);
        let registry = StreamRegistry::new(Arc::new(store));

        let active = registry.list_active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "cam1");
    }
}
