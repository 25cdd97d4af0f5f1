//! HTTP routes
//!
//! | Route                   | Response                                      |
//! |-------------------------|-----------------------------------------------|
//! | `GET /`                 | service banner                                |
//! | `GET /streams`          | active stream records                         |
//! | `GET /stream/:id`       | one stream record                             |
//! | `GET /stats`            | live session statistics                       |
//! | `GET /video/:stream_id` | `multipart/x-mixed-replace` MJPEG             |
//! | `GET /ws/:stream_id`    | WebSocket, one binary message per JPEG frame  |
//!
//! Attach errors are reported before any frame is sent: as a JSON
//! `{"error": reason}` body over HTTP, or one text message over WebSocket.

use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::delivery::{run_delivery, websocket, FrameSink, MultipartSink, WsSink};
use crate::delivery::multipart;
use crate::registry::{StreamError, StreamId, StreamRegistry};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    registry: Arc<StreamRegistry>,
    limiter: Option<Arc<Semaphore>>,
}

impl AppState {
    /// Create handler state; `max_connections` of 0 means unlimited
    pub fn new(registry: Arc<StreamRegistry>, max_connections: usize) -> Self {
        let limiter = if max_connections > 0 {
            Some(Arc::new(Semaphore::new(max_connections)))
        } else {
            None
        };
        Self { registry, limiter }
    }

    /// The stream registry
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// Take a consumer slot, held until the delivery loop ends
    fn acquire(&self) -> Result<Option<OwnedSemaphorePermit>, StreamError> {
        match self.limiter {
            Some(ref sem) => match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Ok(Some(permit)),
                Err(_) => Err(StreamError::ConnectionLimit),
            },
            None => Ok(None),
        }
    }
}

impl StreamError {
    /// HTTP status reported for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            StreamError::NotFound(_) => StatusCode::NOT_FOUND,
            StreamError::NoSource(_) | StreamError::UnsupportedSource(..) => {
                StatusCode::BAD_REQUEST
            }
            StreamError::CaptureFailed(..) => StatusCode::INTERNAL_SERVER_ERROR,
            StreamError::ShutdownInProgress | StreamError::ConnectionLimit => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

impl IntoResponse for StreamError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.reason() }))).into_response()
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/streams", get(list_streams))
        .route("/stream/:stream_id", get(get_stream))
        .route("/stats", get(stats))
        .route("/video/:stream_id", get(video))
        .route("/ws/:stream_id", get(ws))
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "CCTV Streaming Server" }))
}

async fn list_streams(State(state): State<AppState>) -> Response {
    Json(state.registry.list_active()).into_response()
}

async fn get_stream(State(state): State<AppState>, Path(stream_id): Path<String>) -> Response {
    let id = StreamId::new(stream_id);
    match state.registry.lookup(&id) {
        Some(record) => Json(record).into_response(),
        None => StreamError::NotFound(id).into_response(),
    }
}

async fn stats(State(state): State<AppState>) -> Response {
    Json(state.registry.all_stats()).into_response()
}

async fn video(State(state): State<AppState>, Path(stream_id): Path<String>) -> Response {
    let id = StreamId::new(stream_id);

    let attached = state
        .acquire()
        .and_then(|permit| Ok((permit, state.registry.attach(&id)?)));
    let (permit, attachment) = match attached {
        Ok(attached) => attached,
        Err(e) => {
            tracing::warn!(stream = %id, error = %e, "MJPEG request rejected");
            return e.into_response();
        }
    };

    let (mut sink, body) = MultipartSink::channel();
    tokio::spawn(async move {
        let _permit = permit;
        run_delivery(attachment, &mut sink).await;
    });

    (
        [
            (header::CONTENT_TYPE, multipart::CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
        ],
        body,
    )
        .into_response()
}

async fn ws(
    State(state): State<AppState>,
    Path(stream_id): Path<String>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let id = StreamId::new(stream_id);
    upgrade.on_upgrade(move |socket| stream_ws(state, id, socket))
}

async fn stream_ws(state: AppState, id: StreamId, socket: WebSocket) {
    let attached = state
        .acquire()
        .and_then(|permit| Ok((permit, state.registry.attach(&id)?)));
    let (_permit, attachment) = match attached {
        Ok(attached) => attached,
        Err(e) => {
            tracing::warn!(stream = %id, error = %e, "WebSocket request rejected");
            websocket::reject(socket, &e).await;
            return;
        }
    };

    let mut sink = WsSink::new(socket);
    run_delivery(attachment, &mut sink).await;
    sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let id = StreamId::new("cam");

        assert_eq!(StreamError::NotFound(id.clone()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(StreamError::NoSource(id.clone()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            StreamError::UnsupportedSource(id, "rtsp".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            StreamError::ShutdownInProgress.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            StreamError::ConnectionLimit.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_error_response() {
        let response = StreamError::NotFound(StreamId::new("cam9")).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
    }

    #[test]
    fn test_limiter() {
        let store = Arc::new(crate::metadata::MemoryStore::new());
        let state = AppState::new(Arc::new(StreamRegistry::new(store)), 1);

        let first = state.acquire().unwrap();
        assert!(first.is_some());
        assert_eq!(state.acquire().unwrap_err(), StreamError::ConnectionLimit);

        drop(first);
        assert!(state.acquire().unwrap().is_some());
    }

    #[test]
    fn test_unlimited() {
        let store = Arc::new(crate::metadata::MemoryStore::new());
        let state = AppState::new(Arc::new(StreamRegistry::new(store)), 0);

        assert!(state.acquire().unwrap().is_none());
    }
}
