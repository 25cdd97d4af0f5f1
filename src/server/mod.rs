//! HTTP / WebSocket server
//!
//! Consumers connect over plain HTTP (`multipart/x-mixed-replace` MJPEG) or
//! WebSocket (one binary message per JPEG). Both share the same stream
//! registry and delivery loop.

pub mod config;
pub mod listener;
pub mod routes;

pub use config::ServerConfig;
pub use listener::VideoServer;
pub use routes::{router, AppState};
