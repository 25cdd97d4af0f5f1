//! CCTV stream server binary
//!
//! Examples:
//!   cctv-stream-server                                  # binds to 0.0.0.0:8000, no streams
//!   cctv-stream-server --streams streams.toml           # load stream records from a file
//!   cctv-stream-server --bind 127.0.0.1:9000 --fps 15   # custom address and pacing
//!
//! ## Watching a stream
//!
//! In a browser or with ffplay:
//!   http://localhost:8000/video/<stream_id>
//!   ffplay http://localhost:8000/video/<stream_id>
//!
//! WebSocket clients connect to `ws://localhost:8000/ws/<stream_id>` and
//! receive one binary JPEG message per frame.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cctv_stream::media::{DEFAULT_BUFFER_CAPACITY, DEFAULT_JPEG_QUALITY};
use cctv_stream::{MemoryStore, MetadataStore, RegistryConfig, ServerConfig, TomlStore, VideoServer};

#[derive(Parser, Debug)]
#[command(name = "cctv-stream-server", about = "Live CCTV MJPEG / WebSocket stream server")]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "CCTV_BIND", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// TOML file with stream records (`[streams.<id>] video_source = "..."`)
    #[arg(long, env = "CCTV_STREAMS")]
    streams: Option<PathBuf>,

    /// Pending frames held per consumer
    #[arg(long, default_value_t = DEFAULT_BUFFER_CAPACITY)]
    buffer_capacity: usize,

    /// JPEG quality for re-encoded frames (1-100)
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY)]
    jpeg_quality: u8,

    /// Delivery frame rate per consumer
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Maximum concurrent streaming consumers (0 = unlimited)
    #[arg(long, env = "CCTV_MAX_CONNECTIONS", default_value_t = 0)]
    max_connections: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let store: Arc<dyn MetadataStore> = match cli.streams {
        Some(ref path) => {
            let store = TomlStore::load(path)?;
            tracing::info!(
                path = %path.display(),
                streams = store.list().len(),
                "Loaded stream records"
            );
            Arc::new(store)
        }
        None => {
            tracing::warn!("No stream file given, every stream id will be unknown");
            Arc::new(MemoryStore::new())
        }
    };

    let config = ServerConfig::default()
        .bind(cli.bind)
        .max_connections(cli.max_connections);
    let registry_config = RegistryConfig::default()
        .buffer_capacity(cli.buffer_capacity)
        .jpeg_quality(cli.jpeg_quality)
        .target_fps(cli.fps);

    let server = VideoServer::with_registry_config(config, store, registry_config);

    // Run with Ctrl+C handling
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}
