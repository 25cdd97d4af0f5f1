//! Video server listener
//!
//! Binds the HTTP listener and serves the routes. On shutdown the listener
//! stops accepting, the registry is shut down (cancelling every delivery
//! loop and joining every capture thread) and in-flight connections get a
//! bounded time to finish.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::error::Result;
use crate::metadata::MetadataStore;
use crate::registry::{RegistryConfig, StreamRegistry};
use crate::server::config::ServerConfig;
use crate::server::routes::{router, AppState};

/// MJPEG / WebSocket video server
pub struct VideoServer {
    config: ServerConfig,
    registry: Arc<StreamRegistry>,
}

impl VideoServer {
    /// Create a new server with the given configuration and metadata store
    pub fn new(config: ServerConfig, store: Arc<dyn MetadataStore>) -> Self {
        Self::with_registry_config(config, store, RegistryConfig::default())
    }

    /// Create a new server with custom registry configuration
    pub fn with_registry_config(
        config: ServerConfig,
        store: Arc<dyn MetadataStore>,
        registry_config: RegistryConfig,
    ) -> Self {
        Self {
            config,
            registry: Arc::new(StreamRegistry::with_config(store, registry_config)),
        }
    }

    /// Get a reference to the stream registry
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Application router sharing this server's registry
    pub fn router(&self) -> Router {
        router(AppState::new(
            Arc::clone(&self.registry),
            self.config.max_connections,
        ))
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Video server listening");

        let registry = Arc::clone(&self.registry);
        let (stopped_tx, stopped_rx) = oneshot::channel();
        let signal = async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");

            match tokio::task::spawn_blocking(move || registry.shutdown()).await {
                Ok(sessions) => tracing::info!(sessions = sessions, "Sessions stopped"),
                Err(e) => tracing::error!(error = %e, "Registry shutdown failed"),
            }
            let _ = stopped_tx.send(());
        };

        let server = axum::serve(listener, self.router())
            .with_graceful_shutdown(signal)
            .into_future();
        tokio::pin!(server);

        tokio::select! {
            result = &mut server => result?,
            Ok(()) = stopped_rx => {
                match tokio::time::timeout(self.config.shutdown_timeout, &mut server).await {
                    Ok(result) => result?,
                    Err(_) => tracing::warn!(
                        timeout_secs = self.config.shutdown_timeout.as_secs(),
                        "Connections still open after shutdown timeout"
                    ),
                }
            }
        }

        tracing::info!("Video server stopped");
        Ok(())
    }
}
