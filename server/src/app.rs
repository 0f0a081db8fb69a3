//! Application lifecycle: startup, serving and graceful shutdown.
//!
//! 1. **Build**: initialise storage once, install metrics, wire state, bind the listener
//! 2. **Run**: serve until Ctrl+C or SIGTERM
//! 3. **Shutdown**: tear storage down explicitly within `SHUTDOWN_TIMEOUT`

use crate::config::Config;
use crate::server::{AppState, build_router};
use crate::storage::Storage;
use eventease_core::environment::SystemClock;
use eventease_runtime::metrics::MetricsServer;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// A configured server, ready to run.
pub struct Application {
    listener: TcpListener,
    router: axum::Router,
    storage: Arc<Storage>,
    config: Config,
}

impl Application {
    /// Initialise every resource and bind the listener.
    ///
    /// # Errors
    ///
    /// Returns error if storage cannot be initialised, the metrics recorder
    /// cannot be installed, or the address cannot be bound.
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let storage = Arc::new(Storage::connect(&config.storage).await?);
        info!(backend = storage.backend_name(), "Storage initialised");

        let mut metrics = MetricsServer::new();
        if config.metrics_enabled {
            metrics.start()?;
        }

        let state = AppState::new(
            Arc::clone(&storage),
            Arc::new(SystemClock),
            &config.booking,
            Arc::new(metrics),
        );
        let router = build_router(state);

        let listener = TcpListener::bind(config.bind_address()).await?;
        info!(address = %listener.local_addr()?, "Listener bound");

        Ok(Self {
            listener,
            router,
            storage,
            config,
        })
    }

    /// Address the server is listening on.
    ///
    /// # Errors
    ///
    /// Returns error if the socket has no local address.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until a shutdown signal arrives, then release storage.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP server fails.
    pub async fn run(self) -> anyhow::Result<()> {
        info!("HTTP server listening for requests");
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("HTTP server stopped, releasing storage");
        let timeout = self.config.shutdown_timeout();
        if tokio::time::timeout(timeout, self.storage.shutdown()).await.is_err() {
            warn!(timeout_secs = timeout.as_secs(), "Storage shutdown timed out");
        }

        info!("Graceful shutdown complete");
        Ok(())
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
