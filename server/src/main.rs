//! EventEase HTTP server.
//!
//! ```bash
//! STORAGE_BACKEND=postgres DATABASE_URL=postgres://localhost/eventease cargo run --bin eventease
//! ```

use eventease_server::{Application, Config};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_new(&config.server.log_level)
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        address = %config.bind_address(),
        backend = ?config.storage.backend,
        "Starting EventEase server"
    );

    let app = Application::build(config).await?;
    app.run().await
}
