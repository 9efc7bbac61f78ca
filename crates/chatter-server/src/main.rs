//! # Chatter
//!
//! Single-topic realtime broadcast relay.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! chatter
//!
//! # Run with environment variables
//! CHATTER_PORT=8080 CHATTER_HOST=0.0.0.0 chatter
//! ```
//!
//! Configuration is also read from `chatter.toml` if present; see
//! [`chatter_server::config`].

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatter_server::{config, handlers, metrics};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatter=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting Chatter relay on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
