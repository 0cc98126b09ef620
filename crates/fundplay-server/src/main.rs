//! Fundplay server binary.
//!
//! Reads `FUNDPLAY_*` settings from the environment (and a `.env` file if
//! present), then serves rooms until killed. Participants authenticate with
//! their wallet address or guest id as the handshake token.
//!
//! Logging respects `RUST_LOG`; the default is `info` for fundplay crates.

use fundplay::prelude::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_FILTER: &str = "warn,fundplay=info,fundplay_gateway=info,fundplay_room=info,fundplay_server=info";

#[tokio::main]
async fn main() -> Result<(), FundplayError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "invalid configuration");
    })?;
    tracing::info!(
        addr = %config.bind_addr,
        reconnect_grace = ?config.gateway.reconnect_grace,
        max_players = config.room.max_players,
        "starting fundplay server"
    );

    let server = FundplayServerBuilder::new()
        .config(config)
        .build(OpenAuthenticator)
        .await?;

    server.run().await
}
