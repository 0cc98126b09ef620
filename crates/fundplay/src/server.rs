//! `FundplayServer` builder and server loop.
//!
//! This is the entry point for running a fundplay server. It ties
//! together all the layers: transport → protocol → gateway → room.

use std::sync::Arc;
use std::time::Duration;

use fundplay_gateway::{Authenticator, Gateway};
use fundplay_protocol::{Codec, JsonCodec};
use fundplay_room::{LogSettlement, RoomRegistry, SettlementBridge};
use fundplay_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{FundplayError, ServerConfig};

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<A: Authenticator, C: Codec> {
    pub(crate) gateway: Arc<Gateway>,
    pub(crate) auth: A,
    pub(crate) codec: C,
    pub(crate) handshake_timeout: Duration,
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting a fundplay server.
///
/// # Example
///
/// ```rust,ignore
/// let server = FundplayServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .settlement(Arc::new(MyLedger::connect().await?))
///     .build(OpenAuthenticator)
///     .await?;
/// server.run().await
/// ```
pub struct FundplayServerBuilder {
    config: ServerConfig,
    settlement: Arc<dyn SettlementBridge>,
}

impl FundplayServerBuilder {
    /// Creates a new builder with default settings. Settlement is only
    /// logged until [`settlement`](Self::settlement) is set.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            settlement: Arc::new(LogSettlement),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Replaces the whole configuration, bind address included.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets where finished games' winners are sent.
    pub fn settlement(mut self, bridge: Arc<dyn SettlementBridge>) -> Self {
        self.settlement = bridge;
        self
    }

    /// Binds the listener and assembles the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<A: Authenticator>(
        self,
        auth: A,
    ) -> Result<FundplayServer<A, JsonCodec>, FundplayError> {
        let ServerConfig {
            bind_addr,
            handshake_timeout,
            idle_timeout,
            room,
            registry,
            gateway,
        } = self.config;

        let transport = WebSocketTransport::bind(&bind_addr).await?;

        let registry = Arc::new(RoomRegistry::new(room, registry, self.settlement));
        let gateway = Arc::new(Gateway::new(Arc::clone(&registry), gateway));

        let state = Arc::new(ServerState {
            gateway,
            auth,
            codec: JsonCodec,
            handshake_timeout,
            idle_timeout,
        });

        Ok(FundplayServer {
            transport,
            registry,
            state,
        })
    }
}

impl Default for FundplayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound fundplay server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct FundplayServer<A: Authenticator, C: Codec> {
    transport: WebSocketTransport,
    registry: Arc<RoomRegistry>,
    state: Arc<ServerState<A, C>>,
}

impl<A, C> FundplayServer<A, C>
where
    A: Authenticator,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The room registry, for operator actions such as `end_room`.
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Runs the server accept loop.
    ///
    /// Starts the registry and gateway sweepers, then accepts connections
    /// and spawns a handler task for each. Runs until the process is
    /// terminated.
    pub async fn run(mut self) -> Result<(), FundplayError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "fundplay server running");

        tokio::spawn(Arc::clone(&self.registry).run_sweeper());
        tokio::spawn(Arc::clone(&self.state.gateway).run_sweeper());

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
