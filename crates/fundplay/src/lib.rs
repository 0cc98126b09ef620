//! # fundplay
//!
//! Live fundraising bingo and quiz rooms over WebSocket.
//!
//! A host creates a room, players join, and the room's single-writer actor
//! runs the game: dealing cards, calling numbers, issuing questions, and
//! refereeing win claims. When a game ends the winners go to a
//! [`SettlementBridge`](fundplay_room::SettlementBridge).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fundplay::prelude::*;
//!
//! # async fn run() -> Result<(), FundplayError> {
//! let server = FundplayServerBuilder::new()
//!     .config(ServerConfig::from_env()?)
//!     .build(OpenAuthenticator)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::FundplayError;
pub use server::{FundplayServer, FundplayServerBuilder, PROTOCOL_VERSION};

/// Everything needed to run a server and talk to it.
pub mod prelude {
    pub use crate::{
        FundplayError, FundplayServer, FundplayServerBuilder, PROTOCOL_VERSION, ServerConfig,
    };
    pub use fundplay_gateway::{Authenticator, GatewayConfig, GatewayError, OpenAuthenticator};
    pub use fundplay_protocol::{
        ClientCommand, Codec, Envelope, GameMode, JsonCodec, ParticipantId, Payload, Phase,
        RejectReason, Role, RoomId, RoomListEntry, RoomSettings, RoomSnapshot, ServerEvent,
        SystemMessage, WinCategory,
    };
    pub use fundplay_room::{
        LogSettlement, RegistryConfig, RoomConfig, RoomError, SettlementBridge, SettlementError,
        SettlementRequest,
    };
}
