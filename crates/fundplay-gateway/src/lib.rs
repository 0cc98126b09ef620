//! Connection gateway for fundplay.
//!
//! This crate sits between connections and rooms:
//!
//! 1. **Authentication**: who is on the other end ([`Authenticator`])
//! 2. **Binding**: which room and participant a connection speaks for
//!    ([`BindingTable`])
//! 3. **Presence**: how long a dropped participant keeps their seat
//!    before the room is told they left (reconnect grace)
//!
//! # How it fits in the stack
//!
//! ```text
//! Handler (above)   ← one task per connection, calls bind/dispatch/unbind
//!     ↕
//! Gateway (this crate)  ← connection → (room, participant) routing
//!     ↕
//! Room layer (below)  ← one actor per room, single writer
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod gateway;
mod presence;
mod table;

pub use auth::{Authenticator, OpenAuthenticator};
pub use error::GatewayError;
pub use gateway::Gateway;
pub use presence::{Binding, GatewayConfig, Presence};
pub use table::BindingTable;
