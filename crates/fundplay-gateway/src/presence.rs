//! Presence types: what the gateway remembers about a participant's
//! connection to a room.
//!
//! A participant in a room is either reachable through a bound connection,
//! waiting out their reconnect grace, or gone. Only the last step is
//! reported to the room as a departure.

use std::time::Duration;

use fundplay_protocol::{ParticipantId, Role, RoomId};
use fundplay_transport::ConnectionId;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// GatewayConfig
// ---------------------------------------------------------------------------

/// Configuration for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// How long a dropped participant keeps their seat before the room is
    /// told they left. Zero removes them on the next sweep.
    ///
    /// Default: 30 seconds.
    pub reconnect_grace: Duration,

    /// How often expired presences are swept.
    ///
    /// Default: 5 seconds.
    pub sweep_interval: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            reconnect_grace: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(5),
        }
    }
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

/// A participant's presence in one room.
///
/// ```text
///   Bound ──(unbind)──→ Grace ──(timeout)──→ Expired
///     ↑                   │
///     └──────(bind)───────┘
/// ```
///
/// `Instant` is tokio's clock so paused-time tests can drive the grace
/// period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Reachable through this connection.
    Bound { connection: ConnectionId },

    /// Connection lost at `since`; the seat is held until
    /// `since + reconnect_grace`.
    Grace { since: Instant },

    /// Grace elapsed. The room has been (or is about to be) told.
    Expired,
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

/// What a bound connection speaks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// The connection.
    pub connection: ConnectionId,
    /// The room it is bound to.
    pub room_id: RoomId,
    /// The participant it acts as.
    pub participant: ParticipantId,
    /// The participant's role in that room, fixed at bind time.
    pub role: Role,
}
