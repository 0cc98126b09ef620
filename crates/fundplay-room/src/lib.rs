//! Rooms for fundplay.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! session state, its connections' outbound channels, and its progression
//! timer. Nothing inside a room is shared, so nothing inside a room is
//! locked.
//!
//! # Key types
//!
//! - [`RoomSession`]: the bingo / quiz state machine, free of I/O
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomRegistry`]: creates rooms, looks them up, sweeps them away
//! - [`SettlementBridge`]: where final winners go once a room finishes
//! - [`RoomConfig`]: per-room settings and their defaults

mod bingo;
mod config;
mod error;
mod evaluator;
mod quiz;
mod registry;
mod room;
mod roster;
mod session;
mod settlement;

pub use config::{QuizConfig, RegistryConfig, RoomConfig};
pub use error::{RoomError, SettlementError};
pub use registry::{RemovalReason, RoomLifecycle, RoomRegistry};
pub use room::{ParticipantSender, RoomHandle, RoomInfo, RoomOutbound};
pub use session::{Issuer, LeaveReason, Outcome, RoomSession, TimerDirective};
pub use settlement::{LogSettlement, SettlementBridge, SettlementRequest};
