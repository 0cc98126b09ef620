//! Hand-off of final winners to the settlement backend.
//!
//! When a room reaches `Ended` or `Complete` its actor spawns one
//! [`SettlementBridge::settle`] call and moves on. The result never
//! changes game state; a failure is reported to the host as a
//! `settlementFailed` event.

use futures_util::future::BoxFuture;
use fundplay_protocol::{GameMode, ParticipantId, RoomId, Standing};
use tracing::info;

use crate::SettlementError;

/// Final winners of one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementRequest {
    /// The finished room.
    pub room_id: RoomId,
    /// Its game mode.
    pub mode: GameMode,
    /// Awards in order: line then full house, or quiz places 1 to 3.
    pub standings: Vec<Standing>,
}

impl SettlementRequest {
    /// All winner ids, award by award.
    pub fn winner_ids(&self) -> Vec<ParticipantId> {
        self.standings
            .iter()
            .flat_map(|s| s.winners.iter().cloned())
            .collect()
    }
}

/// Pays out a finished room.
///
/// Implementations must be cheap to share; the registry holds one behind
/// an `Arc` and every room calls it at most once.
pub trait SettlementBridge: Send + Sync + 'static {
    /// Settles `request`.
    fn settle(&self, request: SettlementRequest) -> BoxFuture<'static, Result<(), SettlementError>>;
}

/// Logs the winners and reports success.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSettlement;

impl SettlementBridge for LogSettlement {
    fn settle(&self, request: SettlementRequest) -> BoxFuture<'static, Result<(), SettlementError>> {
        Box::pin(async move {
            let winners: Vec<String> = request
                .winner_ids()
                .iter()
                .map(ToString::to_string)
                .collect();
            info!(
                room_id = %request.room_id,
                mode = %request.mode,
                winners = ?winners,
                "room settled"
            );
            Ok(())
        })
    }
}
