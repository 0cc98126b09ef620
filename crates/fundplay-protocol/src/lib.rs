//! Wire protocol for fundplay.
//!
//! - **Types** ([`Envelope`], [`SystemMessage`], ids, game vocabulary):
//!   what travels on the wire.
//! - **Commands / events** ([`ClientCommand`], [`ServerEvent`],
//!   [`RoomSnapshot`]): the closed variant sets a room understands and
//!   emits.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames become bytes.
//! - **Errors** ([`ProtocolError`], [`RejectReason`]).
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Gateway (binding) → Room
//! ```

mod codec;
mod command;
mod error;
mod event;
mod reject;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use command::ClientCommand;
pub use error::ProtocolError;
pub use event::{
    Award, CategoryWinners, DealtCard, ParticipantView, QuestionView,
    QuizProgress, RoomSnapshot, ScoreEntry, ServerEvent, Standing, WinClaim,
};
pub use reject::RejectReason;
pub use types::{
    BALL_COUNT, BingoCard, CARD_SIZE, COLUMN_SPAN, ClaimVerification,
    Envelope, FullHouseOrdering, GameMode, Liveness, ParticipantId, Payload,
    PauseReason, Phase, QuizQuestion, QuizSettings, Recipient, Role, RoomId,
    RoomListEntry, RoomSettings, SystemMessage, WinCategory,
};
