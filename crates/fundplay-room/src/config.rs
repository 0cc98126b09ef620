//! Room and registry configuration.

use std::time::Duration;

use fundplay_protocol::{
    ClaimVerification, FullHouseOrdering, QuizQuestion, RoomSettings,
};
use fundplay_scheduler::SchedulerConfig;

use crate::RoomError;

// ---------------------------------------------------------------------------
// QuizConfig
// ---------------------------------------------------------------------------

/// Shape of a quiz.
#[derive(Debug, Clone)]
pub struct QuizConfig {
    /// Number of rounds.
    pub total_rounds: u32,
    /// Questions per round.
    pub questions_per_round: u32,
    /// Countdown for each question.
    pub time_limit: Duration,
    /// Points for a correct answer.
    pub points_per_correct: u32,
    /// Questions in play order.
    pub questions: Vec<QuizQuestion>,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            total_rounds: 3,
            questions_per_round: 10,
            time_limit: Duration::from_secs(30),
            points_per_correct: 1,
            questions: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration for one room.
///
/// The server holds a default; each `CreateRoom` may override parts of
/// it through [`RoomSettings`].
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Roster cap, host excluded.
    pub max_players: usize,
    /// Players needed before the host may start.
    pub min_players: usize,
    /// Autoplay draw cadence.
    pub autoplay_interval: Duration,
    /// Whether claims are checked against the call history.
    pub claim_verification: ClaimVerification,
    /// Line/full-house ordering.
    pub full_house_ordering: FullHouseOrdering,
    /// Propose a claim when a player's marks complete a category.
    pub auto_claim: bool,
    /// Maximum participants named in one claim.
    pub max_claimants: usize,
    /// Room lifetime; after it elapses anyone may end the game.
    pub lifetime: Option<Duration>,
    /// Capacity of the room's command queue.
    pub command_buffer: usize,
    /// Fixed RNG seed for cards and draws. `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Quiz shape.
    pub quiz: QuizConfig,
    /// Timer limits.
    pub scheduler: SchedulerConfig,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_players: Self::MAX_PLAYERS_LIMIT,
            min_players: 1,
            autoplay_interval: Duration::from_secs(4),
            claim_verification: ClaimVerification::default(),
            full_house_ordering: FullHouseOrdering::default(),
            auto_claim: true,
            max_claimants: 3,
            lifetime: None,
            command_buffer: 64,
            seed: None,
            quiz: QuizConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl RoomConfig {
    /// Hard cap on `max_players`.
    pub const MAX_PLAYERS_LIMIT: usize = 1000;

    /// Longest room lifetime a client may ask for: 30 days.
    pub const MAX_LIFETIME: Duration = Duration::from_secs(30 * 24 * 60 * 60);

    /// Applies client overrides and validates the result.
    ///
    /// # Errors
    /// Returns [`RoomError::InvalidConfig`] if the merged config is unusable.
    pub fn with_settings(
        mut self,
        settings: &RoomSettings,
    ) -> Result<Self, RoomError> {
        if let Some(max) = settings.max_players {
            self.max_players = max;
        }
        if let Some(ms) = settings.autoplay_interval_ms {
            self.autoplay_interval = Duration::from_millis(ms);
        }
        if let Some(verification) = settings.claim_verification {
            self.claim_verification = verification;
        }
        if let Some(ordering) = settings.full_house_ordering {
            self.full_house_ordering = ordering;
        }
        if let Some(auto_claim) = settings.auto_claim {
            self.auto_claim = auto_claim;
        }
        if let Some(max) = settings.max_claimants {
            self.max_claimants = max;
        }
        if let Some(secs) = settings.expires_in_secs {
            self.lifetime = Some(Duration::from_secs(secs));
        }
        if let Some(quiz) = &settings.quiz {
            self.quiz.total_rounds = quiz.total_rounds;
            self.quiz.questions_per_round = quiz.questions_per_round;
            self.quiz.time_limit = Duration::from_secs(u64::from(quiz.time_limit_secs));
            self.quiz.questions = quiz.questions.clone();
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks every bound.
    ///
    /// # Errors
    /// Returns [`RoomError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), RoomError> {
        let fail = |msg: &str| Err(RoomError::InvalidConfig(msg.to_owned()));

        if self.max_players == 0 || self.max_players > Self::MAX_PLAYERS_LIMIT {
            return fail("max_players must be between 1 and 1000");
        }
        if self.min_players > self.max_players {
            return fail("min_players exceeds max_players");
        }
        if self.autoplay_interval < self.scheduler.min_draw_interval {
            return fail("autoplay interval is below the scheduler minimum");
        }
        if self.max_claimants == 0 {
            return fail("max_claimants must be at least 1");
        }
        if self.lifetime.is_some_and(|l| l.is_zero() || l > Self::MAX_LIFETIME) {
            return fail("room lifetime must be between 1 second and 30 days");
        }
        if self.command_buffer == 0 {
            return fail("command_buffer must be positive");
        }
        let quiz = &self.quiz;
        if quiz.total_rounds == 0 || quiz.questions_per_round == 0 {
            return fail("quiz needs at least one round and one question");
        }
        if quiz.time_limit < std::time::Duration::from_secs(1)
            || quiz.time_limit > self.scheduler.max_question_limit
        {
            return fail("question time limit out of range");
        }
        for q in &quiz.questions {
            if q.correct_option.is_some_and(|c| c >= q.options.len()) {
                return fail("correct_option points past the options");
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

/// Housekeeping for the room registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// A room with no activity for this long is removed.
    pub idle_timeout: Duration,
    /// A finished room stays listed this long so late clients can resync.
    pub finished_linger: Duration,
    /// How often the sweeper runs.
    pub sweep_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(2 * 60 * 60),
            finished_linger: Duration::from_secs(5 * 60),
            sweep_interval: Duration::from_secs(30),
        }
    }
}
