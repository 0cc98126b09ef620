//! Progression scheduler for fundplay rooms.
//!
//! Each room owns one [`ProgressionScheduler`]. It holds at most one
//! outstanding timer: the next autoplay draw (bingo) or the current
//! question's countdown (quiz). Arming a timer replaces whatever was
//! armed before, and [`cancel`](ProgressionScheduler::cancel) disarms it.
//!
//! # Integration
//!
//! The scheduler sits inside the room actor's `tokio::select!` loop, next
//! to the command queue. Because the actor owns it and cancels it in the
//! same step that changes phase, a timer can never fire into a state it
//! was not armed for:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = commands.recv() => { /* may arm or cancel */ }
//!         fired = scheduler.wait_for_fire() => {
//!             /* handled exactly like a queued command */
//!         }
//!     }
//! }
//! ```
//!
//! Every arm returns a fresh generation number; [`Fired`] carries it back
//! so callers can double-check with [`ProgressionScheduler::is_current`].

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Scheduler limits.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Shortest allowed autoplay draw interval. Shorter requests are
    /// clamped up to this.
    pub min_draw_interval: Duration,
    /// Longest allowed question countdown. Longer requests are clamped
    /// down to this.
    pub max_question_limit: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_draw_interval: Duration::from_millis(500),
            max_question_limit: Duration::from_secs(600),
        }
    }
}

impl SchedulerConfig {
    /// Fix out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`ProgressionScheduler::new`].
    pub fn validated(mut self) -> Self {
        if self.min_draw_interval.is_zero() {
            warn!("min_draw_interval of zero would spin; using 1ms");
            self.min_draw_interval = Duration::from_millis(1);
        }
        if self.max_question_limit < Duration::from_secs(1) {
            warn!(
                limit_ms = self.max_question_limit.as_millis() as u64,
                "max_question_limit below one second; raising"
            );
            self.max_question_limit = Duration::from_secs(1);
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Timer kinds and firings
// ---------------------------------------------------------------------------

/// What an armed timer is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Draw the next bingo number.
    Draw,
    /// A quiz question's countdown elapsed.
    QuestionCountdown {
        /// Round the question belongs to.
        round: u32,
        /// Question index within the round.
        question_index: u32,
    },
}

/// A timer that fired, returned by [`ProgressionScheduler::wait_for_fire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    /// Generation assigned when the timer was armed.
    pub generation: u64,
    /// What the timer was for.
    pub kind: TimerKind,
    /// How late the wakeup was.
    pub late_by: Duration,
}

/// Counters for tests and diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Timers armed.
    pub armed: u64,
    /// Timers that fired.
    pub fired: u64,
    /// Timers disarmed by `cancel`.
    pub cancelled: u64,
    /// Timers replaced by a later arm before firing.
    pub superseded: u64,
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    generation: u64,
    kind: TimerKind,
    deadline: Instant,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// One-shot, single-slot timer owned by a room actor.
pub struct ProgressionScheduler {
    config: SchedulerConfig,
    armed: Option<Armed>,
    generation: u64,
    stats: SchedulerStats,
}

impl ProgressionScheduler {
    /// Creates an idle scheduler.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config: config.validated(),
            armed: None,
            generation: 0,
            stats: SchedulerStats::default(),
        }
    }

    /// Arms the next autoplay draw `interval` from now, replacing any
    /// outstanding timer. Returns the new generation.
    pub fn schedule_next_draw(&mut self, interval: Duration) -> u64 {
        let interval = interval.max(self.config.min_draw_interval);
        self.arm(TimerKind::Draw, interval)
    }

    /// Arms a question countdown `limit` from now, replacing any
    /// outstanding timer. Returns the new generation.
    pub fn arm_question_timer(
        &mut self,
        limit: Duration,
        round: u32,
        question_index: u32,
    ) -> u64 {
        let limit = limit.min(self.config.max_question_limit);
        self.arm(
            TimerKind::QuestionCountdown {
                round,
                question_index,
            },
            limit,
        )
    }

    fn arm(&mut self, kind: TimerKind, after: Duration) -> u64 {
        if let Some(previous) = self.armed.take() {
            self.stats.superseded += 1;
            trace!(
                generation = previous.generation,
                kind = ?previous.kind,
                "timer superseded"
            );
        }
        self.generation += 1;
        self.stats.armed += 1;
        self.armed = Some(Armed {
            generation: self.generation,
            kind,
            deadline: Instant::now() + after,
        });
        debug!(
            generation = self.generation,
            ?kind,
            after_ms = after.as_millis() as u64,
            "timer armed"
        );
        self.generation
    }

    /// Disarms the outstanding timer. Returns `true` if one was armed.
    pub fn cancel(&mut self) -> bool {
        match self.armed.take() {
            Some(armed) => {
                self.stats.cancelled += 1;
                debug!(generation = armed.generation, kind = ?armed.kind, "timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Waits for the armed timer and disarms it.
    ///
    /// With nothing armed this future pends forever, which lets the
    /// actor's `select!` keep serving its command queue. Dropping the
    /// future before it completes leaves the timer armed.
    pub async fn wait_for_fire(&mut self) -> Fired {
        let Some(armed) = self.armed else {
            return std::future::pending().await;
        };

        time::sleep_until(armed.deadline).await;

        self.armed = None;
        self.stats.fired += 1;
        let late_by = Instant::now().saturating_duration_since(armed.deadline);
        trace!(generation = armed.generation, kind = ?armed.kind, "timer fired");

        Fired {
            generation: armed.generation,
            kind: armed.kind,
            late_by,
        }
    }

    /// Returns `true` if `generation` is the currently armed timer.
    pub fn is_current(&self, generation: u64) -> bool {
        self.armed.is_some_and(|a| a.generation == generation)
    }

    /// Whether a timer is armed.
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// The kind of the armed timer, if any.
    pub fn armed_kind(&self) -> Option<TimerKind> {
        self.armed.map(|a| a.kind)
    }

    /// The most recently issued generation (0 before the first arm).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Lifetime counters.
    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }
}

impl Default for ProgressionScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}
