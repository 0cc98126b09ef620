//! The room session state machine.
//!
//! [`RoomSession`] is plain data: it never awaits, never touches a
//! channel, and never reads the clock on its own. The room actor feeds it
//! one input at a time and carries out the returned [`Outcome`] (events to
//! deliver, a timer directive, an optional settlement).
//!
//! Every refused input leaves the session untouched.

use std::time::Duration;

use fundplay_protocol::{
    ClientCommand, DealtCard, GameMode, Liveness, ParticipantId, PauseReason, Phase,
    Recipient, RejectReason, Role, RoomId, RoomSnapshot, ServerEvent, WinCategory, WinClaim,
};
use fundplay_scheduler::TimerKind;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::bingo::{CallHistory, deal_card};
use crate::config::RoomConfig;
use crate::evaluator::{self, ClaimBook, ClaimContext, ClaimPolicy, Proposal, Withdrawal};
use crate::quiz::{self, QuizState};
use crate::roster::{Participant, Roster, clean_name};
use crate::settlement::SettlementRequest;

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// Who issued a command, as established by the connection's binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issuer {
    pub participant: ParticipantId,
    pub role: Role,
}

/// What the actor should do with the room's timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerDirective {
    /// Leave it as is.
    #[default]
    Keep,
    /// Disarm it.
    Cancel,
    /// Arm the next autoplay draw.
    ScheduleDraw(Duration),
    /// Arm a question countdown.
    ArmQuestion {
        limit: Duration,
        round: u32,
        question_index: u32,
    },
}

/// Effects of one accepted input.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Events in delivery order.
    pub events: Vec<(Recipient, ServerEvent)>,
    pub timer: TimerDirective,
    /// Set exactly once per room, on the transition into a terminal phase.
    pub settlement: Option<SettlementRequest>,
    /// An informational code for the issuer alongside a successful change.
    pub notice: Option<RejectReason>,
}

impl Outcome {
    fn push(&mut self, to: Recipient, event: ServerEvent) {
        self.events.push((to, event));
    }

    fn broadcast(&mut self, event: ServerEvent) {
        self.push(Recipient::All, event);
    }

    fn is_empty(&self) -> bool {
        self.events.is_empty() && self.settlement.is_none()
    }
}

/// How a participant left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveReason {
    /// They sent `leave`.
    Explicit,
    /// Their reconnect grace period ran out.
    GraceExpired,
}

// ---------------------------------------------------------------------------
// RoomSession
// ---------------------------------------------------------------------------

/// Authoritative state of one room.
pub struct RoomSession {
    room_id: RoomId,
    mode: GameMode,
    host: ParticipantId,
    config: RoomConfig,
    phase: Phase,
    pause_reason: Option<PauseReason>,
    autoplay: bool,
    revision: u64,
    roster: Roster,
    history: CallHistory,
    claims: ClaimBook,
    quiz: QuizState,
    rng: StdRng,
    created_at: Instant,
    last_activity: Instant,
    ended_at: Option<Instant>,
}

impl RoomSession {
    /// Creates a room in `Waiting` with the host as its only participant.
    ///
    /// # Errors
    /// [`RejectReason::InvalidCommand`] if the host name is empty or too long.
    pub fn new(
        room_id: RoomId,
        host: ParticipantId,
        host_name: &str,
        mode: GameMode,
        config: RoomConfig,
        now: Instant,
    ) -> Result<Self, RejectReason> {
        let name = clean_name(host_name).ok_or(RejectReason::InvalidCommand)?;
        let mut roster = Roster::default();
        roster.insert(Participant::new(host.clone(), name, Role::Host));

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            room_id,
            mode,
            host,
            phase: Phase::Waiting,
            pause_reason: None,
            autoplay: false,
            revision: 0,
            roster,
            history: CallHistory::new(),
            claims: ClaimBook::default(),
            quiz: QuizState::new(&config.quiz),
            rng,
            created_at: now,
            last_activity: now,
            ended_at: None,
            config,
        })
    }

    // -- Accessors ----------------------------------------------------------

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn host(&self) -> &ParticipantId {
        &self.host
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn autoplay(&self) -> bool {
        self.autoplay
    }

    pub fn max_players(&self) -> usize {
        self.config.max_players
    }

    /// Roster size, host included.
    pub fn participant_count(&self) -> usize {
        self.roster.len()
    }

    pub fn role_of(&self, participant: &ParticipantId) -> Option<Role> {
        self.roster.get(participant).map(|p| p.role)
    }

    pub fn liveness_of(&self, participant: &ParticipantId) -> Option<Liveness> {
        self.roster.get(participant).map(|p| p.liveness)
    }

    /// Numbers drawn so far, in draw order.
    pub fn called(&self) -> &[u8] {
        self.history.as_slice()
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn ended_at(&self) -> Option<Instant> {
        self.ended_at
    }

    /// When the lifetime runs out. `None` without a lifetime, or if the
    /// deadline is past what `Instant` can represent.
    pub fn expires_at(&self) -> Option<Instant> {
        self.config
            .lifetime
            .and_then(|l| self.created_at.checked_add(l))
    }

    /// Whether the room's lifetime has run out.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at().is_some_and(|at| now >= at)
    }

    /// The full state every client converges to.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.room_id.clone(),
            mode: self.mode,
            host: self.host.clone(),
            phase: self.phase,
            pause_reason: self.pause_reason,
            autoplay: self.autoplay,
            revision: self.revision,
            participants: self.roster.views(),
            called: self.history.as_slice().to_vec(),
            pending_claim: self.claims.pending().cloned(),
            winners: self.claims.confirmed().to_vec(),
            quiz: (self.mode == GameMode::Quiz).then(|| self.quiz.progress()),
            question: self.quiz.current_view().cloned(),
            question_open: self.quiz.is_open(),
        }
    }

    // -- Inputs -------------------------------------------------------------

    /// Adds `participant` to the roster, or marks a returning one connected.
    ///
    /// Rejoining never duplicates a roster entry and ignores `name`.
    ///
    /// # Errors
    /// `InvalidTransition` once the game has started (for newcomers),
    /// `RoomFull` at the player cap, `InvalidCommand` for a bad name.
    pub fn join(
        &mut self,
        participant: &ParticipantId,
        name: &str,
        now: Instant,
    ) -> Result<(Role, Outcome), RejectReason> {
        let result = self.join_inner(participant, name)?;
        self.touch(now, &result.1);
        Ok(result)
    }

    fn join_inner(
        &mut self,
        participant: &ParticipantId,
        name: &str,
    ) -> Result<(Role, Outcome), RejectReason> {
        let mut outcome = Outcome::default();

        if let Some(existing) = self.roster.get_mut(participant) {
            let role = existing.role;
            if existing.liveness != Liveness::Connected {
                existing.liveness = Liveness::Connected;
                outcome.push(
                    Recipient::AllExcept(participant.clone()),
                    ServerEvent::LivenessChanged {
                        participant_id: participant.clone(),
                        liveness: Liveness::Connected,
                    },
                );
            }
            debug!(room_id = %self.room_id, %participant, "participant rejoined");
            return Ok((role, outcome));
        }

        if !self.phase.is_joinable() {
            return Err(RejectReason::InvalidTransition);
        }
        if self.roster.player_count() >= self.config.max_players {
            return Err(RejectReason::RoomFull);
        }
        let name = clean_name(name).ok_or(RejectReason::InvalidCommand)?;

        let entry = Participant::new(participant.clone(), name, Role::Player);
        let view = entry.view();
        self.roster.insert(entry);
        outcome.push(
            Recipient::AllExcept(participant.clone()),
            ServerEvent::ParticipantJoined { participant: view },
        );
        info!(
            room_id = %self.room_id,
            %participant,
            players = self.roster.player_count(),
            "participant joined"
        );
        Ok((Role::Player, outcome))
    }

    /// Applies one client command.
    ///
    /// Authorization is checked before anything else: the issuer must be on
    /// the roster with the role its binding claims, and host-only commands
    /// need the host (termination is open to everyone once the room has
    /// expired).
    ///
    /// # Errors
    /// The reason code for the issuer. Nothing has changed.
    pub fn apply(
        &mut self,
        issuer: &Issuer,
        command: ClientCommand,
        now: Instant,
    ) -> Result<Outcome, RejectReason> {
        let role = match (&command, self.role_of(&issuer.participant)) {
            (_, Some(role)) => role,
            (ClientCommand::Join { .. }, None) => Role::Player,
            (_, None) => return Err(RejectReason::NotInRoom),
        };
        if role != issuer.role {
            return Err(RejectReason::Unauthorized);
        }
        if command.is_host_only()
            && role != Role::Host
            && !(command.is_termination() && self.is_expired(now))
        {
            return Err(RejectReason::Unauthorized);
        }
        if self.phase.is_terminal()
            && !matches!(
                command,
                ClientCommand::Join { .. }
                    | ClientCommand::Leave
                    | ClientCommand::EndGame
                    | ClientCommand::EndQuiz
            )
        {
            return Err(RejectReason::InvalidTransition);
        }

        let participant = &issuer.participant;
        let outcome = match command {
            ClientCommand::Join { name } => self.join_inner(participant, &name).map(|(_, o)| o),
            ClientCommand::Leave => self.leave_inner(participant, LeaveReason::Explicit),
            ClientCommand::SetReady { ready } => self.set_ready(participant, ready),
            ClientCommand::StartGame => self.start(GameMode::Bingo),
            ClientCommand::StartQuiz => self.start(GameMode::Quiz),
            ClientCommand::DrawNumber => self.draw_number(),
            ClientCommand::ToggleAutoplay => self.toggle_autoplay(),
            ClientCommand::ProposeWin {
                category,
                claimants,
            } => self.propose_win(participant, role, category, claimants),
            ClientCommand::ConfirmWin { category } => self.confirm_win(category, now),
            ClientCommand::RejectWin { category } => self.reject_win(category),
            ClientCommand::NextQuestion => self.next_question(),
            ClientCommand::NextRound => self.next_round(),
            ClientCommand::EndGame => self.end(GameMode::Bingo, now),
            ClientCommand::EndQuiz => self.end(GameMode::Quiz, now),
            ClientCommand::MarkCell { number } => self.mark_cell(participant, number),
            ClientCommand::SubmitAnswer { option } => self.submit_answer(participant, option),
        }?;

        self.touch(now, &outcome);
        Ok(outcome)
    }

    /// Handles a fired timer. `None` if it no longer applies.
    pub fn on_timer(&mut self, kind: TimerKind, now: Instant) -> Option<Outcome> {
        let outcome = match kind {
            TimerKind::Draw => {
                if self.mode != GameMode::Bingo || self.phase != Phase::Active || !self.autoplay {
                    return None;
                }
                self.draw_number().ok()?
            }
            TimerKind::QuestionCountdown {
                round,
                question_index,
            } => {
                if self.phase != Phase::QuestionActive || !self.quiz.time_up(round, question_index)
                {
                    return None;
                }
                let mut outcome = Outcome::default();
                outcome.broadcast(ServerEvent::QuestionTimeUp {
                    round,
                    question_index,
                });
                outcome
            }
        };
        self.touch(now, &outcome);
        Some(outcome)
    }

    /// Marks a participant's connection as lost. `None` if unknown or
    /// already disconnected.
    pub fn disconnect(&mut self, participant: &ParticipantId, now: Instant) -> Option<Outcome> {
        let entry = self.roster.get_mut(participant)?;
        if entry.liveness != Liveness::Connected {
            return None;
        }
        entry.liveness = Liveness::GracePeriod;

        let mut outcome = Outcome::default();
        outcome.push(
            Recipient::AllExcept(participant.clone()),
            ServerEvent::LivenessChanged {
                participant_id: participant.clone(),
                liveness: Liveness::GracePeriod,
            },
        );
        debug!(room_id = %self.room_id, %participant, "participant in grace period");
        self.touch(now, &outcome);
        Some(outcome)
    }

    /// Removes a participant. The host stays on the roster as `removed`.
    ///
    /// # Errors
    /// `NotInRoom` if the participant is not on the roster.
    pub fn leave(
        &mut self,
        participant: &ParticipantId,
        reason: LeaveReason,
        now: Instant,
    ) -> Result<Outcome, RejectReason> {
        let outcome = self.leave_inner(participant, reason)?;
        self.touch(now, &outcome);
        Ok(outcome)
    }

    fn leave_inner(
        &mut self,
        participant: &ParticipantId,
        reason: LeaveReason,
    ) -> Result<Outcome, RejectReason> {
        let role = self.role_of(participant).ok_or(RejectReason::NotInRoom)?;
        let mut outcome = Outcome::default();

        if role == Role::Host {
            if let Some(host) = self.roster.get_mut(participant) {
                host.liveness = Liveness::Removed;
            }
            outcome.broadcast(ServerEvent::LivenessChanged {
                participant_id: participant.clone(),
                liveness: Liveness::Removed,
            });
            info!(room_id = %self.room_id, %participant, ?reason, "host left");
            return Ok(outcome);
        }

        self.roster.remove(participant);
        outcome.broadcast(ServerEvent::ParticipantLeft {
            participant_id: participant.clone(),
        });
        info!(room_id = %self.room_id, %participant, ?reason, "participant left");

        match self.claims.withdraw(participant) {
            Some(Withdrawal::Emptied(claim)) => self.resume_after_claim(claim, &mut outcome),
            Some(Withdrawal::Reduced(claim)) => outcome.broadcast(ServerEvent::WinPending {
                category: claim.category,
                claimants: claim.claimants,
            }),
            None => {}
        }
        Ok(outcome)
    }

    /// Reports a failed settlement to the host. Game state stands.
    pub fn settlement_failed(&self, message: String) -> Outcome {
        let mut outcome = Outcome::default();
        outcome.push(Recipient::Host, ServerEvent::SettlementFailed { message });
        outcome
    }

    // -- Commands -----------------------------------------------------------

    fn set_ready(&mut self, participant: &ParticipantId, ready: bool) -> Result<Outcome, RejectReason> {
        if self.phase != Phase::Waiting {
            return Err(RejectReason::InvalidTransition);
        }
        let mut outcome = Outcome::default();
        let entry = self.roster.get_mut(participant).ok_or(RejectReason::NotInRoom)?;
        if entry.role == Role::Host || entry.ready == ready {
            return Ok(outcome);
        }
        entry.ready = ready;
        outcome.broadcast(ServerEvent::ReadinessChanged {
            participant_id: participant.clone(),
            ready,
        });
        Ok(outcome)
    }

    fn start(&mut self, mode: GameMode) -> Result<Outcome, RejectReason> {
        self.require_mode(mode)?;
        if self.phase != Phase::Waiting {
            return Err(RejectReason::InvalidTransition);
        }
        if self.roster.player_count() < self.config.min_players || !self.roster.all_ready() {
            return Err(RejectReason::RosterNotReady);
        }

        let mut outcome = Outcome::default();
        let cards = match mode {
            GameMode::Bingo => {
                let rng = &mut self.rng;
                self.roster
                    .players_mut()
                    .map(|p| {
                        let card = deal_card(&mut *rng);
                        p.card = Some(card);
                        p.marked.clear();
                        DealtCard {
                            participant_id: p.id.clone(),
                            card,
                        }
                    })
                    .collect()
            }
            GameMode::Quiz => Vec::new(),
        };
        self.phase = match mode {
            GameMode::Bingo => Phase::Active,
            GameMode::Quiz => Phase::QuestionActive,
        };
        outcome.broadcast(ServerEvent::GameStarted {
            phase: self.phase,
            cards,
        });
        outcome.timer = self.draw_cadence();
        info!(
            room_id = %self.room_id,
            %mode,
            players = self.roster.player_count(),
            "game started"
        );
        Ok(outcome)
    }

    fn draw_number(&mut self) -> Result<Outcome, RejectReason> {
        self.require_mode(GameMode::Bingo)?;
        if self.phase != Phase::Active {
            return Err(RejectReason::InvalidTransition);
        }
        let value = self
            .history
            .draw(&mut self.rng)
            .ok_or(RejectReason::InvalidTransition)?;

        let mut outcome = Outcome::default();
        outcome.broadcast(ServerEvent::NumberCalled {
            value,
            history: self.history.as_slice().to_vec(),
        });
        outcome.timer = if self.history.is_exhausted() {
            TimerDirective::Cancel
        } else {
            self.draw_cadence()
        };
        debug!(room_id = %self.room_id, value, called = self.history.as_slice().len(), "number called");
        Ok(outcome)
    }

    fn toggle_autoplay(&mut self) -> Result<Outcome, RejectReason> {
        self.require_mode(GameMode::Bingo)?;
        self.autoplay = !self.autoplay;

        let mut outcome = Outcome::default();
        outcome.broadcast(ServerEvent::AutoplayChanged {
            enabled: self.autoplay,
        });
        outcome.timer = if self.autoplay {
            self.draw_cadence()
        } else {
            TimerDirective::Cancel
        };
        Ok(outcome)
    }

    fn propose_win(
        &mut self,
        proposer: &ParticipantId,
        proposer_role: Role,
        category: WinCategory,
        claimants: Vec<ParticipantId>,
    ) -> Result<Outcome, RejectReason> {
        self.require_mode(GameMode::Bingo)?;
        let claim = self.propose(Proposal {
            category,
            claimants,
            proposer,
            proposer_role,
        })?;
        let mut outcome = Outcome::default();
        self.pause_for(claim, &mut outcome);
        Ok(outcome)
    }

    fn propose(&mut self, proposal: Proposal<'_>) -> Result<WinClaim, RejectReason> {
        let ctx = ClaimContext {
            phase: self.phase,
            roster: &self.roster,
            history: &self.history,
            policy: self.policy(),
        };
        self.claims.propose(proposal, &ctx)
    }

    fn confirm_win(&mut self, category: WinCategory, now: Instant) -> Result<Outcome, RejectReason> {
        self.require_mode(GameMode::Bingo)?;
        if self.phase != Phase::PausedForConfirmation {
            return Err(RejectReason::InvalidTransition);
        }
        let winners = self.claims.confirm(category)?;

        let mut outcome = Outcome::default();
        outcome.broadcast(ServerEvent::WinConfirmed {
            category,
            winners: winners.clone(),
        });
        info!(room_id = %self.room_id, %category, winners = ?winners, "win confirmed");

        if category == WinCategory::FullHouse {
            self.finish(now, &mut outcome);
        } else {
            self.phase = Phase::Active;
            self.pause_reason = None;
            outcome.timer = self.draw_cadence();
        }
        Ok(outcome)
    }

    fn reject_win(&mut self, category: WinCategory) -> Result<Outcome, RejectReason> {
        self.require_mode(GameMode::Bingo)?;
        if self.phase != Phase::PausedForConfirmation {
            return Err(RejectReason::InvalidTransition);
        }
        let claim = self.claims.reject(category)?;
        let mut outcome = Outcome::default();
        self.resume_after_claim(claim, &mut outcome);
        Ok(outcome)
    }

    fn mark_cell(&mut self, participant: &ParticipantId, number: u8) -> Result<Outcome, RejectReason> {
        self.require_mode(GameMode::Bingo)?;
        if !matches!(self.phase, Phase::Active | Phase::PausedForConfirmation) {
            return Err(RejectReason::InvalidTransition);
        }
        let entry = self.roster.get_mut(participant).ok_or(RejectReason::NotInRoom)?;
        let card = entry
            .card
            .filter(|c| c.contains(number))
            .ok_or(RejectReason::InvalidCommand)?;

        let marked = if entry.marked.remove(&number) {
            false
        } else {
            entry.marked.insert(number)
        };

        let mut outcome = Outcome::default();
        outcome.push(
            Recipient::Host,
            ServerEvent::CellMarked {
                participant_id: participant.clone(),
                number,
                marked,
            },
        );

        if marked && self.config.auto_claim && self.phase == Phase::Active {
            let detected = self
                .roster
                .get(participant)
                .and_then(|p| evaluator::detect(&card, &p.marked, &self.history, &self.claims));
            if let Some(category) = detected {
                let proposal = Proposal {
                    category,
                    claimants: vec![participant.clone()],
                    proposer: participant,
                    proposer_role: Role::Player,
                };
                match self.propose(proposal) {
                    Ok(claim) => self.pause_for(claim, &mut outcome),
                    Err(reason) => {
                        debug!(room_id = %self.room_id, %participant, %category, %reason, "automatic claim skipped");
                    }
                }
            }
        }
        Ok(outcome)
    }

    fn next_question(&mut self) -> Result<Outcome, RejectReason> {
        self.require_mode(GameMode::Quiz)?;
        match self.phase {
            Phase::QuestionActive => {}
            Phase::RoundReview => return Err(RejectReason::RoundLimitReached),
            _ => return Err(RejectReason::InvalidTransition),
        }

        let mut outcome = Outcome::default();
        self.score_question(&mut outcome);

        if self.quiz.round_exhausted() {
            let round = self.quiz.progress().round;
            self.phase = Phase::RoundReview;
            outcome.broadcast(ServerEvent::RoundLimitReached { round });
            outcome.notice = Some(RejectReason::RoundLimitReached);
            outcome.timer = TimerDirective::Cancel;
            info!(room_id = %self.room_id, round, "round complete");
            return Ok(outcome);
        }

        let question = self.quiz.issue_next(&self.config.quiz);
        outcome.timer = TimerDirective::ArmQuestion {
            limit: self.config.quiz.time_limit,
            round: question.round,
            question_index: question.question_index,
        };
        outcome.broadcast(ServerEvent::QuestionIssued {
            round: question.round,
            question_index: question.question_index,
            text: question.text,
            options: question.options,
            time_limit_seconds: question.time_limit_secs,
        });
        Ok(outcome)
    }

    fn next_round(&mut self) -> Result<Outcome, RejectReason> {
        self.require_mode(GameMode::Quiz)?;
        if !matches!(self.phase, Phase::QuestionActive | Phase::RoundReview) {
            return Err(RejectReason::InvalidTransition);
        }
        if !self.quiz.round_exhausted() {
            return Err(RejectReason::InvalidTransition);
        }
        if self.quiz.is_final_round() {
            return Err(RejectReason::RoundLimitReached);
        }

        let mut outcome = Outcome::default();
        self.score_question(&mut outcome);
        self.quiz.advance_round();
        self.phase = Phase::QuestionActive;

        let round = self.quiz.progress().round;
        outcome.broadcast(ServerEvent::RoundAdvanced { round });
        outcome.timer = TimerDirective::Cancel;
        info!(room_id = %self.room_id, round, "round advanced");
        Ok(outcome)
    }

    fn submit_answer(&mut self, participant: &ParticipantId, option: usize) -> Result<Outcome, RejectReason> {
        self.require_mode(GameMode::Quiz)?;
        if self.phase != Phase::QuestionActive || !self.quiz.is_open() {
            return Err(RejectReason::InvalidTransition);
        }
        let options = self.quiz.current_view().map_or(0, |q| q.options.len());
        if options > 0 && option >= options {
            return Err(RejectReason::InvalidCommand);
        }
        let entry = self.roster.get_mut(participant).ok_or(RejectReason::NotInRoom)?;
        if entry.role != Role::Player {
            return Err(RejectReason::InvalidCommand);
        }
        if entry.answer.is_some() {
            return Err(RejectReason::InvalidTransition);
        }
        entry.answer = Some(option);

        let mut outcome = Outcome::default();
        outcome.push(
            Recipient::Host,
            ServerEvent::AnswerReceived {
                participant_id: participant.clone(),
            },
        );
        Ok(outcome)
    }

    fn end(&mut self, mode: GameMode, now: Instant) -> Result<Outcome, RejectReason> {
        self.require_mode(mode)?;
        if self.phase == Phase::Waiting {
            return Err(RejectReason::InvalidTransition);
        }
        let mut outcome = Outcome::default();
        if self.phase.is_terminal() {
            return Ok(outcome);
        }
        self.finish(now, &mut outcome);
        Ok(outcome)
    }

    // -- Helpers ------------------------------------------------------------

    fn require_mode(&self, mode: GameMode) -> Result<(), RejectReason> {
        if self.mode == mode {
            Ok(())
        } else {
            Err(RejectReason::InvalidTransition)
        }
    }

    fn policy(&self) -> ClaimPolicy {
        ClaimPolicy {
            verification: self.config.claim_verification,
            ordering: self.config.full_house_ordering,
            max_claimants: self.config.max_claimants,
        }
    }

    /// The autoplay timer for the current state.
    fn draw_cadence(&self) -> TimerDirective {
        if self.autoplay && self.phase == Phase::Active && !self.history.is_exhausted() {
            TimerDirective::ScheduleDraw(self.config.autoplay_interval)
        } else {
            TimerDirective::Keep
        }
    }

    fn pause_for(&mut self, claim: WinClaim, outcome: &mut Outcome) {
        self.phase = Phase::PausedForConfirmation;
        self.pause_reason = Some(claim.category.pause_reason());
        info!(
            room_id = %self.room_id,
            category = %claim.category,
            claimants = ?claim.claimants,
            "win pending"
        );
        outcome.broadcast(ServerEvent::WinPending {
            category: claim.category,
            claimants: claim.claimants,
        });
        outcome.timer = TimerDirective::Cancel;
    }

    fn resume_after_claim(&mut self, claim: WinClaim, outcome: &mut Outcome) {
        self.phase = Phase::Active;
        self.pause_reason = None;
        outcome.broadcast(ServerEvent::WinRejected {
            category: claim.category,
            claimants: claim.claimants,
        });
        outcome.timer = self.draw_cadence();
    }

    fn score_question(&mut self, outcome: &mut Outcome) {
        let points = self.config.quiz.points_per_correct;
        if let Some(scores) = self.quiz.score_current(&mut self.roster, points) {
            outcome.broadcast(ServerEvent::ScoresUpdated { scores });
        }
    }

    /// Moves to the terminal phase and requests settlement.
    fn finish(&mut self, now: Instant, outcome: &mut Outcome) {
        let final_winners = match self.mode {
            GameMode::Bingo => {
                self.claims.discard_pending();
                self.phase = Phase::Ended;
                self.claims.standings()
            }
            GameMode::Quiz => {
                self.score_question(outcome);
                self.phase = Phase::Complete;
                quiz::final_standings(&self.roster)
            }
        };
        self.pause_reason = None;
        self.ended_at = Some(now);

        outcome.broadcast(ServerEvent::GameEnded {
            final_winners: final_winners.clone(),
        });
        outcome.timer = TimerDirective::Cancel;
        outcome.settlement = Some(SettlementRequest {
            room_id: self.room_id.clone(),
            mode: self.mode,
            standings: final_winners,
        });
        info!(room_id = %self.room_id, phase = %self.phase, "game ended");
    }

    fn touch(&mut self, now: Instant, outcome: &Outcome) {
        self.last_activity = now;
        if !outcome.is_empty() {
            self.revision += 1;
        }
    }
}
