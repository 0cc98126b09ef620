//! Room actor: an isolated Tokio task that owns one [`RoomSession`].
//!
//! Everything that can change a room arrives through the actor's bounded
//! command queue or its scheduler, and the actor handles one at a time.
//! Client commands, disconnects and fired timers are therefore totally
//! ordered, and every bound connection sees events in that same order.

use std::collections::HashMap;
use std::sync::Arc;

use fundplay_protocol::{
    ClientCommand, GameMode, ParticipantId, Phase, Recipient, RejectReason, Role,
    RoomId, RoomSnapshot, ServerEvent,
};
use fundplay_scheduler::ProgressionScheduler;
use fundplay_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::session::{Issuer, LeaveReason, Outcome, RoomSession, TimerDirective};
use crate::settlement::{SettlementBridge, SettlementRequest};
use crate::RoomError;

/// An event from a room, addressed to one participant's connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomOutbound {
    /// The room the event belongs to.
    pub room_id: RoomId,
    /// The event.
    pub event: ServerEvent,
}

/// Channel sender for delivering outbound events to a connection.
pub type ParticipantSender = mpsc::UnboundedSender<RoomOutbound>;

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    /// Join (or rejoin) and attach a connection.
    Bind {
        participant: ParticipantId,
        name: String,
        connection: ConnectionId,
        sender: ParticipantSender,
        reply: oneshot::Sender<Result<Role, RejectReason>>,
    },

    /// A client command from a bound connection.
    Client {
        issuer: Issuer,
        command: ClientCommand,
        reply: oneshot::Sender<Result<(), RejectReason>>,
    },

    /// A connection dropped. Ignored if the participant has since rebound.
    Disconnected {
        participant: ParticipantId,
        connection: ConnectionId,
    },

    /// The participant's reconnect grace ran out.
    Expire { participant: ParticipantId },

    /// Deliver an event to every bound connection.
    Broadcast { event: ServerEvent },

    /// The settlement task failed.
    SettlementFailed { message: String },

    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },

    Info {
        reply: oneshot::Sender<RoomInfo>,
    },

    /// Close every connection's view of the room and stop.
    Shutdown { reason: String },
}

/// Room metadata for listings and housekeeping.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub mode: GameMode,
    pub host: ParticipantId,
    pub phase: Phase,
    /// Roster size, host included.
    pub participant_count: usize,
    pub max_players: usize,
    pub revision: u64,
    pub created_at: Instant,
    /// Last accepted input of any kind.
    pub last_activity: Instant,
    /// When the room reached its terminal phase.
    pub ended_at: Option<Instant>,
    pub expires_at: Option<Instant>,
}

/// Handle to a running room actor.
///
/// Cheap to clone; the registry holds one per room and hands out copies.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Returns the room's id.
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Whether the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Joins `participant` (or resyncs a returning one) and routes the
    /// room's events to `sender`. The first event sent is a full snapshot.
    ///
    /// A refusal is also delivered on `sender` as a `rejected` event.
    pub async fn bind(
        &self,
        participant: ParticipantId,
        name: String,
        connection: ConnectionId,
        sender: ParticipantSender,
    ) -> Result<Role, RoomError> {
        self.request(|reply| RoomCommand::Bind {
            participant,
            name,
            connection,
            sender,
            reply,
        })
        .await?
        .map_err(RoomError::from)
    }

    /// Submits a client command and waits until it has been applied.
    ///
    /// Events caused by the command, including a `rejected` event for a
    /// refusal, are queued on the bound connections before this returns.
    pub async fn command(
        &self,
        issuer: Issuer,
        command: ClientCommand,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Client {
            issuer,
            command,
            reply,
        })
        .await?
        .map_err(RoomError::from)
    }

    /// Reports that `connection` for `participant` went away.
    pub async fn disconnected(
        &self,
        participant: ParticipantId,
        connection: ConnectionId,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::Disconnected {
            participant,
            connection,
        })
        .await
    }

    /// Removes a participant whose reconnect grace ran out.
    pub async fn expire(&self, participant: ParticipantId) -> Result<(), RoomError> {
        self.send(RoomCommand::Expire { participant }).await
    }

    /// Delivers `event` to every bound connection, in queue order.
    pub async fn broadcast(&self, event: ServerEvent) -> Result<(), RoomError> {
        self.send(RoomCommand::Broadcast { event }).await
    }

    /// The current authoritative snapshot.
    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    /// Current room metadata.
    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::Info { reply }).await
    }

    /// Tells the room to send `roomClosed` and stop.
    pub async fn shutdown(&self, reason: impl Into<String>) -> Result<(), RoomError> {
        self.send(RoomCommand::Shutdown {
            reason: reason.into(),
        })
        .await
    }

    async fn send(&self, command: RoomCommand) -> Result<(), RoomError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(make(reply_tx)).await?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }
}

struct Binding {
    connection: ConnectionId,
    sender: ParticipantSender,
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room_id: RoomId,
    session: RoomSession,
    scheduler: ProgressionScheduler,
    /// Live connections by participant.
    bindings: HashMap<ParticipantId, Binding>,
    settlement: Arc<dyn SettlementBridge>,
    /// Lets the settlement task report back without keeping the room alive.
    mailbox: mpsc::WeakSender<RoomCommand>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop until shutdown or until every handle is gone.
    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id, mode = %self.session.mode(), "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle_command(cmd) {
                        break;
                    }
                }
                fired = self.scheduler.wait_for_fire() => {
                    let late_ms = fired.late_by.as_millis() as u64;
                    match self.session.on_timer(fired.kind, Instant::now()) {
                        Some(outcome) => {
                            tracing::trace!(
                                room_id = %self.room_id,
                                kind = ?fired.kind,
                                late_ms,
                                "timer fired"
                            );
                            self.commit(outcome);
                        }
                        None => tracing::debug!(
                            room_id = %self.room_id,
                            generation = fired.generation,
                            kind = ?fired.kind,
                            late_ms,
                            "stale timer discarded"
                        ),
                    }
                }
            }
        }

        self.scheduler.cancel();
        tracing::info!(room_id = %self.room_id, "room actor stopped");
    }

    /// Returns `false` when the actor should stop.
    fn handle_command(&mut self, cmd: RoomCommand) -> bool {
        let now = Instant::now();
        match cmd {
            RoomCommand::Bind {
                participant,
                name,
                connection,
                sender,
                reply,
            } => {
                let result = self.handle_bind(participant, &name, connection, sender, now);
                let _ = reply.send(result);
            }
            RoomCommand::Client {
                issuer,
                command,
                reply,
            } => {
                let result = self.handle_client(issuer, command, now);
                let _ = reply.send(result);
            }
            RoomCommand::Disconnected {
                participant,
                connection,
            } => {
                let current = self
                    .bindings
                    .get(&participant)
                    .is_some_and(|b| b.connection == connection);
                if current {
                    self.bindings.remove(&participant);
                    if let Some(outcome) = self.session.disconnect(&participant, now) {
                        self.commit(outcome);
                    }
                }
            }
            RoomCommand::Expire { participant } => {
                if self.bindings.contains_key(&participant) {
                    tracing::debug!(room_id = %self.room_id, %participant, "rebound before expiry");
                } else if let Ok(outcome) =
                    self.session.leave(&participant, LeaveReason::GraceExpired, now)
                {
                    self.commit(outcome);
                }
            }
            RoomCommand::Broadcast { event } => {
                self.dispatch(vec![(Recipient::All, event)]);
            }
            RoomCommand::SettlementFailed { message } => {
                let outcome = self.session.settlement_failed(message);
                self.dispatch(outcome.events);
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.session.snapshot());
            }
            RoomCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown { reason } => {
                tracing::info!(room_id = %self.room_id, %reason, "room shutting down");
                self.dispatch(vec![(Recipient::All, ServerEvent::RoomClosed { reason })]);
                return false;
            }
        }
        true
    }

    fn handle_bind(
        &mut self,
        participant: ParticipantId,
        name: &str,
        connection: ConnectionId,
        sender: ParticipantSender,
        now: Instant,
    ) -> Result<Role, RejectReason> {
        match self.session.join(&participant, name, now) {
            Ok((role, outcome)) => {
                let snapshot = ServerEvent::RoomSnapshot {
                    snapshot: self.session.snapshot(),
                };
                let _ = sender.send(self.outbound(snapshot));
                self.bindings
                    .insert(participant, Binding { connection, sender });
                self.commit(outcome);
                Ok(role)
            }
            Err(reason) => {
                tracing::debug!(room_id = %self.room_id, %participant, %reason, "bind rejected");
                let _ = sender.send(self.outbound(ServerEvent::Rejected {
                    command: "join".into(),
                    reason,
                }));
                Err(reason)
            }
        }
    }

    fn handle_client(
        &mut self,
        issuer: Issuer,
        command: ClientCommand,
        now: Instant,
    ) -> Result<(), RejectReason> {
        let kind = command.kind();
        let leaving = matches!(command, ClientCommand::Leave);

        match self.session.apply(&issuer, command, now) {
            Ok(outcome) => {
                let notice = outcome.notice;
                self.commit(outcome);
                if leaving {
                    self.bindings.remove(&issuer.participant);
                }
                match notice {
                    Some(reason) => {
                        self.reject(&issuer.participant, kind, reason);
                        Err(reason)
                    }
                    None => Ok(()),
                }
            }
            Err(reason) => {
                tracing::debug!(
                    room_id = %self.room_id,
                    participant = %issuer.participant,
                    command = kind,
                    %reason,
                    "command rejected"
                );
                self.reject(&issuer.participant, kind, reason);
                Err(reason)
            }
        }
    }

    fn reject(&self, participant: &ParticipantId, command: &str, reason: RejectReason) {
        self.send_to(
            participant,
            ServerEvent::Rejected {
                command: command.to_owned(),
                reason,
            },
        );
    }

    /// Delivers events, applies the timer directive, and starts settlement.
    fn commit(&mut self, outcome: Outcome) {
        self.dispatch(outcome.events);

        match outcome.timer {
            TimerDirective::Keep => {}
            TimerDirective::Cancel => {
                self.scheduler.cancel();
            }
            TimerDirective::ScheduleDraw(interval) => {
                self.scheduler.schedule_next_draw(interval);
            }
            TimerDirective::ArmQuestion {
                limit,
                round,
                question_index,
            } => {
                self.scheduler.arm_question_timer(limit, round, question_index);
            }
        }

        if let Some(request) = outcome.settlement {
            self.settle(request);
        }
    }

    /// Runs settlement off the actor. The result never changes game state.
    fn settle(&self, request: SettlementRequest) {
        let bridge = Arc::clone(&self.settlement);
        let mailbox = self.mailbox.clone();
        let room_id = self.room_id.clone();

        tokio::spawn(async move {
            match bridge.settle(request).await {
                Ok(()) => tracing::info!(%room_id, "settlement completed"),
                Err(e) => {
                    tracing::warn!(%room_id, error = %e, "settlement failed");
                    if let Some(tx) = mailbox.upgrade() {
                        let _ = tx
                            .send(RoomCommand::SettlementFailed {
                                message: e.to_string(),
                            })
                            .await;
                    }
                }
            }
        });
    }

    /// Routes events to bound connections.
    fn dispatch(&self, events: Vec<(Recipient, ServerEvent)>) {
        for (recipient, event) in events {
            match recipient {
                Recipient::All => {
                    for binding in self.bindings.values() {
                        let _ = binding.sender.send(self.outbound(event.clone()));
                    }
                }
                Recipient::Participant(id) => self.send_to(&id, event),
                Recipient::Host => self.send_to(self.session.host(), event),
                Recipient::AllExcept(excluded) => {
                    for (id, binding) in &self.bindings {
                        if *id != excluded {
                            let _ = binding.sender.send(self.outbound(event.clone()));
                        }
                    }
                }
            }
        }
    }

    /// Sends to one participant. Silently drops if they have no live
    /// connection.
    fn send_to(&self, participant: &ParticipantId, event: ServerEvent) {
        if let Some(binding) = self.bindings.get(participant) {
            let _ = binding.sender.send(self.outbound(event));
        }
    }

    fn outbound(&self, event: ServerEvent) -> RoomOutbound {
        RoomOutbound {
            room_id: self.room_id.clone(),
            event,
        }
    }

    fn info(&self) -> RoomInfo {
        let s = &self.session;
        RoomInfo {
            room_id: self.room_id.clone(),
            mode: s.mode(),
            host: s.host().clone(),
            phase: s.phase(),
            participant_count: s.participant_count(),
            max_players: s.max_players(),
            revision: s.revision(),
            created_at: s.created_at(),
            last_activity: s.last_activity(),
            ended_at: s.ended_at(),
            expires_at: s.expires_at(),
        }
    }
}

/// Spawns a room actor task and returns a handle to it.
///
/// `channel_size` bounds the command queue; senders wait when it is full.
pub(crate) fn spawn_room(
    session: RoomSession,
    scheduler: ProgressionScheduler,
    settlement: Arc<dyn SettlementBridge>,
    channel_size: usize,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let room_id = session.room_id().clone();

    let actor = RoomActor {
        room_id: room_id.clone(),
        session,
        scheduler,
        bindings: HashMap::new(),
        settlement,
        mailbox: tx.downgrade(),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle { room_id, sender: tx }
}
