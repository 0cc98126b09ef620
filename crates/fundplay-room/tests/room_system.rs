//! Integration tests for room actors and the registry.

use std::sync::Arc;
use std::time::Duration;

use fundplay_protocol::{
    ClientCommand, GameMode, Liveness, ParticipantId, Phase, QuizQuestion, QuizSettings, RejectReason, Role,
    RoomId, RoomSettings, ServerEvent, WinCategory,
};
use fundplay_room::{
    Issuer, ParticipantSender, RegistryConfig, RemovalReason, RoomConfig, RoomError,
    RoomHandle, RoomLifecycle, RoomOutbound, RoomRegistry, SettlementBridge, SettlementError,
    SettlementRequest,
};
use fundplay_transport::ConnectionId;
use futures_util::future::BoxFuture;
use tokio::sync::mpsc;

// =========================================================================
// Settlement doubles
// =========================================================================

struct RecordingSettlement(mpsc::UnboundedSender<SettlementRequest>);

impl SettlementBridge for RecordingSettlement {
    fn settle(&self, request: SettlementRequest) -> BoxFuture<'static, Result<(), SettlementError>> {
        let _ = self.0.send(request);
        Box::pin(async { Ok(()) })
    }
}

struct FailingSettlement;

impl SettlementBridge for FailingSettlement {
    fn settle(&self, _request: SettlementRequest) -> BoxFuture<'static, Result<(), SettlementError>> {
        Box::pin(async { Err(SettlementError::Unavailable("ledger offline".into())) })
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn pid(id: &str) -> ParticipantId {
    ParticipantId::new(id).unwrap()
}

fn rid(id: &str) -> RoomId {
    RoomId::new(id).unwrap()
}

fn registry_with(settlement: Arc<dyn SettlementBridge>) -> RoomRegistry {
    let defaults = RoomConfig {
        seed: Some(7),
        ..RoomConfig::default()
    };
    RoomRegistry::new(defaults, RegistryConfig::default(), settlement)
}

fn registry() -> (RoomRegistry, mpsc::UnboundedReceiver<SettlementRequest>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (registry_with(Arc::new(RecordingSettlement(tx))), rx)
}

/// One bound connection.
struct Member {
    issuer: Issuer,
    rx: mpsc::UnboundedReceiver<RoomOutbound>,
}

impl Member {
    async fn send(&self, room: &RoomHandle, command: ClientCommand) -> Result<(), RoomError> {
        room.command(self.issuer.clone(), command).await
    }

    /// Every event queued so far.
    fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(outbound) = self.rx.try_recv() {
            events.push(outbound.event);
        }
        events
    }
}

async fn bind(room: &RoomHandle, id: &str, conn: u64) -> Member {
    let (tx, rx): (ParticipantSender, _) = mpsc::unbounded_channel();
    let role = room
        .bind(pid(id), id.to_uppercase(), ConnectionId::new(conn), tx)
        .await
        .unwrap();
    Member {
        issuer: Issuer {
            participant: pid(id),
            role,
        },
        rx,
    }
}

fn create(registry: &RoomRegistry, id: &str, mode: GameMode, settings: RoomSettings) -> RoomHandle {
    registry
        .create_room(rid(id), pid("h"), "Host", mode, &settings)
        .unwrap()
}

/// Host plus ready players `a` and `b`, game not yet started.
async fn bingo_lobby(registry: &RoomRegistry) -> (RoomHandle, Member, Member, Member) {
    let room = create(registry, "bgo-1", GameMode::Bingo, RoomSettings::default());
    let h = bind(&room, "h", 1).await;
    let a = bind(&room, "a", 2).await;
    let b = bind(&room, "b", 3).await;
    for m in [&a, &b] {
        m.send(&room, ClientCommand::SetReady { ready: true }).await.unwrap();
    }
    (room, h, a, b)
}

async fn bingo_started(registry: &RoomRegistry) -> (RoomHandle, Member, Member, Member) {
    let (room, mut h, mut a, mut b) = bingo_lobby(registry).await;
    h.send(&room, ClientCommand::StartGame).await.unwrap();
    h.drain();
    a.drain();
    b.drain();
    (room, h, a, b)
}

fn called_numbers(events: &[ServerEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::NumberCalled { value, .. } => Some(*value),
            _ => None,
        })
        .collect()
}

// =========================================================================
// Registry
// =========================================================================

#[tokio::test]
async fn test_create_room_duplicate_id_rejected() {
    let (registry, _settled) = registry();
    create(&registry, "bgo-1", GameMode::Bingo, RoomSettings::default());

    let result = registry.create_room(rid("bgo-1"), pid("x"), "X", GameMode::Quiz, &RoomSettings::default());

    assert!(matches!(result, Err(RoomError::AlreadyExists(_))));
    assert_eq!(registry.room_count(), 1);
}

#[tokio::test]
async fn test_create_room_invalid_settings_rejected() {
    let (registry, _settled) = registry();
    let settings = RoomSettings {
        max_players: Some(5000),
        ..RoomSettings::default()
    };

    let result = registry.create_room(rid("big"), pid("h"), "Host", GameMode::Bingo, &settings);

    let err = result.err().unwrap();
    assert_eq!(err.reject_reason(), RejectReason::InvalidCommand);
    assert_eq!(registry.room_count(), 0);
}

#[tokio::test]
async fn test_create_room_unbounded_lifetime_rejected() {
    let (registry, _settled) = registry();
    let settings = RoomSettings {
        expires_in_secs: Some(u64::MAX),
        ..RoomSettings::default()
    };

    let result = registry.create_room(rid("forever"), pid("h"), "Host", GameMode::Bingo, &settings);

    assert!(matches!(result, Err(RoomError::InvalidConfig(_))));
    assert_eq!(registry.room_count(), 0);
}

#[tokio::test]
async fn test_room_with_longest_lifetime_stays_responsive() {
    let (registry, _settled) = registry();
    let settings = RoomSettings {
        expires_in_secs: Some(RoomConfig::MAX_LIFETIME.as_secs()),
        ..RoomSettings::default()
    };
    let room = create(&registry, "long", GameMode::Bingo, settings);

    assert!(room.info().await.is_ok());
    assert_eq!(registry.list_rooms().await.len(), 1);
}

#[tokio::test]
async fn test_get_room_unknown_not_found() {
    let (registry, _settled) = registry();
    let err = registry.get_room(&rid("nope")).err().unwrap();
    assert_eq!(err.reject_reason(), RejectReason::RoomNotFound);
}

#[tokio::test]
async fn test_create_room_emits_lifecycle() {
    let (registry, _settled) = registry();
    let mut lifecycle = registry.subscribe();

    create(&registry, "bgo-1", GameMode::Bingo, RoomSettings::default());

    assert_eq!(lifecycle.recv().await.unwrap(), RoomLifecycle::Created(rid("bgo-1")));
}

#[tokio::test]
async fn test_list_rooms_reports_mode_and_counts() {
    let (registry, _settled) = registry();
    let (_room, _h, _a, _b) = bingo_lobby(&registry).await;
    create(&registry, "q-1", GameMode::Quiz, RoomSettings::default());

    let rooms = registry.list_rooms().await;

    assert_eq!(rooms.len(), 2);
    assert_eq!(rooms[0].room_id, rid("bgo-1"));
    assert_eq!(rooms[0].participant_count, 3);
    assert_eq!(rooms[0].phase, Phase::Waiting);
    assert_eq!(rooms[1].mode, GameMode::Quiz);
}

#[tokio::test]
async fn test_end_room_before_finish_rejected() {
    let (registry, _settled) = registry();
    let (room, h, _a, _b) = bingo_started(&registry).await;

    let err = registry.end_room(&rid("bgo-1")).await.unwrap_err();
    assert!(matches!(err, RoomError::NotFinished(_)));

    h.send(&room, ClientCommand::EndGame).await.unwrap();
    registry.end_room(&rid("bgo-1")).await.unwrap();
    assert_eq!(registry.room_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_removes_idle_room_and_notifies() {
    let (registry, _settled) = registry();
    let room = create(&registry, "idle", GameMode::Bingo, RoomSettings::default());
    let mut h = bind(&room, "h", 1).await;
    h.drain();
    let mut lifecycle = registry.subscribe();

    assert!(registry.sweep().await.is_empty());
    tokio::time::sleep(Duration::from_secs(2 * 60 * 60 + 1)).await;
    let removed = registry.sweep().await;

    assert_eq!(removed, vec![rid("idle")]);
    assert_eq!(
        lifecycle.recv().await.unwrap(),
        RoomLifecycle::Removed {
            room_id: rid("idle"),
            reason: RemovalReason::Idle
        }
    );
    let closed = h.rx.recv().await.unwrap().event;
    assert!(matches!(closed, ServerEvent::RoomClosed { .. }));
    assert!(registry.get_room(&rid("idle")).is_err());
}

// =========================================================================
// Bingo
// =========================================================================

#[tokio::test]
async fn test_start_game_deals_cards_to_both_players() {
    let (registry, _settled) = registry();
    let (room, h, mut a, mut b) = bingo_lobby(&registry).await;
    a.drain();
    b.drain();

    h.send(&room, ClientCommand::StartGame).await.unwrap();

    for member in [&mut a, &mut b] {
        let events = member.drain();
        let ServerEvent::GameStarted { phase, cards } = &events[0] else {
            panic!("expected gameStarted, got {events:?}");
        };
        assert_eq!(*phase, Phase::Active);
        assert_eq!(cards.len(), 2);
    }
}

#[tokio::test]
async fn test_draw_five_numbers_same_order_for_all_players() {
    let (registry, _settled) = registry();
    let (room, h, mut a, mut b) = bingo_started(&registry).await;

    for _ in 0..5 {
        h.send(&room, ClientCommand::DrawNumber).await.unwrap();
    }

    let seen_a = called_numbers(&a.drain());
    let seen_b = called_numbers(&b.drain());
    assert_eq!(seen_a.len(), 5);
    assert_eq!(seen_a, seen_b);
    let mut distinct = seen_a.clone();
    distinct.sort_unstable();
    distinct.dedup();
    assert_eq!(distinct.len(), 5);
}

#[tokio::test]
async fn test_second_claim_while_pending_rejected() {
    let (registry, _settled) = registry();
    let (room, h, mut a, mut b) = bingo_started(&registry).await;

    h.send(
        &room,
        ClientCommand::ProposeWin {
            category: WinCategory::Line,
            claimants: vec![pid("a")],
        },
    )
    .await
    .unwrap();
    assert_eq!(room.snapshot().await.unwrap().phase, Phase::PausedForConfirmation);
    a.drain();
    b.drain();

    let err = b
        .send(
            &room,
            ClientCommand::ProposeWin {
                category: WinCategory::Line,
                claimants: vec![pid("b")],
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.reject_reason(), RejectReason::ClaimAlreadyPending);
    assert!(matches!(
        b.drain().as_slice(),
        [ServerEvent::Rejected {
            reason: RejectReason::ClaimAlreadyPending,
            ..
        }]
    ));
    assert!(a.drain().is_empty(), "rejections are not broadcast");

    h.send(&room, ClientCommand::ConfirmWin { category: WinCategory::Line })
        .await
        .unwrap();

    let snapshot = room.snapshot().await.unwrap();
    assert_eq!(snapshot.winners_of(WinCategory::Line), &[pid("a")]);
    assert_eq!(snapshot.phase, Phase::Active);
}

#[tokio::test]
async fn test_reject_win_resumes_without_winners() {
    let (registry, _settled) = registry();
    let (room, h, _a, _b) = bingo_started(&registry).await;
    h.send(
        &room,
        ClientCommand::ProposeWin {
            category: WinCategory::Line,
            claimants: vec![pid("b")],
        },
    )
    .await
    .unwrap();

    h.send(&room, ClientCommand::RejectWin { category: WinCategory::Line })
        .await
        .unwrap();

    let snapshot = room.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, Phase::Active);
    assert!(snapshot.pending_claim.is_none());
    assert!(snapshot.winners.is_empty());
}

#[tokio::test]
async fn test_player_host_only_command_rejected_privately() {
    let (registry, _settled) = registry();
    let (room, _h, mut a, mut b) = bingo_started(&registry).await;

    let err = a.send(&room, ClientCommand::DrawNumber).await.unwrap_err();

    assert_eq!(err.reject_reason(), RejectReason::Unauthorized);
    assert_eq!(a.drain().len(), 1);
    assert!(b.drain().is_empty());
    assert!(room.snapshot().await.unwrap().called.is_empty());
}

#[tokio::test]
async fn test_end_game_twice_single_game_ended() {
    let (registry, mut settled) = registry();
    let (room, h, mut a, _b) = bingo_started(&registry).await;

    h.send(&room, ClientCommand::EndGame).await.unwrap();
    h.send(&room, ClientCommand::EndGame).await.unwrap();

    let ended = a
        .drain()
        .into_iter()
        .filter(|e| matches!(e, ServerEvent::GameEnded { .. }))
        .count();
    assert_eq!(ended, 1);

    let request = settled.recv().await.unwrap();
    assert_eq!(request.room_id, rid("bgo-1"));
    let second = tokio::time::timeout(Duration::from_millis(50), settled.recv()).await;
    assert!(second.is_err(), "settlement must run exactly once");
}

#[tokio::test]
async fn test_full_house_confirmation_settles_line_then_full_house() {
    let (registry, mut settled) = registry();
    let (room, h, _a, _b) = bingo_started(&registry).await;

    for (category, who) in [(WinCategory::Line, "a"), (WinCategory::FullHouse, "b")] {
        h.send(
            &room,
            ClientCommand::ProposeWin {
                category,
                claimants: vec![pid(who)],
            },
        )
        .await
        .unwrap();
        h.send(&room, ClientCommand::ConfirmWin { category }).await.unwrap();
    }

    assert_eq!(room.snapshot().await.unwrap().phase, Phase::Ended);
    let request = settled.recv().await.unwrap();
    assert_eq!(request.winner_ids(), vec![pid("a"), pid("b")]);
}

#[tokio::test]
async fn test_settlement_failure_reaches_host_only() {
    let registry = registry_with(Arc::new(FailingSettlement));
    let (room, mut h, mut a, _b) = bingo_started(&registry).await;

    h.send(&room, ClientCommand::EndGame).await.unwrap();

    let failure = loop {
        let event = tokio::time::timeout(Duration::from_secs(1), h.rx.recv())
            .await
            .expect("host should hear about the failure")
            .unwrap()
            .event;
        if let ServerEvent::SettlementFailed { message } = event {
            break message;
        }
    };
    assert!(failure.contains("ledger offline"));
    assert_eq!(room.snapshot().await.unwrap().phase, Phase::Ended);
    assert!(
        !a.drain()
            .iter()
            .any(|e| matches!(e, ServerEvent::SettlementFailed { .. }))
    );
}

#[tokio::test(start_paused = true)]
async fn test_autoplay_draws_on_interval() {
    let (registry, _settled) = registry();
    let (room, h, mut a, _b) = bingo_started(&registry).await;

    h.send(&room, ClientCommand::ToggleAutoplay).await.unwrap();
    tokio::time::sleep(Duration::from_millis(8_100)).await;

    assert_eq!(room.snapshot().await.unwrap().called.len(), 2);
    assert_eq!(called_numbers(&a.drain()).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_pending_claim_stops_autoplay_until_confirmed() {
    let (registry, _settled) = registry();
    let (room, h, _a, _b) = bingo_started(&registry).await;
    h.send(&room, ClientCommand::ToggleAutoplay).await.unwrap();
    h.send(
        &room,
        ClientCommand::ProposeWin {
            category: WinCategory::Line,
            claimants: vec![pid("a")],
        },
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(room.snapshot().await.unwrap().called.is_empty());

    h.send(&room, ClientCommand::ConfirmWin { category: WinCategory::Line })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(4_100)).await;
    assert_eq!(room.snapshot().await.unwrap().called.len(), 1);
}

// =========================================================================
// Connections
// =========================================================================

#[tokio::test]
async fn test_rebind_resyncs_without_duplicating() {
    let (registry, _settled) = registry();
    let (room, h, mut a, mut b) = bingo_started(&registry).await;
    h.send(&room, ClientCommand::DrawNumber).await.unwrap();
    let card = room.snapshot().await.unwrap().participant(&pid("a")).unwrap().card.unwrap();
    a.send(&room, ClientCommand::MarkCell { number: card.rows[2][2] })
        .await
        .unwrap();
    b.drain();

    room.disconnected(pid("a"), ConnectionId::new(2)).await.unwrap();
    let seen_by_b = b.drain();
    assert!(matches!(
        seen_by_b.as_slice(),
        [ServerEvent::LivenessChanged {
            liveness: Liveness::GracePeriod,
            ..
        }]
    ));

    let mut a2 = bind(&room, "a", 20).await;
    let ServerEvent::RoomSnapshot { snapshot } = a2.drain().remove(0) else {
        panic!("first event after rebind must be a snapshot");
    };

    let current = room.snapshot().await.unwrap();
    assert_eq!(snapshot, current);
    assert_eq!(snapshot.participants.len(), 3);
    let view = snapshot.participant(&pid("a")).unwrap();
    assert_eq!(view.marked, vec![card.rows[2][2]]);
    assert_eq!(view.liveness, Liveness::Connected);
}

#[tokio::test]
async fn test_stale_disconnect_after_rebind_ignored() {
    let (registry, _settled) = registry();
    let (room, _h, _a, _b) = bingo_started(&registry).await;
    let _a2 = bind(&room, "a", 20).await;

    room.disconnected(pid("a"), ConnectionId::new(2)).await.unwrap();

    let snapshot = room.snapshot().await.unwrap();
    assert_eq!(snapshot.participant(&pid("a")).unwrap().liveness, Liveness::Connected);
}

#[tokio::test]
async fn test_expire_removes_player_but_not_rebound_one() {
    let (registry, _settled) = registry();
    let (room, _h, _a, _b) = bingo_started(&registry).await;

    room.disconnected(pid("a"), ConnectionId::new(2)).await.unwrap();
    room.disconnected(pid("b"), ConnectionId::new(3)).await.unwrap();
    let _b2 = bind(&room, "b", 30).await;
    room.expire(pid("a")).await.unwrap();
    room.expire(pid("b")).await.unwrap();

    let snapshot = room.snapshot().await.unwrap();
    assert!(snapshot.participant(&pid("a")).is_none());
    assert!(snapshot.participant(&pid("b")).is_some());
}

#[tokio::test]
async fn test_join_after_start_rejected_on_sender() {
    let (registry, _settled) = registry();
    let (room, _h, _a, _b) = bingo_started(&registry).await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let err = room
        .bind(pid("late"), "Late".into(), ConnectionId::new(9), tx)
        .await
        .unwrap_err();

    assert_eq!(err.reject_reason(), RejectReason::InvalidTransition);
    assert!(matches!(rx.try_recv().unwrap().event, ServerEvent::Rejected { .. }));
}

#[tokio::test]
async fn test_host_binds_as_host() {
    let (registry, _settled) = registry();
    let room = create(&registry, "bgo-1", GameMode::Bingo, RoomSettings::default());
    let h = bind(&room, "h", 1).await;
    assert_eq!(h.issuer.role, Role::Host);
}

// =========================================================================
// Quiz
// =========================================================================

#[tokio::test]
async fn test_quiz_round_limit_then_next_round() {
    let (registry, _settled) = registry();
    let settings = RoomSettings {
        quiz: Some(QuizSettings {
            total_rounds: 2,
            questions_per_round: 3,
            time_limit_secs: 20,
            questions: vec![],
        }),
        ..RoomSettings::default()
    };
    let room = create(&registry, "q-1", GameMode::Quiz, settings);
    let h = bind(&room, "h", 1).await;
    let mut a = bind(&room, "a", 2).await;
    a.send(&room, ClientCommand::SetReady { ready: true }).await.unwrap();
    h.send(&room, ClientCommand::StartQuiz).await.unwrap();

    for _ in 0..3 {
        h.send(&room, ClientCommand::NextQuestion).await.unwrap();
    }
    let err = h.send(&room, ClientCommand::NextQuestion).await.unwrap_err();
    assert_eq!(err.reject_reason(), RejectReason::RoundLimitReached);
    assert!(
        a.drain()
            .iter()
            .any(|e| matches!(e, ServerEvent::RoundLimitReached { round: 1 }))
    );

    h.send(&room, ClientCommand::NextRound).await.unwrap();
    let snapshot = room.snapshot().await.unwrap();
    let progress = snapshot.quiz.unwrap();
    assert_eq!(snapshot.phase, Phase::QuestionActive);
    assert_eq!(progress.round, 2);
    assert_eq!(progress.question_index, 0);

    for _ in 0..3 {
        h.send(&room, ClientCommand::NextQuestion).await.unwrap();
    }
    let err = h.send(&room, ClientCommand::NextRound).await.unwrap_err();
    assert_eq!(err.reject_reason(), RejectReason::RoundLimitReached);
}

#[tokio::test]
async fn test_quiz_scores_correct_answers_and_ranks_winners() {
    let (registry, mut settled) = registry();
    let settings = RoomSettings {
        quiz: Some(QuizSettings {
            total_rounds: 1,
            questions_per_round: 1,
            time_limit_secs: 20,
            questions: vec![QuizQuestion {
                text: "Capital of Peru?".into(),
                options: vec!["Quito".into(), "Lima".into()],
                correct_option: Some(1),
            }],
        }),
        ..RoomSettings::default()
    };
    let room = create(&registry, "q-2", GameMode::Quiz, settings);
    let h = bind(&room, "h", 1).await;
    let a = bind(&room, "a", 2).await;
    let b = bind(&room, "b", 3).await;
    for m in [&a, &b] {
        m.send(&room, ClientCommand::SetReady { ready: true }).await.unwrap();
    }
    h.send(&room, ClientCommand::StartQuiz).await.unwrap();
    h.send(&room, ClientCommand::NextQuestion).await.unwrap();

    a.send(&room, ClientCommand::SubmitAnswer { option: 1 }).await.unwrap();
    b.send(&room, ClientCommand::SubmitAnswer { option: 0 }).await.unwrap();
    let twice = a.send(&room, ClientCommand::SubmitAnswer { option: 0 }).await;
    assert!(twice.is_err());

    h.send(&room, ClientCommand::EndQuiz).await.unwrap();

    let snapshot = room.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, Phase::Complete);
    assert_eq!(snapshot.participant(&pid("a")).unwrap().score, 1);
    assert_eq!(snapshot.participant(&pid("b")).unwrap().score, 0);
    let request = settled.recv().await.unwrap();
    assert_eq!(request.winner_ids(), vec![pid("a")]);
}

#[tokio::test]
async fn test_end_quiz_twice_single_game_ended() {
    let (registry, mut settled) = registry();
    let room = create(&registry, "q-3", GameMode::Quiz, RoomSettings::default());
    let h = bind(&room, "h", 1).await;
    let mut a = bind(&room, "a", 2).await;
    a.send(&room, ClientCommand::SetReady { ready: true }).await.unwrap();
    h.send(&room, ClientCommand::StartQuiz).await.unwrap();
    h.send(&room, ClientCommand::NextQuestion).await.unwrap();

    h.send(&room, ClientCommand::EndQuiz).await.unwrap();
    let second = h.send(&room, ClientCommand::EndQuiz).await;

    assert!(second.is_ok());
    assert_eq!(room.snapshot().await.unwrap().phase, Phase::Complete);
    let ended = a
        .drain()
        .into_iter()
        .filter(|e| matches!(e, ServerEvent::GameEnded { .. }))
        .count();
    assert_eq!(ended, 1);

    let request = settled.recv().await.unwrap();
    assert_eq!(request.room_id, rid("q-3"));
    let again = tokio::time::timeout(Duration::from_millis(50), settled.recv()).await;
    assert!(again.is_err(), "settlement must run exactly once");
}

/// Quiz room `id` with one ready player, started, with a 20 s countdown.
async fn quiz_started(
    registry: &RoomRegistry,
    id: &str,
    total_rounds: u32,
    questions_per_round: u32,
) -> (RoomHandle, Member, Member) {
    let settings = RoomSettings {
        quiz: Some(QuizSettings {
            total_rounds,
            questions_per_round,
            time_limit_secs: 20,
            questions: vec![],
        }),
        ..RoomSettings::default()
    };
    let room = create(registry, id, GameMode::Quiz, settings);
    let mut h = bind(&room, "h", 1).await;
    let mut a = bind(&room, "a", 2).await;
    a.send(&room, ClientCommand::SetReady { ready: true }).await.unwrap();
    h.send(&room, ClientCommand::StartQuiz).await.unwrap();
    h.drain();
    a.drain();
    (room, h, a)
}

/// `(round, question_index)` of every countdown expiry in `events`.
fn times_up(events: &[ServerEvent]) -> Vec<(u32, u32)> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::QuestionTimeUp {
                round,
                question_index,
            } => Some((*round, *question_index)),
            _ => None,
        })
        .collect()
}

fn issued(events: &[ServerEvent]) -> Vec<(u32, u32)> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::QuestionIssued {
                round,
                question_index,
                ..
            } => Some((*round, *question_index)),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_question_countdown_fires_time_up_after_limit() {
    let (registry, _settled) = registry();
    let (room, h, mut a) = quiz_started(&registry, "q-4", 1, 3).await;

    h.send(&room, ClientCommand::NextQuestion).await.unwrap();
    let question = issued(&a.drain());
    assert_eq!(question.len(), 1);

    tokio::time::sleep(Duration::from_secs(19)).await;
    assert!(times_up(&a.drain()).is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(times_up(&a.drain()), question);

    // Time's up closes answers but leaves the phase to the host.
    let late = a.send(&room, ClientCommand::SubmitAnswer { option: 0 }).await;
    assert!(late.is_err());
    assert_eq!(room.snapshot().await.unwrap().phase, Phase::QuestionActive);
}

#[tokio::test(start_paused = true)]
async fn test_question_countdown_discarded_after_next_question() {
    let (registry, _settled) = registry();
    let (room, h, mut a) = quiz_started(&registry, "q-5", 1, 3).await;

    h.send(&room, ClientCommand::NextQuestion).await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    h.send(&room, ClientCommand::NextQuestion).await.unwrap();
    let questions = issued(&a.drain());
    assert_eq!(questions.len(), 2);

    // The first question's deadline passes without a time-up.
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert!(times_up(&a.drain()).is_empty());

    // Only the second question's countdown fires.
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(times_up(&a.drain()), vec![questions[1]]);
}

#[tokio::test(start_paused = true)]
async fn test_question_countdown_discarded_after_next_round() {
    let (registry, _settled) = registry();
    let (room, h, mut a) = quiz_started(&registry, "q-6", 2, 1).await;

    h.send(&room, ClientCommand::NextQuestion).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    h.send(&room, ClientCommand::NextRound).await.unwrap();

    tokio::time::sleep(Duration::from_secs(60)).await;

    let events = a.drain();
    assert!(
        events
            .iter()
            .any(|e| matches!(e, ServerEvent::RoundAdvanced { round: 2 }))
    );
    assert!(times_up(&events).is_empty());
}
