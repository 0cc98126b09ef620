//! Integration tests for the progression scheduler.
//!
//! Uses paused Tokio time: `sleep_until` resolves as soon as the runtime
//! is otherwise idle, so the tests are instant and deterministic.

use std::time::Duration;

use fundplay_scheduler::{ProgressionScheduler, SchedulerConfig, TimerKind};
use tokio::time::Instant;

// =========================================================================
// Helpers
// =========================================================================

fn scheduler() -> ProgressionScheduler {
    ProgressionScheduler::new(SchedulerConfig::default())
}

// =========================================================================
// Config
// =========================================================================

#[test]
fn test_validated_raises_zero_draw_interval() {
    let cfg = SchedulerConfig {
        min_draw_interval: Duration::ZERO,
        ..SchedulerConfig::default()
    }
    .validated();
    assert_eq!(cfg.min_draw_interval, Duration::from_millis(1));
}

#[test]
fn test_new_scheduler_is_idle() {
    let s = scheduler();
    assert!(!s.is_armed());
    assert_eq!(s.generation(), 0);
    assert_eq!(s.armed_kind(), None);
}

// =========================================================================
// Firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_draw_fires_after_interval() {
    let mut s = scheduler();
    let start = Instant::now();

    let generation = s.schedule_next_draw(Duration::from_secs(4));
    let fired = s.wait_for_fire().await;

    assert_eq!(fired.generation, generation);
    assert_eq!(fired.kind, TimerKind::Draw);
    assert!(start.elapsed() >= Duration::from_secs(4));
    assert!(!s.is_armed(), "a fired timer is disarmed");
    assert_eq!(s.stats().fired, 1);
}

#[tokio::test(start_paused = true)]
async fn test_fire_reports_lateness_when_polled_after_deadline() {
    let mut s = scheduler();

    s.schedule_next_draw(Duration::from_secs(4));
    let on_time = s.wait_for_fire().await;
    assert!(on_time.late_by <= Duration::from_millis(1));

    s.schedule_next_draw(Duration::from_secs(4));
    tokio::time::sleep(Duration::from_secs(6)).await;
    let late = s.wait_for_fire().await;
    assert!(late.late_by >= Duration::from_secs(2));
    assert!(late.late_by <= Duration::from_millis(2_002));
}

#[tokio::test(start_paused = true)]
async fn test_draw_interval_clamped_to_minimum() {
    let mut s = scheduler();
    let start = Instant::now();

    s.schedule_next_draw(Duration::from_millis(10));
    s.wait_for_fire().await;

    assert!(start.elapsed() >= Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_question_timer_reports_its_question() {
    let mut s = scheduler();

    s.arm_question_timer(Duration::from_secs(20), 2, 3);
    let fired = s.wait_for_fire().await;

    assert_eq!(
        fired.kind,
        TimerKind::QuestionCountdown {
            round: 2,
            question_index: 3
        }
    );
}

// =========================================================================
// Single outstanding timer
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_rearm_supersedes_previous_timer() {
    let mut s = scheduler();

    let first = s.schedule_next_draw(Duration::from_secs(1));
    let second = s.arm_question_timer(Duration::from_secs(30), 1, 1);

    assert_ne!(first, second);
    assert!(!s.is_current(first));
    assert!(s.is_current(second));

    let fired = s.wait_for_fire().await;
    assert_eq!(fired.generation, second);
    assert_eq!(s.stats().superseded, 1);
    assert_eq!(s.stats().fired, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_prevents_firing() {
    let mut s = scheduler();
    s.schedule_next_draw(Duration::from_secs(1));

    assert!(s.cancel());
    assert!(!s.cancel(), "second cancel has nothing to disarm");

    let result =
        tokio::time::timeout(Duration::from_secs(60), s.wait_for_fire()).await;
    assert!(result.is_err(), "cancelled scheduler should pend");
    assert_eq!(s.stats().cancelled, 1);
}

#[tokio::test(start_paused = true)]
async fn test_idle_scheduler_pends_forever() {
    let mut s = scheduler();
    let result =
        tokio::time::timeout(Duration::from_secs(3600), s.wait_for_fire()).await;
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_dropped_wait_leaves_timer_armed() {
    // select! drops the losing branch; the timer must survive that.
    let mut s = scheduler();
    let generation = s.schedule_next_draw(Duration::from_secs(5));

    let _ = tokio::time::timeout(Duration::from_secs(1), s.wait_for_fire()).await;
    assert!(s.is_current(generation));

    let fired = s.wait_for_fire().await;
    assert_eq!(fired.generation, generation);
}

#[tokio::test(start_paused = true)]
async fn test_generations_increase_monotonically() {
    let mut s = scheduler();
    let mut last = 0;
    for _ in 0..5 {
        let g = s.schedule_next_draw(Duration::from_secs(1));
        assert!(g > last);
        last = g;
    }
    assert_eq!(s.generation(), 5);
    assert_eq!(s.stats().armed, 5);
}
