//! Tests for the time event manager
//!
//! Verifies heap ordering, lazy cancellation, ID collisions, and the
//! recurring requeue discipline.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use crate::test_support::test_engine;
use crate::world::World;

type Log = Arc<Mutex<Vec<&'static str>>>;

fn logging_callback(log: &Log, label: &'static str) -> super::TimerCallback {
    let log = Arc::clone(log);
    Box::new(move |_engine| {
        log.lock().unwrap().push(label);
        Vec::new()
    })
}

#[tokio::test(start_paused = true)]
async fn events_fire_in_deadline_order() {
    let (mut engine, _handle) = test_engine(World::new());
    let log: Log = Arc::default();

    engine
        .timers
        .schedule_once(Duration::from_secs(3), Some("late"), logging_callback(&log, "late"));
    engine
        .timers
        .schedule_once(Duration::from_secs(1), Some("early"), logging_callback(&log, "early"));

    tokio::time::advance(Duration::from_secs(5)).await;
    engine.fire_due();

    assert_eq!(*log.lock().unwrap(), vec!["early", "late"]);
    assert!(engine.timers.is_empty());
}

#[tokio::test(start_paused = true)]
async fn equal_deadlines_fire_in_insertion_order() {
    let (mut engine, _handle) = test_engine(World::new());
    let log: Log = Arc::default();

    for label in ["first", "second", "third"] {
        engine
            .timers
            .schedule_once(Duration::from_secs(2), Some(label), logging_callback(&log, label));
    }

    tokio::time::advance(Duration::from_secs(2)).await;
    engine.fire_due();

    assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
}

#[tokio::test(start_paused = true)]
async fn cancelled_events_never_run() {
    let (mut engine, _handle) = test_engine(World::new());
    let log: Log = Arc::default();

    engine
        .timers
        .schedule_once(Duration::from_secs(1), Some("doomed"), logging_callback(&log, "doomed"));
    assert!(engine.timers.cancel("doomed"));
    assert!(!engine.timers.cancel("doomed"), "double cancel reports false");

    tokio::time::advance(Duration::from_secs(2)).await;
    engine.fire_due();

    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn colliding_id_replaces_prior_entry() {
    let (mut engine, _handle) = test_engine(World::new());
    let log: Log = Arc::default();

    engine
        .timers
        .schedule_once(Duration::from_secs(1), Some("shared"), logging_callback(&log, "old"));
    engine
        .timers
        .schedule_once(Duration::from_secs(2), Some("shared"), logging_callback(&log, "new"));
    assert_eq!(engine.timers.len(), 1);

    tokio::time::advance(Duration::from_secs(3)).await;
    engine.fire_due();

    // Only the replacement fires; the stale heap key is skipped.
    assert_eq!(*log.lock().unwrap(), vec!["new"]);
}

#[tokio::test(start_paused = true)]
async fn recurring_event_requeues_until_cancelled() {
    let (mut engine, _handle) = test_engine(World::new());
    let log: Log = Arc::default();

    engine.timers.schedule_recurring(
        Duration::from_secs(1),
        Duration::from_secs(1),
        Some("pulse"),
        logging_callback(&log, "tick"),
    );

    for _ in 0..3 {
        tokio::time::advance(Duration::from_secs(1)).await;
        engine.fire_due();
    }
    assert_eq!(log.lock().unwrap().len(), 3);
    assert!(engine.timers.contains("pulse"));

    engine.timers.cancel("pulse");
    tokio::time::advance(Duration::from_secs(2)).await;
    engine.fire_due();
    assert_eq!(log.lock().unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn recurring_event_can_cancel_itself() {
    let (mut engine, _handle) = test_engine(World::new());
    let log: Log = Arc::default();

    let inner = Arc::clone(&log);
    engine.timers.schedule_recurring(
        Duration::from_secs(1),
        Duration::from_secs(1),
        Some("one_shot_recurring"),
        Box::new(move |engine| {
            inner.lock().unwrap().push("fired");
            engine.timers.cancel("one_shot_recurring");
            Vec::new()
        }),
    );

    tokio::time::advance(Duration::from_secs(1)).await;
    engine.fire_due();
    tokio::time::advance(Duration::from_secs(3)).await;
    engine.fire_due();

    assert_eq!(*log.lock().unwrap(), vec!["fired"]);
    assert!(!engine.timers.contains("one_shot_recurring"));
}

#[tokio::test(start_paused = true)]
async fn callback_scheduled_events_wait_for_next_pass() {
    let (mut engine, _handle) = test_engine(World::new());
    let log: Log = Arc::default();

    let inner = Arc::clone(&log);
    engine.timers.schedule_once(
        Duration::from_secs(1),
        Some("outer"),
        Box::new(move |engine| {
            inner.lock().unwrap().push("outer");
            let inner2 = Arc::clone(&inner);
            engine.timers.schedule_once(
                Duration::ZERO,
                Some("inner"),
                Box::new(move |_| {
                    inner2.lock().unwrap().push("inner");
                    Vec::new()
                }),
            );
            Vec::new()
        }),
    );

    tokio::time::advance(Duration::from_secs(1)).await;
    engine.fire_due();
    // The nested zero-delay event lands at a deadline >= this pass's
    // cutoff, so it runs on the following pass.
    assert_eq!(*log.lock().unwrap(), vec!["outer"]);

    tokio::time::advance(Duration::from_millis(1)).await;
    engine.fire_due();
    assert_eq!(*log.lock().unwrap(), vec!["outer", "inner"]);
}

#[tokio::test(start_paused = true)]
async fn next_deadline_skips_stale_keys() {
    let (mut engine, _handle) = test_engine(World::new());
    let log: Log = Arc::default();

    engine
        .timers
        .schedule_once(Duration::from_secs(1), Some("a"), logging_callback(&log, "a"));
    engine
        .timers
        .schedule_once(Duration::from_secs(5), Some("b"), logging_callback(&log, "b"));
    engine.timers.cancel("a");

    let deadline = engine.timers.next_deadline().expect("b still live");
    assert!(deadline >= Instant::now() + Duration::from_secs(4));
}
