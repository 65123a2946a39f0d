//! Time event manager
//!
//! A stable min-heap of scheduled callbacks, ordered by deadline with
//! insertion order breaking ties. This is the sole driver of deferred game
//! logic — NPC ticks, combat swings, effect expiry, respawns, triggers,
//! persistence flushes — there is no global tick.
//!
//! Cancellation is lazy: `cancel` drops the live entry and stale heap keys
//! are skipped on pop. Scheduling over an existing event ID replaces the
//! prior entry. Callbacks run one at a time on the engine loop; events a
//! callback schedules are not observed until it returns.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

use hashbrown::HashMap;
use tokio::time::Instant;

use emberwake_types::EventId;

use crate::engine::WorldEngine;
use crate::systems::dispatcher::GameEvent;

/// A deferred piece of game logic run with exclusive engine access.
pub type TimerCallback = Box<dyn FnMut(&mut WorldEngine) -> Vec<GameEvent> + Send>;

/// A live scheduled event.
pub struct TimeEvent {
    pub event_id: EventId,
    pub execute_at: Instant,
    pub recurring: bool,
    pub interval: Duration,
    seq: u64,
    pub(crate) callback: TimerCallback,
}

impl std::fmt::Debug for TimeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeEvent")
            .field("event_id", &self.event_id)
            .field("execute_at", &self.execute_at)
            .field("recurring", &self.recurring)
            .field("interval", &self.interval)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

/// Heap key: earliest deadline first, then insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HeapKey {
    execute_at: Instant,
    seq: u64,
    event_id: EventId,
}

impl Ord for HeapKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the BinaryHeap max-heap yields the earliest entry.
        other
            .execute_at
            .cmp(&self.execute_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for HeapKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
pub struct TimeEventManager {
    heap: BinaryHeap<HeapKey>,
    entries: HashMap<EventId, TimeEvent>,
    next_seq: u64,
    /// Event currently running on the engine loop. `cancel` on it cannot
    /// remove a live entry (it is detached), so the flag records the intent
    /// and the loop skips the recurring requeue.
    executing: Option<EventId>,
    executing_cancelled: bool,
}

impl TimeEventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a one-shot callback after `delay`. A colliding `event_id`
    /// cancels the prior entry.
    pub fn schedule_once(
        &mut self,
        delay: Duration,
        event_id: Option<&str>,
        callback: TimerCallback,
    ) -> EventId {
        self.schedule_inner(delay, event_id, false, Duration::ZERO, callback)
    }

    /// Schedule a recurring callback: first fire after `delay`, then every
    /// `interval` after each completion.
    pub fn schedule_recurring(
        &mut self,
        delay: Duration,
        interval: Duration,
        event_id: Option<&str>,
        callback: TimerCallback,
    ) -> EventId {
        self.schedule_inner(delay, event_id, true, interval, callback)
    }

    fn schedule_inner(
        &mut self,
        delay: Duration,
        event_id: Option<&str>,
        recurring: bool,
        interval: Duration,
        callback: TimerCallback,
    ) -> EventId {
        self.next_seq += 1;
        let seq = self.next_seq;
        let event_id = match event_id {
            Some(id) => id.to_string(),
            None => format!("evt_{seq:08}"),
        };
        // Collision replaces the live entry; the stale heap key is skipped
        // on pop because its seq no longer matches.
        if self.entries.contains_key(&event_id) {
            tracing::debug!(event = %event_id, "rescheduling over live time event");
        }
        let execute_at = Instant::now() + delay;
        self.entries.insert(
            event_id.clone(),
            TimeEvent {
                event_id: event_id.clone(),
                execute_at,
                recurring,
                interval,
                seq,
                callback,
            },
        );
        self.heap.push(HeapKey {
            execute_at,
            seq,
            event_id: event_id.clone(),
        });
        event_id
    }

    /// Mark an event cancelled. Heap cleanup is lazy. Returns whether a
    /// live entry was removed; a cancelled event's callback never runs.
    /// Cancelling the event currently executing suppresses its recurring
    /// requeue instead (the in-flight invocation is not interrupted).
    pub fn cancel(&mut self, event_id: &str) -> bool {
        if self.entries.remove(event_id).is_some() {
            return true;
        }
        if self.executing.as_deref() == Some(event_id) {
            self.executing_cancelled = true;
            return true;
        }
        false
    }

    /// Record the event whose callback is about to run.
    pub fn begin_execution(&mut self, event_id: &str) {
        self.executing = Some(event_id.to_string());
        self.executing_cancelled = false;
    }

    /// Clear the in-flight record; returns whether the running event was
    /// cancelled from within its own callback.
    pub fn end_execution(&mut self) -> bool {
        self.executing = None;
        std::mem::take(&mut self.executing_cancelled)
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.entries.contains_key(event_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deadline of the earliest live entry, pruning stale heap keys.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(top) = self.heap.peek() {
            let live = self
                .entries
                .get(&top.event_id)
                .is_some_and(|e| e.seq == top.seq);
            if live {
                return Some(top.execute_at);
            }
            self.heap.pop();
        }
        None
    }

    /// Sequence cutoff for one drain pass: entries scheduled after this
    /// point are not observed until the next pass.
    pub fn current_seq(&self) -> u64 {
        self.next_seq
    }

    /// Remove and return the earliest entry due at `now` that was
    /// scheduled at or before `cutoff_seq`, skipping cancelled and
    /// superseded keys. The entry is detached from the manager, so its
    /// callback may freely schedule further events; recurring entries are
    /// handed back via `requeue`. The cutoff keeps zero-delay events
    /// scheduled from inside a callback out of the current drain.
    pub fn pop_due(&mut self, now: Instant, cutoff_seq: u64) -> Option<TimeEvent> {
        loop {
            let top = self.heap.peek()?;
            if top.execute_at > now || top.seq > cutoff_seq {
                // New events land at `now` or later with a larger seq, so
                // once the top is past the cutoff everything due is too.
                return None;
            }
            let key = self.heap.pop()?;
            match self.entries.get(&key.event_id) {
                Some(entry) if entry.seq == key.seq => {
                    return self.entries.remove(&key.event_id);
                }
                // Cancelled or replaced; skip the stale key.
                _ => continue,
            }
        }
    }

    /// Re-enqueue a recurring event with `execute_at = now + interval`.
    pub fn requeue(&mut self, mut event: TimeEvent, now: Instant) {
        self.next_seq += 1;
        event.seq = self.next_seq;
        event.execute_at = now + event.interval;
        self.heap.push(HeapKey {
            execute_at: event.execute_at,
            seq: event.seq,
            event_id: event.event_id.clone(),
        });
        self.entries.insert(event.event_id.clone(), event);
    }
}

impl std::fmt::Debug for TimeEventManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeEventManager")
            .field("live_entries", &self.entries.len())
            .field("heap_keys", &self.heap.len())
            .finish()
    }
}

#[cfg(test)]
mod manager_tests;
