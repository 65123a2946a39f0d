//! Trigger system
//!
//! Conditional actions attached to rooms and areas. Triggers fire on
//! movement hooks (`on_enter` / `on_exit`, area boundary crossings), on
//! command tokens no handler consumed (`on_command` with a wildcard
//! pattern), and on per-trigger timers scheduled through the time manager.
//!
//! Conditions are pure predicates evaluated in order; all must hold.
//! Actions execute in order and may mutate the world (flags, item grants,
//! teleports, room description/exit overrides). Per-trigger `cooldown` and
//! `max_fires` gate re-firing; disabled triggers are skipped.

use std::time::Duration;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use emberwake_types::{AreaId, Direction, PlayerId, RoomId, TemplateId};

use crate::engine::WorldEngine;
use crate::inventory;
use crate::systems::dispatcher::GameEvent;
use crate::systems::look;
use crate::world::World;

// ─────────────────────────────────────────────────────────────────────────────
// Definitions
// ─────────────────────────────────────────────────────────────────────────────

/// Hook a trigger listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEventKind {
    OnEnter,
    OnExit,
    OnCommand,
    OnTimer,
    OnAreaEnter,
    OnAreaExit,
}

/// Pure predicate over the firing context. All conditions must hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerCondition {
    /// Player carries the named flag.
    FlagSet { flag: String },
    /// Player holds at least one item of the template.
    HasItem { template_id: TemplateId },
    /// Player stands in a specific room.
    AtRoom { room_id: RoomId },
    /// Player level meets a minimum.
    PlayerLevelAtLeast { level: u32 },
}

/// Action executed when a trigger fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerAction {
    MessagePlayer {
        text: String,
    },
    MessageRoom {
        text: String,
    },
    SetFlag {
        flag: String,
    },
    GrantItem {
        template_id: TemplateId,
        #[serde(default = "default_one")]
        quantity: u32,
    },
    Teleport {
        room_id: RoomId,
    },
    OverrideRoomDescription {
        text: String,
    },
    /// Exit map keyed by direction name, merged over the authored exits.
    OverrideRoomExits {
        exits: HashMap<String, RoomId>,
    },
    /// Schedule a one-shot message through the time manager.
    ScheduleMessage {
        delay_secs: f64,
        text: String,
        #[serde(default)]
        to_room: bool,
    },
}

fn default_one() -> u32 {
    1
}

fn default_max_fires() -> i64 {
    -1
}

fn default_enabled() -> bool {
    true
}

/// A conditional action set attached to a room or area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub id: String,
    pub event: TriggerEventKind,
    #[serde(default)]
    pub conditions: Vec<TriggerCondition>,
    pub actions: Vec<TriggerAction>,

    /// Wildcard pattern for `on_command` ("pull*lever").
    #[serde(default)]
    pub command_pattern: Option<String>,
    /// Seconds between `on_timer` fires.
    #[serde(default)]
    pub timer_interval: Option<f64>,
    /// Delay before the first `on_timer` fire; defaults to the interval.
    #[serde(default)]
    pub timer_initial_delay: Option<f64>,

    /// Minimum seconds between fires.
    #[serde(default)]
    pub cooldown: f64,
    /// Fire budget; -1 = unlimited.
    #[serde(default = "default_max_fires")]
    pub max_fires: i64,
    #[serde(default)]
    pub fire_count: u64,
    #[serde(skip)]
    pub last_fired: Option<Instant>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Trigger {
    pub fn new(id: impl Into<String>, event: TriggerEventKind, actions: Vec<TriggerAction>) -> Self {
        Self {
            id: id.into(),
            event,
            conditions: Vec::new(),
            actions,
            command_pattern: None,
            timer_interval: None,
            timer_initial_delay: None,
            cooldown: 0.0,
            max_fires: -1,
            fire_count: 0,
            last_fired: None,
            enabled: true,
        }
    }

    fn eligible(&self, now: Instant) -> bool {
        if !self.enabled {
            return false;
        }
        if self.max_fires >= 0 && self.fire_count >= self.max_fires as u64 {
            return false;
        }
        if self.cooldown > 0.0
            && let Some(last) = self.last_fired
            && now.duration_since(last).as_secs_f64() < self.cooldown
        {
            return false;
        }
        true
    }
}

/// Who owns a trigger list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOwner {
    Room(RoomId),
    Area(AreaId),
}

/// Context a firing evaluates against.
#[derive(Debug, Clone)]
pub struct TriggerContext {
    /// Acting player; absent for timer fires.
    pub player_id: Option<PlayerId>,
    pub room_id: RoomId,
    pub event: TriggerEventKind,
    /// Raw command text for `on_command`.
    pub command: Option<String>,
    pub direction: Option<Direction>,
}

impl TriggerContext {
    pub fn movement(player_id: &str, room_id: &str, event: TriggerEventKind, direction: Direction) -> Self {
        Self {
            player_id: Some(player_id.to_string()),
            room_id: room_id.to_string(),
            event,
            command: None,
            direction: Some(direction),
        }
    }

    pub fn command(player_id: &str, room_id: &str, raw: &str) -> Self {
        Self {
            player_id: Some(player_id.to_string()),
            room_id: room_id.to_string(),
            event: TriggerEventKind::OnCommand,
            command: Some(raw.to_string()),
            direction: None,
        }
    }

    pub fn timer(room_id: &str) -> Self {
        Self {
            player_id: None,
            room_id: room_id.to_string(),
            event: TriggerEventKind::OnTimer,
            command: None,
            direction: None,
        }
    }
}

/// What a firing pass produced.
#[derive(Debug, Default)]
pub struct TriggerOutcome {
    pub events: Vec<GameEvent>,
    /// Number of triggers that fired (consumed the event).
    pub fired: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Pattern Matching
// ─────────────────────────────────────────────────────────────────────────────

/// Case-insensitive wildcard match where `*` spans any (possibly empty)
/// substring: `pull*lever` matches `pull rusty lever`.
pub fn wildcard_match(pattern: &str, input: &str) -> bool {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let input: Vec<char> = input.to_lowercase().chars().collect();

    let (mut p, mut i) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while i < input.len() {
        if p < pattern.len() && (pattern[p] == input[i]) {
            p += 1;
            i += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, i));
            p += 1;
        } else if let Some((star_p, star_i)) = star {
            // Backtrack: the star swallows one more character
            p = star_p + 1;
            i = star_i + 1;
            star = Some((star_p, star_i + 1));
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

// ─────────────────────────────────────────────────────────────────────────────
// Firing
// ─────────────────────────────────────────────────────────────────────────────

fn owner_triggers<'a>(world: &'a World, owner: &TriggerOwner) -> Option<&'a Vec<Trigger>> {
    match owner {
        TriggerOwner::Room(id) => world.rooms.get(id).map(|r| &r.triggers),
        TriggerOwner::Area(id) => world.areas.get(id).map(|a| &a.triggers),
    }
}

fn conditions_hold(world: &World, ctx: &TriggerContext, conditions: &[TriggerCondition]) -> bool {
    conditions.iter().all(|condition| match condition {
        TriggerCondition::FlagSet { flag } => ctx
            .player_id
            .as_deref()
            .and_then(|id| world.players.get(id))
            .is_some_and(|p| p.player_flags.contains(flag)),
        TriggerCondition::HasItem { template_id } => ctx
            .player_id
            .as_deref()
            .and_then(|id| world.players.get(id))
            .is_some_and(|p| {
                p.inventory_items
                    .iter()
                    .filter_map(|item_id| world.items.get(item_id))
                    .any(|item| &item.template_id == template_id)
            }),
        TriggerCondition::AtRoom { room_id } => ctx
            .player_id
            .as_deref()
            .and_then(|id| world.players.get(id))
            .is_some_and(|p| &p.base.room_id == room_id),
        TriggerCondition::PlayerLevelAtLeast { level } => ctx
            .player_id
            .as_deref()
            .and_then(|id| world.players.get(id))
            .is_some_and(|p| p.level >= *level),
    })
}

/// Fire every eligible trigger of `kind` on the owner against `ctx`.
pub fn fire_event(
    engine: &mut WorldEngine,
    owner: &TriggerOwner,
    kind: TriggerEventKind,
    ctx: &TriggerContext,
) -> TriggerOutcome {
    let now = Instant::now();
    let candidates: Vec<Trigger> = owner_triggers(&engine.world, owner)
        .map(|triggers| {
            triggers
                .iter()
                .filter(|t| t.event == kind && t.eligible(now))
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    let mut outcome = TriggerOutcome::default();
    for trigger in candidates {
        if kind == TriggerEventKind::OnCommand {
            let matched = match (&trigger.command_pattern, &ctx.command) {
                (Some(pattern), Some(raw)) => wildcard_match(pattern, raw.trim()),
                _ => false,
            };
            if !matched {
                continue;
            }
        }
        if !conditions_hold(&engine.world, ctx, &trigger.conditions) {
            continue;
        }
        tracing::debug!(trigger = %trigger.id, event = ?kind, "trigger fired");
        for action in &trigger.actions {
            outcome.events.extend(execute_action(engine, owner, ctx, action));
        }
        mark_fired(engine, owner, &trigger.id, now);
        outcome.fired += 1;
    }
    outcome
}

/// Fire one specific trigger by ID regardless of its event kind. Used by
/// the per-trigger timer callbacks.
pub fn fire_specific(
    engine: &mut WorldEngine,
    owner: &TriggerOwner,
    trigger_id: &str,
    ctx: &TriggerContext,
) -> TriggerOutcome {
    let now = Instant::now();
    let trigger = owner_triggers(&engine.world, owner)
        .and_then(|ts| ts.iter().find(|t| t.id == trigger_id))
        .filter(|t| t.eligible(now))
        .cloned();

    let mut outcome = TriggerOutcome::default();
    let Some(trigger) = trigger else {
        return outcome;
    };
    if !conditions_hold(&engine.world, ctx, &trigger.conditions) {
        return outcome;
    }
    for action in &trigger.actions {
        outcome.events.extend(execute_action(engine, owner, ctx, action));
    }
    mark_fired(engine, owner, &trigger.id, now);
    outcome.fired += 1;
    outcome
}

fn mark_fired(engine: &mut WorldEngine, owner: &TriggerOwner, trigger_id: &str, now: Instant) {
    let triggers = match owner {
        TriggerOwner::Room(id) => engine.world.rooms.get_mut(id).map(|r| &mut r.triggers),
        TriggerOwner::Area(id) => engine.world.areas.get_mut(id).map(|a| &mut a.triggers),
    };
    if let Some(triggers) = triggers
        && let Some(trigger) = triggers.iter_mut().find(|t| t.id == trigger_id)
    {
        trigger.fire_count += 1;
        trigger.last_fired = Some(now);
    }
}

fn execute_action(
    engine: &mut WorldEngine,
    owner: &TriggerOwner,
    ctx: &TriggerContext,
    action: &TriggerAction,
) -> Vec<GameEvent> {
    let mut events = Vec::new();
    match action {
        TriggerAction::MessagePlayer { text } => {
            if let Some(player_id) = &ctx.player_id {
                events.push(GameEvent::to_player(player_id.clone(), text.clone()));
            }
        }
        TriggerAction::MessageRoom { text } => match owner {
            TriggerOwner::Area(area_id) => {
                // Area-owned triggers speak to every room in the area.
                let rooms: Vec<RoomId> = engine
                    .world
                    .areas
                    .get(area_id)
                    .map(|a| a.room_ids.iter().cloned().collect())
                    .unwrap_or_default();
                for room_id in rooms {
                    events.push(GameEvent::to_room(room_id, text.clone()));
                }
            }
            TriggerOwner::Room(_) => {
                events.push(GameEvent::to_room(ctx.room_id.clone(), text.clone()));
            }
        },
        TriggerAction::SetFlag { flag } => {
            if let Some(player_id) = &ctx.player_id
                && let Some(player) = engine.world.players.get_mut(player_id)
            {
                player.player_flags.insert(flag.clone());
                engine.dirty.mark(player_id);
            }
        }
        TriggerAction::GrantItem { template_id, quantity } => {
            if let Some(player_id) = ctx.player_id.clone() {
                events.extend(inventory::grant_item(engine, &player_id, template_id, *quantity));
            }
        }
        TriggerAction::Teleport { room_id } => {
            if let Some(player_id) = ctx.player_id.clone()
                && engine.world.rooms.contains_key(room_id)
            {
                let old_room = engine
                    .world
                    .players
                    .get(&player_id)
                    .map(|p| p.base.room_id.clone());
                if let Some(old_room) = old_room {
                    if let Some(room) = engine.world.rooms.get_mut(&old_room) {
                        room.entities.remove(player_id.as_str());
                    }
                    if let Some(room) = engine.world.rooms.get_mut(room_id) {
                        room.entities.insert(player_id.clone());
                    }
                    if let Some(player) = engine.world.players.get_mut(&player_id) {
                        player.base.room_id = room_id.clone();
                    }
                    engine.dirty.mark(&player_id);
                    events.push(GameEvent::to_player(
                        player_id.clone(),
                        "The world lurches around you.",
                    ));
                    events.extend(look::look_at_room(&engine.world, &player_id));
                }
            }
        }
        TriggerAction::OverrideRoomDescription { text } => {
            if let Some(room) = engine.world.rooms.get_mut(&ctx.room_id) {
                room.dynamic_description_override = Some(text.clone());
            }
        }
        TriggerAction::OverrideRoomExits { exits } => {
            if let Some(room) = engine.world.rooms.get_mut(&ctx.room_id) {
                let mut merged = room.exits.clone();
                for (direction, dest) in exits {
                    match direction.parse::<Direction>() {
                        Ok(direction) => {
                            merged.insert(direction, dest.clone());
                        }
                        Err(_) => {
                            tracing::warn!(direction = %direction, "exit override names no direction");
                        }
                    }
                }
                room.dynamic_exits_override = Some(merged);
            }
        }
        TriggerAction::ScheduleMessage { delay_secs, text, to_room } => {
            let text = text.clone();
            let target_player = ctx.player_id.clone();
            let room_id = ctx.room_id.clone();
            let to_room = *to_room;
            engine.timers.schedule_once(
                Duration::from_secs_f64(delay_secs.max(0.0)),
                None,
                Box::new(move |_engine| {
                    if to_room {
                        vec![GameEvent::to_room(room_id.clone(), text.clone())]
                    } else if let Some(player_id) = &target_player {
                        vec![GameEvent::to_player(player_id.clone(), text.clone())]
                    } else {
                        Vec::new()
                    }
                }),
            );
        }
    }
    events
}

// ─────────────────────────────────────────────────────────────────────────────
// Timer Initialization
// ─────────────────────────────────────────────────────────────────────────────

/// Schedule a recurring event for every `on_timer` trigger on rooms and
/// areas. Called once at engine startup.
pub fn initialize_all_timers(engine: &mut WorldEngine) {
    let mut jobs: Vec<(TriggerOwner, String, f64, f64)> = Vec::new();
    for (room_id, room) in &engine.world.rooms {
        for trigger in &room.triggers {
            if trigger.event == TriggerEventKind::OnTimer
                && let Some(interval) = trigger.timer_interval
            {
                let delay = trigger.timer_initial_delay.unwrap_or(interval);
                jobs.push((
                    TriggerOwner::Room(room_id.clone()),
                    trigger.id.clone(),
                    interval,
                    delay,
                ));
            }
        }
    }
    for (area_id, area) in &engine.world.areas {
        for trigger in &area.triggers {
            if trigger.event == TriggerEventKind::OnTimer
                && let Some(interval) = trigger.timer_interval
            {
                let delay = trigger.timer_initial_delay.unwrap_or(interval);
                jobs.push((
                    TriggerOwner::Area(area_id.clone()),
                    trigger.id.clone(),
                    interval,
                    delay,
                ));
            }
        }
    }

    for (owner, trigger_id, interval, delay) in jobs {
        let event_id = match &owner {
            TriggerOwner::Room(id) => format!("trigger_timer_room_{id}_{trigger_id}"),
            TriggerOwner::Area(id) => format!("trigger_timer_area_{id}_{trigger_id}"),
        };
        let callback_owner = owner.clone();
        let callback_trigger = trigger_id.clone();
        engine.timers.schedule_recurring(
            Duration::from_secs_f64(delay.max(0.0)),
            Duration::from_secs_f64(interval.max(0.01)),
            Some(&event_id),
            Box::new(move |engine| {
                let room_id = match &callback_owner {
                    TriggerOwner::Room(id) => id.clone(),
                    TriggerOwner::Area(_) => String::new(),
                };
                let ctx = TriggerContext::timer(&room_id);
                fire_specific(engine, &callback_owner, &callback_trigger, &ctx).events
            }),
        );
    }
}

#[cfg(test)]
mod trigger_tests;
