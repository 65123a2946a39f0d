//! Effect system
//!
//! Applies and removes temporary effects, drives their periodic ticks and
//! timed expiration through the time manager, and keeps effective stats
//! consistent. Scheduled callbacks hold IDs only and re-resolve their
//! referents on every fire.
//!
//! The periodic tick clamps health to a floor of 1: a pure damage-over-time
//! effect wears its victim down but cannot kill. Healing is a negative
//! magnitude and never overshoots `max_health`.

use std::time::Duration;

use hashbrown::HashMap;

use emberwake_types::EntityId;

use crate::engine::WorldEngine;
use crate::systems::dispatcher::GameEvent;
use crate::world::{Effect, EffectType, Stat};

/// Parameters for a new effect application.
#[derive(Debug, Clone)]
pub struct EffectSpec {
    pub name: String,
    pub effect_type: EffectType,
    /// Total duration in seconds; 0 = until removed.
    pub duration_secs: f64,
    pub stat_modifiers: HashMap<Stat, i32>,
    /// HP change per tick: positive harms, negative heals.
    pub magnitude: i32,
    /// Seconds between ticks; 0 = not periodic.
    pub interval_secs: f64,
}

impl EffectSpec {
    pub fn new(name: impl Into<String>, effect_type: EffectType) -> Self {
        Self {
            name: name.into(),
            effect_type,
            duration_secs: 0.0,
            stat_modifiers: HashMap::new(),
            magnitude: 0,
            interval_secs: 0.0,
        }
    }

    pub fn duration(mut self, secs: f64) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn modifier(mut self, stat: Stat, delta: i32) -> Self {
        self.stat_modifiers.insert(stat, delta);
        self
    }

    pub fn periodic(mut self, magnitude: i32, interval_secs: f64) -> Self {
        self.magnitude = magnitude;
        self.interval_secs = interval_secs;
        self
    }
}

/// Apply an effect to an entity, scheduling its periodic tick and timed
/// expiration. Returns the fresh effect ID, or `None` if the entity does
/// not exist.
pub fn apply_effect(
    engine: &mut WorldEngine,
    entity_id: &EntityId,
    spec: EffectSpec,
) -> Option<String> {
    let effect_id = engine.world.mint_id("effect");

    let effect = Effect {
        effect_id: effect_id.clone(),
        name: spec.name,
        effect_type: spec.effect_type,
        stat_modifiers: spec.stat_modifiers,
        duration_secs: spec.duration_secs,
        applied_at: chrono::Utc::now(),
        interval_secs: spec.interval_secs,
        magnitude: spec.magnitude,
        expiration_event_id: None,
        periodic_event_id: None,
    };
    let is_periodic = effect.is_periodic();

    let mut entity = engine.world.entity_mut(entity_id)?;
    entity.base_mut().apply_effect(effect);

    let mut periodic_event_id = None;
    if is_periodic {
        let event_id = engine.world.mint_id("effect_tick");
        let interval = Duration::from_secs_f64(spec.interval_secs);
        let tick_entity = entity_id.clone();
        let tick_effect = effect_id.clone();
        let tick_event = event_id.clone();
        engine.timers.schedule_recurring(
            interval,
            interval,
            Some(&event_id),
            Box::new(move |engine| periodic_tick(engine, &tick_entity, &tick_effect, &tick_event)),
        );
        periodic_event_id = Some(event_id);
    }

    let mut expiration_event_id = None;
    if spec.duration_secs > 0.0 {
        let event_id = engine.world.mint_id("effect_expire");
        let exp_entity = entity_id.clone();
        let exp_effect = effect_id.clone();
        engine.timers.schedule_once(
            Duration::from_secs_f64(spec.duration_secs),
            Some(&event_id),
            Box::new(move |engine| expire_effect(engine, &exp_entity, &exp_effect)),
        );
        expiration_event_id = Some(event_id);
    }

    // Record the scheduled event IDs on the stored effect for cleanup.
    if let Some(mut entity) = engine.world.entity_mut(entity_id)
        && let Some(stored) = entity.base_mut().active_effects.get_mut(&effect_id)
    {
        stored.periodic_event_id = periodic_event_id;
        stored.expiration_event_id = expiration_event_id;
    }

    Some(effect_id)
}

/// Remove an effect, cancelling its scheduled events.
pub fn remove_effect(
    engine: &mut WorldEngine,
    entity_id: &EntityId,
    effect_id: &str,
) -> Option<Effect> {
    let effect = engine
        .world
        .entity_mut(entity_id)?
        .base_mut()
        .remove_effect(effect_id)?;
    if let Some(id) = &effect.periodic_event_id {
        engine.timers.cancel(id);
    }
    if let Some(id) = &effect.expiration_event_id {
        engine.timers.cancel(id);
    }
    Some(effect)
}

/// One periodic tick. Re-resolves the entity and effect; if either is gone
/// the tick cancels itself and does nothing.
fn periodic_tick(
    engine: &mut WorldEngine,
    entity_id: &EntityId,
    effect_id: &str,
    own_event_id: &str,
) -> Vec<GameEvent> {
    let Some(mut entity) = engine.world.entity_mut(entity_id) else {
        engine.timers.cancel(own_event_id);
        return Vec::new();
    };
    let base = entity.base_mut();
    let Some(effect) = base.active_effects.get(effect_id) else {
        engine.timers.cancel(own_event_id);
        return Vec::new();
    };
    let magnitude = effect.magnitude;

    // Positive magnitude harms, negative heals. The floor of 1 means a
    // periodic effect never kills; the ceiling keeps healing honest.
    let old_health = base.current_health;
    base.current_health = (base.current_health - magnitude).clamp(1, base.max_health);
    let delta = base.current_health - old_health;

    let mut events = Vec::new();
    if let Some(player) = engine.world.players.get(entity_id) {
        let text = if magnitude > 0 {
            format!(
                "🤢 *The poison burns through your veins!* You take {} damage.",
                -delta
            )
        } else {
            format!(
                "💚 *Healing energy flows through you!* You heal for {delta} health."
            )
        };
        events.push(GameEvent::to_player(entity_id.clone(), text));
        events.push(GameEvent::stat_update(player));
    }
    events
}

/// Timed expiration: cancel the periodic tick, drop the effect, and tell
/// the player what faded.
fn expire_effect(engine: &mut WorldEngine, entity_id: &EntityId, effect_id: &str) -> Vec<GameEvent> {
    let Some(mut entity) = engine.world.entity_mut(entity_id) else {
        return Vec::new();
    };
    let Some(effect) = entity.base_mut().remove_effect(effect_id) else {
        return Vec::new();
    };
    if let Some(id) = &effect.periodic_event_id {
        engine.timers.cancel(id);
    }

    let mut events = Vec::new();
    if let Some(player) = engine.world.players.get(entity_id) {
        let text = match effect.effect_type {
            EffectType::Dot => "🧪 The poison has run its course.".to_string(),
            EffectType::Hot => "💚 The healing effect fades.".to_string(),
            EffectType::Buff => format!("✨ The {} fades away.", effect.name),
            EffectType::Debuff => format!("{} wears off.", effect.name),
        };
        events.push(GameEvent::to_player(entity_id.clone(), text));
        // Stat modifiers just lapsed; refresh the client sheet.
        if !effect.stat_modifiers.is_empty() {
            events.push(GameEvent::stat_update(player));
        }
    }
    events
}

/// Formatted summary of an entity's active effects.
pub fn effect_summary(world: &crate::world::World, entity_id: &EntityId) -> String {
    let Some(entity) = world.entity(entity_id) else {
        return "You have no active effects.".to_string();
    };
    let effects = &entity.base().active_effects;
    if effects.is_empty() {
        return "You have no active effects.".to_string();
    }

    let now = chrono::Utc::now();
    let mut lines = vec!["═══ Active Effects ═══".to_string(), String::new()];
    let mut sorted: Vec<&Effect> = effects.values().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    for effect in sorted {
        lines.push(format!(
            "**{}** ({})",
            effect.name,
            effect.effect_type.label()
        ));
        if effect.duration_secs > 0.0 {
            lines.push(format!(
                "  Duration: {:.1}s remaining",
                effect.remaining_duration(now)
            ));
        }
        if !effect.stat_modifiers.is_empty() {
            let mut mods: Vec<String> = effect
                .stat_modifiers
                .iter()
                .map(|(stat, delta)| format!("{} {delta:+}", stat.label()))
                .collect();
            mods.sort();
            lines.push(format!("  Modifiers: {}", mods.join(", ")));
        }
        if effect.magnitude != 0 {
            lines.push(format!(
                "  Periodic: {:+} HP every {:.1}s",
                -effect.magnitude, effect.interval_secs
            ));
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

#[cfg(test)]
mod effects_tests;
