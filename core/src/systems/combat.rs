//! Combat system
//!
//! Real-time combat as a timed state machine per entity:
//! `idle → windup → swing → recovery`, looping while auto-attack holds.
//! Every transition is a scheduled time event carrying entity IDs only;
//! each callback re-resolves its referents and validates liveness and
//! co-location before acting.
//!
//! Damage math: uniform weapon roll, plus `floor((STR-10)/2)` clamped so
//! the total stays ≥ 1, minus `floor(AC/5)` again clamped to ≥ 1, then a
//! configurable crit roll multiplying the result.

use std::time::Duration;

use tokio::time::Instant;

use emberwake_types::{EntityId, PlayerId, RoomId};

use crate::behaviors::{self, HookArgs};
use crate::config::CombatConfig;
use crate::engine::WorldEngine;
use crate::systems::dice::Dice;
use crate::systems::dispatcher::GameEvent;
use crate::world::templates::DropEntry;
use crate::world::{leveling, CombatPhase, EntityRef, WeaponStats, World};

// ─────────────────────────────────────────────────────────────────────────────
// Weapon Resolution
// ─────────────────────────────────────────────────────────────────────────────

/// Weapon an entity currently fights with: the equipped weapon-slot item,
/// an NPC's natural attack, or bare fists.
pub fn equipped_weapon(world: &World, entity_id: &str) -> WeaponStats {
    if let Some(entity) = world.entity(entity_id) {
        if let Some(template_id) = entity.base().equipped_items.get("weapon")
            && let Some(template) = world.item_templates.get(template_id)
            && let Some(weapon) = &template.weapon
        {
            return weapon.clone();
        }
        if let EntityRef::Npc(npc) = entity
            && let Some(template) = world.npc_templates.get(&npc.template_id)
        {
            return template.weapon.clone();
        }
    }
    WeaponStats::unarmed()
}

// ─────────────────────────────────────────────────────────────────────────────
// Damage Math
// ─────────────────────────────────────────────────────────────────────────────

/// Roll damage for one swing. Returns the final damage and whether the
/// swing crit.
pub fn compute_damage(
    dice: &mut dyn Dice,
    config: &CombatConfig,
    weapon: &WeaponStats,
    attacker_strength: i32,
    target_armor_class: i32,
) -> (i32, bool) {
    let roll = dice.roll_range(weapon.damage_min, weapon.damage_max);
    let strength_bonus = (attacker_strength - 10).div_euclid(2);
    let mut damage = (roll + strength_bonus).max(1);
    let mitigation = target_armor_class.div_euclid(5);
    damage = (damage - mitigation).max(1);
    let crit = dice.chance(config.crit_chance);
    if crit {
        damage = (damage as f64 * config.crit_multiplier) as i32;
    }
    (damage, crit)
}

// ─────────────────────────────────────────────────────────────────────────────
// Attack Initiation
// ─────────────────────────────────────────────────────────────────────────────

/// `attack <target>` handler entry: resolve the keyword and engage.
pub fn attack_command(engine: &mut WorldEngine, player_id: &PlayerId, args: &str) -> Vec<GameEvent> {
    let term = args.trim();
    if term.is_empty() {
        return vec![GameEvent::to_player(player_id.clone(), "Attack whom?")];
    }
    let Some(player) = engine.world.players.get(player_id) else {
        return vec![GameEvent::to_player(player_id.clone(), "You have no form.")];
    };
    if !player.base.is_alive() {
        return vec![GameEvent::to_player(
            player_id.clone(),
            "You can't attack while dead.",
        )];
    }
    let room_id = player.base.room_id.clone();
    let Some(target) = engine.world.find_entity_in_room(&room_id, term, true, true) else {
        return vec![GameEvent::to_player(
            player_id.clone(),
            format!("'{term}' not found."),
        )];
    };
    let target_id = target.base().id.clone();
    start_attack(engine, player_id, &target_id)
}

/// Engage `attacker_id` against `target_id`. Both players and NPCs follow
/// this path so scheduling and messaging stay identical.
pub fn start_attack(engine: &mut WorldEngine, attacker_id: &str, target_id: &str) -> Vec<GameEvent> {
    let mut events = Vec::new();

    let Some(attacker) = engine.world.entity(attacker_id) else {
        return events;
    };
    let attacker_is_player = attacker.is_player();
    let attacker_name = attacker.name().to_string();
    let attacker_room = attacker.base().room_id.clone();
    if !attacker.base().is_alive() {
        if attacker_is_player {
            events.push(GameEvent::to_player(
                attacker_id.to_string(),
                "You can't attack while dead.",
            ));
        }
        return events;
    }
    if attacker.base().combat.is_in_combat() {
        if attacker_is_player {
            let current = attacker.base().combat.target_id.clone();
            let name = current
                .as_deref()
                .and_then(|id| engine.world.entity(id))
                .map(|e| e.name().to_string())
                .unwrap_or_else(|| "someone".to_string());
            events.push(GameEvent::to_player(
                attacker_id.to_string(),
                format!("You're already attacking {name}! Use 'stop' to disengage first."),
            ));
        }
        return events;
    }

    if target_id == attacker_id {
        if attacker_is_player {
            events.push(GameEvent::to_player(
                attacker_id.to_string(),
                "You can't attack yourself!",
            ));
        }
        return events;
    }
    let Some(target) = engine.world.entity(target_id) else {
        if attacker_is_player {
            events.push(GameEvent::to_player(
                attacker_id.to_string(),
                "Your target cannot be found.",
            ));
        }
        return events;
    };
    let target_name = target.name().to_string();
    let target_is_player = target.is_player();
    if !target.base().is_alive() {
        if attacker_is_player {
            events.push(GameEvent::to_player(
                attacker_id.to_string(),
                format!("{target_name} is already dead."),
            ));
        }
        return events;
    }

    let weapon = equipped_weapon(&engine.world, attacker_id);
    let now = Instant::now();
    if let Some(mut attacker) = engine.world.entity_mut(attacker_id) {
        attacker
            .base_mut()
            .start_attack(target_id.to_string(), weapon.clone(), now);
    }
    if let Some(npc) = engine.world.npcs.get_mut(attacker_id) {
        npc.target_id = Some(target_id.to_string());
    }
    schedule_windup(engine, attacker_id, target_id, weapon.clone());

    if attacker_is_player {
        events.push(GameEvent::to_player(
            attacker_id.to_string(),
            format!(
                "You begin attacking {target_name} with your {}... ({:.1}s)",
                weapon.name,
                weapon.swing_speed()
            ),
        ));
    }
    if target_is_player {
        events.push(GameEvent::to_player(
            target_id.to_string(),
            format!("⚔️ {attacker_name} attacks you!"),
        ));
    }
    events.push(GameEvent::to_room_excluding(
        attacker_room,
        format!("⚔️ {attacker_name} attacks {target_name}!"),
        [attacker_id.to_string(), target_id.to_string()],
    ));

    if let Some(npc) = engine.world.npcs.get_mut(target_id) {
        npc.base.combat.add_threat(attacker_id, 100.0);
    }

    events
}

fn schedule_windup(engine: &mut WorldEngine, attacker_id: &str, target_id: &str, weapon: WeaponStats) {
    let event_id = engine.world.mint_id("combat_windup");
    if let Some(mut attacker) = engine.world.entity_mut(attacker_id) {
        attacker.base_mut().combat.swing_event_id = Some(event_id.clone());
    }
    let attacker = attacker_id.to_string();
    let target = target_id.to_string();
    let delay = Duration::from_secs_f32(weapon.windup_time.max(0.0));
    engine.timers.schedule_once(
        delay,
        Some(&event_id),
        Box::new(move |engine| windup_complete(engine, &attacker, &target, &weapon)),
    );
}

/// Windup finished: validate both parties and transition to the swing.
fn windup_complete(
    engine: &mut WorldEngine,
    attacker_id: &str,
    target_id: &str,
    weapon: &WeaponStats,
) -> Vec<GameEvent> {
    let mut events = Vec::new();

    let attacker_state = engine.world.entity(attacker_id).map(|a| {
        (
            a.base().is_alive(),
            a.base().room_id.clone(),
            a.base().combat.target_id.clone(),
        )
    });
    let Some((attacker_alive, attacker_room, combat_target)) = attacker_state else {
        return events;
    };
    if !attacker_alive || combat_target.as_deref() != Some(target_id) {
        clear_combat(engine, attacker_id);
        return events;
    }

    let target_state = engine
        .world
        .entity(target_id)
        .map(|t| (t.base().is_alive(), t.base().room_id.clone(), t.name().to_string()));
    let valid = matches!(
        &target_state,
        Some((alive, room, _)) if *alive && *room == attacker_room
    );
    if !valid {
        clear_combat(engine, attacker_id);
        if engine.world.players.contains_key(attacker_id) {
            let text = match target_state {
                Some((false, _, name)) => format!("{name} is already dead!"),
                _ => "Your target is no longer here.".to_string(),
            };
            events.push(GameEvent::to_player(attacker_id.to_string(), text));
        }
        return events;
    }

    let now = Instant::now();
    if let Some(mut attacker) = engine.world.entity_mut(attacker_id) {
        attacker
            .base_mut()
            .combat
            .start_phase(CombatPhase::Swing, weapon.swing_time, now);
    }
    schedule_damage(engine, attacker_id, target_id, weapon.clone());
    events
}

fn schedule_damage(engine: &mut WorldEngine, attacker_id: &str, target_id: &str, weapon: WeaponStats) {
    let event_id = engine.world.mint_id("combat_damage");
    if let Some(mut attacker) = engine.world.entity_mut(attacker_id) {
        attacker.base_mut().combat.swing_event_id = Some(event_id.clone());
    }
    let attacker = attacker_id.to_string();
    let target = target_id.to_string();
    let delay = Duration::from_secs_f32(weapon.swing_time.max(0.0));
    engine.timers.schedule_once(
        delay,
        Some(&event_id),
        Box::new(move |engine| apply_swing_damage(engine, &attacker, &target, &weapon)),
    );
}

/// The swing lands: roll damage, apply it, and steer what happens next —
/// death handling, retaliation, behavior hooks, and the auto-attack loop.
fn apply_swing_damage(
    engine: &mut WorldEngine,
    attacker_id: &str,
    target_id: &str,
    weapon: &WeaponStats,
) -> Vec<GameEvent> {
    let mut events = Vec::new();

    let attacker_state = engine.world.entity(attacker_id).map(|a| {
        (
            a.base().is_alive(),
            a.base().room_id.clone(),
            a.name().to_string(),
            a.base().combat.target_id.clone(),
            a.base().effective_strength(),
        )
    });
    let Some((attacker_alive, attacker_room, attacker_name, combat_target, attacker_strength)) =
        attacker_state
    else {
        return events;
    };
    if !attacker_alive || combat_target.as_deref() != Some(target_id) {
        clear_combat(engine, attacker_id);
        return events;
    }

    let target_state = engine.world.entity(target_id).map(|t| {
        (
            t.base().is_alive(),
            t.base().room_id.clone(),
            t.name().to_string(),
            t.base().effective_armor_class(),
        )
    });
    let Some((target_alive, target_room, target_name, target_ac)) = target_state else {
        clear_combat(engine, attacker_id);
        return events;
    };
    if !target_alive || target_room != attacker_room {
        clear_combat(engine, attacker_id);
        return events;
    }

    // Roll and apply
    let (damage, crit) = {
        let WorldEngine { dice, config, .. } = engine;
        compute_damage(dice.as_mut(), &config.combat, weapon, attacker_strength, target_ac)
    };
    if let Some(mut target) = engine.world.entity_mut(target_id) {
        let base = target.base_mut();
        base.current_health = (base.current_health - damage).max(0);
    }
    engine.dirty.mark(target_id);

    let crit_text = if crit { " **CRITICAL!**" } else { "" };
    if engine.world.players.contains_key(attacker_id) {
        events.push(GameEvent::to_player(
            attacker_id.to_string(),
            format!("You hit {target_name} for {damage} damage!{crit_text}"),
        ));
    }
    if let Some(target_player) = engine.world.players.get(target_id) {
        events.push(GameEvent::to_player(
            target_id.to_string(),
            format!("💥 {attacker_name} hits you for {damage} damage!{crit_text}"),
        ));
        events.push(GameEvent::stat_update(target_player));
    }
    events.push(GameEvent::to_room_excluding(
        attacker_room.clone(),
        format!("{attacker_name} hits {target_name}!{crit_text}"),
        [attacker_id.to_string(), target_id.to_string()],
    ));

    let target_dead = engine
        .world
        .entity(target_id)
        .is_some_and(|t| !t.base().is_alive());

    if target_dead {
        events.extend(handle_death(engine, target_id, attacker_id));
        clear_combat(engine, attacker_id);
        return events;
    }

    // Survivors respond: players auto-retaliate unless already engaged,
    // NPCs consult their behaviors.
    if engine.world.players.contains_key(target_id) {
        let already_engaged = engine
            .world
            .players
            .get(target_id)
            .is_some_and(|p| p.base.combat.is_in_combat());
        if !already_engaged {
            events.extend(start_attack(engine, target_id, attacker_id));
        }
    } else if engine.world.npcs.contains_key(target_id) {
        events.extend(npc_damaged(engine, target_id, attacker_id, damage));
    }

    // Auto-attack continuation
    let continue_attack = engine.world.entity(attacker_id).is_some_and(|a| {
        a.base().is_alive() && a.base().combat.auto_attack
    }) && engine
        .world
        .entity(target_id)
        .is_some_and(|t| t.base().is_alive() && t.base().room_id == attacker_room);

    if continue_attack {
        let recovery = engine.config.combat.recovery_time;
        let now = Instant::now();
        if let Some(mut attacker) = engine.world.entity_mut(attacker_id) {
            attacker
                .base_mut()
                .combat
                .start_phase(CombatPhase::Recovery, recovery, now);
        }
        schedule_next_swing(engine, attacker_id, target_id, weapon.clone());
    } else {
        clear_combat(engine, attacker_id);
    }

    events
}

fn schedule_next_swing(
    engine: &mut WorldEngine,
    attacker_id: &str,
    target_id: &str,
    weapon: WeaponStats,
) {
    let event_id = engine.world.mint_id("combat_recovery");
    if let Some(mut attacker) = engine.world.entity_mut(attacker_id) {
        attacker.base_mut().combat.swing_event_id = Some(event_id.clone());
    }
    let attacker = attacker_id.to_string();
    let target = target_id.to_string();
    let delay = Duration::from_secs_f32(engine.config.combat.recovery_time.max(0.0));
    engine.timers.schedule_once(
        delay,
        Some(&event_id),
        Box::new(move |engine| next_swing(engine, &attacker, &target, &weapon)),
    );
}

/// Recovery over: either loop back into the windup or wind down.
fn next_swing(
    engine: &mut WorldEngine,
    attacker_id: &str,
    target_id: &str,
    weapon: &WeaponStats,
) -> Vec<GameEvent> {
    let mut events = Vec::new();

    let attacker_ok = engine
        .world
        .entity(attacker_id)
        .is_some_and(|a| a.base().is_alive());
    if !attacker_ok {
        return events;
    }
    let attacker_room = engine
        .world
        .entity(attacker_id)
        .map(|a| a.base().room_id.clone())
        .unwrap_or_default();
    let target_ok = engine
        .world
        .entity(target_id)
        .is_some_and(|t| t.base().is_alive() && t.base().room_id == attacker_room);
    if !target_ok {
        clear_combat(engine, attacker_id);
        if engine.world.players.contains_key(attacker_id) {
            events.push(GameEvent::to_player(attacker_id.to_string(), "Combat ended."));
        }
        return events;
    }

    let now = Instant::now();
    if let Some(mut attacker) = engine.world.entity_mut(attacker_id) {
        attacker
            .base_mut()
            .start_attack(target_id.to_string(), weapon.clone(), now);
    }
    schedule_windup(engine, attacker_id, target_id, weapon.clone());
    events
}

/// Cancel any pending swing event and drop combat state.
pub(crate) fn clear_combat(engine: &mut WorldEngine, entity_id: &str) {
    let pending = engine
        .world
        .entity(entity_id)
        .and_then(|e| e.base().combat.swing_event_id.clone());
    if let Some(event_id) = pending {
        engine.timers.cancel(&event_id);
    }
    if let Some(mut entity) = engine.world.entity_mut(entity_id) {
        entity.base_mut().combat.clear_combat();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stop / Flee
// ─────────────────────────────────────────────────────────────────────────────

/// `stop` handler: disengage cleanly.
pub fn stop_command(engine: &mut WorldEngine, player_id: &PlayerId) -> Vec<GameEvent> {
    let Some(player) = engine.world.players.get(player_id) else {
        return vec![GameEvent::to_player(player_id.clone(), "You have no form.")];
    };
    if !player.base.combat.is_in_combat() {
        return vec![GameEvent::to_player(player_id.clone(), "You're not in combat.")];
    }
    let target_name = player
        .base
        .combat
        .target_id
        .as_deref()
        .and_then(|id| engine.world.entity(id))
        .map(|t| t.name().to_string());

    clear_combat(engine, player_id);

    let text = match target_name {
        Some(name) => format!("You stop attacking {name}."),
        None => "You disengage from combat.".to_string(),
    };
    vec![GameEvent::to_player(player_id.clone(), text)]
}

/// `flee` handler: a dexterity check that gets easier the more hurt you
/// are. Success breaks combat and bolts through a random exit.
pub fn flee_command(engine: &mut WorldEngine, player_id: &PlayerId) -> Vec<GameEvent> {
    let Some(player) = engine.world.players.get(player_id) else {
        return vec![GameEvent::to_player(player_id.clone(), "You have no form.")];
    };
    if !player.base.combat.is_in_combat() {
        return vec![GameEvent::to_player(player_id.clone(), "You're not in combat.")];
    }

    let health_fraction = if player.base.max_health > 0 {
        player.base.current_health as f64 / player.base.max_health as f64
    } else {
        1.0
    };
    let missing = 1.0 - health_fraction;
    let flee_dc = (15 - (10.0 * missing).floor() as i32).max(5);
    let dex_mod = (player.base.effective_dexterity() - 10).div_euclid(2);
    let room_id = player.base.room_id.clone();
    let player_name = player.base.name.clone();

    let roll = engine.dice.d20();
    let total = roll + dex_mod;

    if total < flee_dc {
        return vec![GameEvent::to_player(
            player_id.clone(),
            format!("😰 You fail to escape! (Roll: {roll} + {dex_mod} DEX = {total} vs DC {flee_dc})"),
        )];
    }

    // Pick an exit before touching state; no exit means no escape.
    let exits: Vec<(emberwake_types::Direction, RoomId)> = engine
        .world
        .rooms
        .get(&room_id)
        .map(|room| {
            room.effective_exits()
                .iter()
                .map(|(d, r)| (*d, r.clone()))
                .collect()
        })
        .unwrap_or_default();
    if exits.is_empty() {
        return vec![GameEvent::to_player(
            player_id.clone(),
            "There's nowhere to flee!",
        )];
    }
    let (direction, dest_room_id) = exits[engine.dice.pick_index(exits.len())].clone();
    if !engine.world.rooms.contains_key(&dest_room_id) {
        return vec![GameEvent::to_player(
            player_id.clone(),
            "You try to flee but the exit leads nowhere!",
        )];
    }

    clear_combat(engine, player_id);

    if let Some(room) = engine.world.rooms.get_mut(&room_id) {
        room.entities.remove(player_id.as_str());
    }
    if let Some(dest) = engine.world.rooms.get_mut(&dest_room_id) {
        dest.entities.insert(player_id.clone());
    }
    if let Some(player) = engine.world.players.get_mut(player_id) {
        player.base.room_id = dest_room_id.clone();
    }
    engine.dirty.mark(player_id);

    vec![
        GameEvent::to_room_excluding(
            room_id,
            format!("🏃 {player_name} flees {direction}!"),
            [player_id.clone()],
        ),
        GameEvent::to_player(
            player_id.clone(),
            format!("🏃 You flee {direction}! (Roll: {roll} + {dex_mod} DEX = {total} vs DC {flee_dc})"),
        ),
    ]
}

/// `combat` handler: phase, target, weapon, auto-attack readout.
pub fn status_command(engine: &WorldEngine, player_id: &PlayerId) -> Vec<GameEvent> {
    let Some(player) = engine.world.players.get(player_id) else {
        return vec![GameEvent::to_player(player_id.clone(), "You have no form.")];
    };
    let combat = &player.base.combat;
    if !combat.is_in_combat() {
        return vec![GameEvent::to_player(player_id.clone(), "You are not in combat.")];
    }

    let target_line = match combat.target_id.as_deref().and_then(|id| engine.world.entity(id)) {
        Some(target) => {
            let base = target.base();
            let pct = if base.max_health > 0 {
                base.current_health as f32 / base.max_health as f32 * 100.0
            } else {
                0.0
            };
            format!("Target: {} ({pct:.0}% health)", target.name())
        }
        None => "Target: unknown".to_string(),
    };

    let now = Instant::now();
    let weapon = &combat.current_weapon;
    let lines = [
        "⚔️ **Combat Status**".to_string(),
        target_line,
        format!(
            "Phase: {} ({:.0}% - {:.1}s remaining)",
            combat.phase.label(),
            combat.phase_progress(now) * 100.0,
            combat.phase_remaining(now)
        ),
        format!(
            "Weapon: {}-{} damage, {:.1}s speed",
            weapon.damage_min,
            weapon.damage_max,
            weapon.swing_speed()
        ),
        format!("Auto-attack: {}", if combat.auto_attack { "ON" } else { "OFF" }),
    ];
    vec![GameEvent::to_player(player_id.clone(), lines.join("\n"))]
}

// ─────────────────────────────────────────────────────────────────────────────
// Death, Loot, Experience
// ─────────────────────────────────────────────────────────────────────────────

/// Handle an entity's death: room removal and loot for NPCs, a respawn
/// countdown for players, experience for a player killer.
pub fn handle_death(engine: &mut WorldEngine, victim_id: &str, killer_id: &str) -> Vec<GameEvent> {
    let mut events = Vec::new();

    let Some(victim) = engine.world.entity(victim_id) else {
        return events;
    };
    let victim_name = victim.name().to_string();
    let victim_room = victim.base().room_id.clone();
    let killer_name = engine
        .world
        .entity(killer_id)
        .map(|k| k.name().to_string())
        .unwrap_or_else(|| "unknown forces".to_string());

    events.push(GameEvent::to_room(
        victim_room.clone(),
        format!("💀 {victim_name} has been slain by {killer_name}!"),
    ));

    if engine.world.npcs.contains_key(victim_id) {
        engine.cancel_npc_timers(victim_id);
        if let Some(room) = engine.world.rooms.get_mut(&victim_room) {
            room.entities.remove(victim_id);
        }
        let drop_table = if let Some(npc) = engine.world.npcs.get_mut(victim_id) {
            npc.last_killed_at = Some(chrono::Utc::now());
            npc.target_id = None;
            npc.base.combat.clear_combat();
            engine
                .world
                .npc_templates
                .get(&npc.template_id)
                .map(|t| (t.drop_table.clone(), t.experience_reward))
        } else {
            None
        };

        if let Some((drops, xp_reward)) = drop_table {
            events.extend(roll_loot(engine, &drops, &victim_room, &victim_name));
            if engine.world.players.contains_key(killer_id) {
                if xp_reward > 0 {
                    events.extend(award_experience(engine, killer_id, xp_reward));
                }
                let template_id = engine
                    .world
                    .npcs
                    .get(victim_id)
                    .map(|n| n.template_id.clone());
                if let Some(template_id) = template_id {
                    events.extend(crate::systems::quests::on_npc_killed(
                        engine,
                        &killer_id.to_string(),
                        &template_id,
                    ));
                }
            }
        }
    } else if engine.world.players.contains_key(victim_id) {
        events.push(GameEvent::to_player(
            victim_id.to_string(),
            "☠️ You have been slain!",
        ));
        engine.dirty.mark(victim_id);
        engine.schedule_player_respawn(victim_id);
    }

    events
}

/// Roll a drop table and materialize the winners on the room floor.
pub fn roll_loot(
    engine: &mut WorldEngine,
    drop_table: &[DropEntry],
    room_id: &str,
    npc_name: &str,
) -> Vec<GameEvent> {
    let mut events = Vec::new();
    let WorldEngine { world, dice, .. } = engine;

    for entry in drop_table {
        if !dice.chance(entry.chance) {
            continue;
        }
        let quantity = match entry.quantity {
            crate::world::templates::DropQuantity::Fixed(n) => n,
            crate::world::templates::DropQuantity::Range(min, max) => {
                dice.roll_range(min as i32, max as i32) as u32
            }
        };
        if quantity == 0 {
            continue;
        }
        let Some(template) = world.item_templates.get(&entry.template_id) else {
            tracing::warn!(template = %entry.template_id, "drop table references unknown item template");
            continue;
        };
        let item_name = template.name.clone();
        if world.spawn_item(&entry.template_id, room_id, quantity).is_some() {
            let quantity_text = if quantity > 1 {
                format!(" x{quantity}")
            } else {
                String::new()
            };
            events.push(GameEvent::to_room(
                room_id.to_string(),
                format!("💎 {npc_name} drops {item_name}{quantity_text}."),
            ));
        }
    }
    events
}

/// Grant experience and apply any level-ups it buys.
pub fn award_experience(engine: &mut WorldEngine, player_id: &str, xp: u64) -> Vec<GameEvent> {
    let mut events = Vec::new();
    let Some(player) = engine.world.players.get_mut(player_id) else {
        return events;
    };
    player.experience += xp;
    events.push(GameEvent::to_player(
        player_id.to_string(),
        format!("✨ You gain {xp} experience!"),
    ));

    let crate::world::Player {
        base,
        level,
        experience,
        max_energy,
        current_energy,
        ..
    } = player;
    let ups = leveling::check_level_up(level, *experience, base, max_energy, current_energy);

    for up in &ups {
        let g = up.gains;
        let mut parts = Vec::new();
        if g.max_health != 0 {
            parts.push(format!("+{} HP", g.max_health));
        }
        if g.max_energy != 0 {
            parts.push(format!("+{} Energy", g.max_energy));
        }
        if g.strength != 0 {
            parts.push(format!("+{} STR", g.strength));
        }
        if g.dexterity != 0 {
            parts.push(format!("+{} DEX", g.dexterity));
        }
        if g.intelligence != 0 {
            parts.push(format!("+{} INT", g.intelligence));
        }
        if g.vitality != 0 {
            parts.push(format!("+{} VIT", g.vitality));
        }
        events.push(GameEvent::to_player(
            player_id.to_string(),
            format!(
                "🎉 **LEVEL UP!** You reached level {}! ({})",
                up.new_level,
                parts.join(", ")
            ),
        ));
    }
    if let Some(player) = engine.world.players.get(player_id) {
        events.push(GameEvent::stat_update(player));
    }
    engine.dirty.mark(player_id);
    events
}

// ─────────────────────────────────────────────────────────────────────────────
// NPC Reaction
// ─────────────────────────────────────────────────────────────────────────────

/// An NPC took damage: run its `on_damaged` behaviors, then let it open
/// combat if it is still standing idle.
pub fn npc_damaged(
    engine: &mut WorldEngine,
    npc_id: &str,
    attacker_id: &str,
    damage: i32,
) -> Vec<GameEvent> {
    let mut events = Vec::new();

    let result = behaviors::run_hook(
        engine,
        npc_id,
        HookArgs::Damaged {
            attacker: attacker_id,
            damage,
        },
    );
    if let Some(result) = result {
        events.extend(behaviors::process_result(engine, npc_id, &result));
        if result.call_for_help {
            events.extend(call_for_help(engine, npc_id, attacker_id));
        }
    }

    // A standing-idle NPC gets its combat-start hook; whatever it returns
    // decides whether it fights back.
    let idle = engine
        .world
        .npcs
        .get(npc_id)
        .is_some_and(|n| n.base.is_alive() && !n.base.combat.is_in_combat());
    if idle {
        let start = behaviors::run_hook(engine, npc_id, HookArgs::CombatStart(attacker_id));
        if let Some(start) = start {
            events.extend(behaviors::process_result(engine, npc_id, &start));
        }
    }
    events
}

/// Alert co-located allies: same faction when the caller has one, same
/// disposition otherwise. Allies pick up threat and join the fight.
pub fn call_for_help(engine: &mut WorldEngine, caller_id: &str, enemy_id: &str) -> Vec<GameEvent> {
    let mut events = Vec::new();

    let caller_info = engine.world.npcs.get(caller_id).map(|npc| {
        let template = engine.world.npc_templates.get(&npc.template_id);
        (
            npc.base.room_id.clone(),
            template.and_then(|t| t.faction_id.clone()),
            template.map(|t| t.npc_type),
        )
    });
    let Some((room_id, caller_faction, caller_type)) = caller_info else {
        return events;
    };

    let allies: Vec<EntityId> = engine
        .world
        .npc_ids_in_room(&room_id)
        .into_iter()
        .filter(|id| id != caller_id)
        .filter(|id| {
            let Some(ally) = engine.world.npcs.get(id) else {
                return false;
            };
            if !ally.base.is_alive() || ally.base.combat.is_in_combat() {
                return false;
            }
            let ally_template = engine.world.npc_templates.get(&ally.template_id);
            match &caller_faction {
                Some(faction) => {
                    ally_template.and_then(|t| t.faction_id.as_ref()) == Some(faction)
                }
                None => ally_template.map(|t| t.npc_type) == caller_type,
            }
        })
        .collect();

    for ally_id in allies {
        if let Some(ally) = engine.world.npcs.get_mut(&ally_id) {
            ally.base.combat.add_threat(enemy_id, 50.0);
        }
        let ally_name = engine
            .world
            .npcs
            .get(&ally_id)
            .map(|n| n.display_name().to_string())
            .unwrap_or_default();
        events.push(GameEvent::to_room(
            room_id.clone(),
            format!("{ally_name} joins the fight!"),
        ));
        events.extend(start_attack(engine, &ally_id, enemy_id));
    }
    events
}

#[cfg(test)]
mod combat_tests;
