//! NPC behavior scripts
//!
//! Behaviors are small, composable AI routines resolved from template tags.
//! Each behavior carries a priority (lower runs first) and contributes
//! defaults to the NPC's merged config. Running a hook walks the NPC's
//! behaviors in priority order and stops at the first handled result; when
//! nothing handles, the last result produced is returned so callers can
//! still act on advisory fields like `call_for_help`.

mod combat;
mod idle;
mod social;
mod wandering;

use emberwake_types::{with_article, Direction, EntityId, PlayerId, RoomId};
use serde::{Deserialize, Serialize};

use crate::engine::WorldEngine;
use crate::systems::dice::Dice;
use crate::systems::dispatcher::GameEvent;
use crate::world::templates::NpcTemplate;
use crate::world::{Npc, World};

pub use combat::{Aggressive, Defensive, Pacifist};
pub use idle::IdleChatter;
pub use social::{CallsForHelp, Loner};
pub use wandering::{Patrols, Stationary, WandersFrequently, WandersRarely, WandersSometimes};

// ─────────────────────────────────────────────────────────────────────────────
// Config & Result
// ─────────────────────────────────────────────────────────────────────────────

/// Merged per-NPC behavior configuration. Each behavior's defaults are
/// folded in at template load; instance data never changes it afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    pub idle_enabled: bool,
    pub idle_chance: f64,
    pub idle_interval_min: f32,
    pub idle_interval_max: f32,

    pub wander_enabled: bool,
    pub wander_chance: f64,
    pub wander_interval_min: f32,
    pub wander_interval_max: f32,

    pub aggro_on_sight: bool,
    pub attacks_if_attacked: bool,
    pub calls_for_help: bool,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            idle_enabled: true,
            idle_chance: 0.5,
            idle_interval_min: 15.0,
            idle_interval_max: 45.0,
            wander_enabled: false,
            wander_chance: 0.1,
            wander_interval_min: 30.0,
            wander_interval_max: 90.0,
            aggro_on_sight: false,
            attacks_if_attacked: true,
            calls_for_help: false,
        }
    }
}

/// What a behavior hook wants the engine to do.
#[derive(Debug, Clone, Default)]
pub struct BehaviorResult {
    /// True stops the behavior chain.
    pub handled: bool,
    pub message: Option<String>,
    pub move_to: Option<RoomId>,
    pub move_direction: Option<Direction>,
    pub attack_target: Option<EntityId>,
    pub flee: bool,
    pub call_for_help: bool,
    /// Commit the NPC's patrol cursor when the move is processed.
    pub advance_patrol: bool,
}

impl BehaviorResult {
    /// Handled, nothing to do (suppresses lower-priority behaviors).
    pub fn handled() -> Self {
        Self {
            handled: true,
            ..Self::default()
        }
    }

    pub fn move_to(direction: Direction, room_id: RoomId, message: String) -> Self {
        Self {
            handled: true,
            message: Some(message),
            move_to: Some(room_id),
            move_direction: Some(direction),
            ..Self::default()
        }
    }

    pub fn attack(target: EntityId, message: Option<String>) -> Self {
        Self {
            handled: true,
            message,
            attack_target: Some(target),
            ..Self::default()
        }
    }
}

/// Read-only view handed to behavior hooks, plus the dice.
pub struct BehaviorCtx<'a> {
    pub npc: &'a Npc,
    pub template: &'a NpcTemplate,
    pub world: &'a World,
    pub config: &'a BehaviorConfig,
    pub dice: &'a mut dyn Dice,
}

impl BehaviorCtx<'_> {
    /// A uniformly chosen usable exit of the NPC's room.
    pub fn random_exit(&mut self) -> Option<(Direction, RoomId)> {
        let room = self.world.rooms.get(&self.npc.base.room_id)?;
        let mut exits: Vec<(Direction, RoomId)> = room
            .effective_exits()
            .iter()
            .map(|(d, r)| (*d, r.clone()))
            .collect();
        if exits.is_empty() {
            return None;
        }
        exits.sort_by_key(|(d, _)| d.as_str());
        let index = self.dice.pick_index(exits.len());
        exits.into_iter().nth(index)
    }

    /// NPC display name with an article for common nouns.
    pub fn npc_name(&self) -> String {
        format_npc_name(self.npc.display_name())
    }
}

/// "a goblin" for common nouns, proper names unchanged.
pub fn format_npc_name(name: &str) -> String {
    with_article(name)
}

/// Arguments for one hook invocation.
#[derive(Debug, Clone, Copy)]
pub enum HookArgs<'a> {
    IdleTick,
    WanderTick,
    PlayerEnter(&'a str),
    Damaged { attacker: &'a str, damage: i32 },
    CombatStart(&'a str),
    CombatAction(&'a str),
}

// ─────────────────────────────────────────────────────────────────────────────
// Behavior Trait & Registry
// ─────────────────────────────────────────────────────────────────────────────

/// One pluggable AI routine. Hooks return `None` when undefined for this
/// behavior, `Some(result)` otherwise.
pub trait Behavior: Send + Sync {
    fn name(&self) -> &'static str;
    /// Execution order: lower runs first.
    fn priority(&self) -> i32;
    /// Fold this behavior's defaults into the merged config.
    fn apply_defaults(&self, config: &mut BehaviorConfig);

    fn on_idle_tick(&self, _ctx: &mut BehaviorCtx<'_>) -> Option<BehaviorResult> {
        None
    }
    fn on_wander_tick(&self, _ctx: &mut BehaviorCtx<'_>) -> Option<BehaviorResult> {
        None
    }
    fn on_player_enter(&self, _ctx: &mut BehaviorCtx<'_>, _player_id: &str) -> Option<BehaviorResult> {
        None
    }
    fn on_damaged(
        &self,
        _ctx: &mut BehaviorCtx<'_>,
        _attacker_id: &str,
        _damage: i32,
    ) -> Option<BehaviorResult> {
        None
    }
    fn on_combat_start(&self, _ctx: &mut BehaviorCtx<'_>, _attacker_id: &str) -> Option<BehaviorResult> {
        None
    }
    fn on_combat_action(&self, _ctx: &mut BehaviorCtx<'_>, _target_id: &str) -> Option<BehaviorResult> {
        None
    }
}

static AGGRESSIVE: Aggressive = Aggressive;
static DEFENSIVE: Defensive = Defensive;
static PACIFIST: Pacifist = Pacifist;
static CALLS_FOR_HELP: CallsForHelp = CallsForHelp;
static LONER: Loner = Loner;
static IDLE_CHATTER: IdleChatter = IdleChatter;
static STATIONARY: Stationary = Stationary;
static WANDERS_RARELY: WandersRarely = WandersRarely;
static WANDERS_SOMETIMES: WandersSometimes = WandersSometimes;
static WANDERS_FREQUENTLY: WandersFrequently = WandersFrequently;
static PATROLS: Patrols = Patrols;

/// Resolve a behavior tag to its registered instance.
pub fn lookup(tag: &str) -> Option<&'static dyn Behavior> {
    Some(match tag {
        "aggressive" => &AGGRESSIVE,
        "defensive" => &DEFENSIVE,
        "pacifist" | "peaceful" => &PACIFIST,
        "calls_for_help" | "social" => &CALLS_FOR_HELP,
        "loner" => &LONER,
        "idle_chatter" => &IDLE_CHATTER,
        "stationary" | "wanders_nowhere" => &STATIONARY,
        "wanders_rarely" => &WANDERS_RARELY,
        "wanders_sometimes" => &WANDERS_SOMETIMES,
        "wanders_frequently" => &WANDERS_FREQUENTLY,
        "patrols" => &PATROLS,
        _ => return None,
    })
}

/// Behavior instances for a tag list, sorted by priority (stable).
pub fn instances_for(tags: &[String]) -> Vec<&'static dyn Behavior> {
    let mut instances: Vec<&'static dyn Behavior> = tags
        .iter()
        .filter_map(|tag| {
            let found = lookup(tag);
            if found.is_none() {
                tracing::warn!(tag = %tag, "unknown behavior tag ignored");
            }
            found
        })
        .collect();
    instances.sort_by_key(|b| b.priority());
    instances
}

/// Merge behavior defaults into one config. Higher-priority behaviors
/// (lower numbers) apply last so their defaults win.
pub fn merged_config(tags: &[String]) -> BehaviorConfig {
    let mut instances = instances_for(tags);
    instances.sort_by_key(|b| std::cmp::Reverse(b.priority()));
    let mut config = BehaviorConfig::default();
    for behavior in instances {
        behavior.apply_defaults(&mut config);
    }
    config
}

// ─────────────────────────────────────────────────────────────────────────────
// Hook Execution
// ─────────────────────────────────────────────────────────────────────────────

/// Run one hook across an NPC's behaviors in priority order. Returns the
/// first handled result, or the last result any behavior produced.
/// Returns `None` for dead or missing NPCs.
pub fn run_hook(engine: &mut WorldEngine, npc_id: &str, args: HookArgs<'_>) -> Option<BehaviorResult> {
    let WorldEngine { world, dice, .. } = engine;
    let world: &World = world;

    let npc = world.npcs.get(npc_id)?;
    if !npc.base.is_alive() {
        return None;
    }
    let template = world.npc_templates.get(&npc.template_id)?;
    let instances = instances_for(&template.behaviors);
    if instances.is_empty() {
        return None;
    }

    let mut ctx = BehaviorCtx {
        npc,
        template,
        world,
        config: &template.resolved_behavior,
        dice: dice.as_mut(),
    };

    let mut last: Option<BehaviorResult> = None;
    for behavior in instances {
        let result = match args {
            HookArgs::IdleTick => behavior.on_idle_tick(&mut ctx),
            HookArgs::WanderTick => behavior.on_wander_tick(&mut ctx),
            HookArgs::PlayerEnter(player_id) => behavior.on_player_enter(&mut ctx, player_id),
            HookArgs::Damaged { attacker, damage } => behavior.on_damaged(&mut ctx, attacker, damage),
            HookArgs::CombatStart(attacker) => behavior.on_combat_start(&mut ctx, attacker),
            HookArgs::CombatAction(target) => behavior.on_combat_action(&mut ctx, target),
        };
        if let Some(result) = result {
            if result.handled {
                return Some(result);
            }
            last = Some(result);
        }
    }
    last
}

/// Apply a behavior result: message, flee, movement (suppressed while in
/// combat), and attack initiation.
pub fn process_result(engine: &mut WorldEngine, npc_id: &str, result: &BehaviorResult) -> Vec<GameEvent> {
    let mut events = Vec::new();

    let Some(npc) = engine.world.npcs.get(npc_id) else {
        return events;
    };
    let current_room = npc.base.room_id.clone();
    let npc_name = npc.display_name().to_string();
    let in_combat = npc.base.combat.is_in_combat();

    if let Some(message) = &result.message {
        events.push(GameEvent::to_room(current_room.clone(), message.clone()));
    }

    if result.flee {
        crate::systems::combat::clear_combat(engine, npc_id);
    }

    if let Some(dest_room_id) = &result.move_to {
        // Engaged NPCs hold their ground; flee above is the exception.
        let blocked = in_combat && !result.flee;
        if !blocked && engine.world.rooms.contains_key(dest_room_id) {
            if let Some(room) = engine.world.rooms.get_mut(&current_room) {
                room.entities.remove(npc_id);
            }
            if let Some(room) = engine.world.rooms.get_mut(dest_room_id) {
                room.entities.insert(npc_id.to_string());
            }
            if let Some(npc) = engine.world.npcs.get_mut(npc_id) {
                npc.base.room_id = dest_room_id.clone();
                if result.advance_patrol
                    && let Some(patrol) = npc.instance_data.patrol.as_mut()
                {
                    patrol.advance();
                }
            }
            if let Some(direction) = result.move_direction {
                events.push(GameEvent::to_room(
                    dest_room_id.clone(),
                    format!(
                        "{} arrives {}.",
                        format_npc_name(&npc_name),
                        direction.arrival_phrase()
                    ),
                ));
            }
        }
    }

    if let Some(target_id) = &result.attack_target {
        events.extend(crate::systems::combat::start_attack(engine, npc_id, target_id));
    }

    events
}

/// Fire `on_player_enter` for every living NPC in a room.
pub fn player_entered_room(engine: &mut WorldEngine, room_id: &str, player_id: &PlayerId) -> Vec<GameEvent> {
    let mut events = Vec::new();
    for npc_id in engine.world.npc_ids_in_room(room_id) {
        let result = run_hook(engine, &npc_id, HookArgs::PlayerEnter(player_id));
        if let Some(result) = result {
            events.extend(process_result(engine, &npc_id, &result));
        }
    }
    events
}

#[cfg(test)]
mod behavior_tests;
