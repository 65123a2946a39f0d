//! Wandering behaviors: how NPCs move around on their own

use super::{Behavior, BehaviorConfig, BehaviorCtx, BehaviorResult};

fn wander_roll(ctx: &mut BehaviorCtx<'_>) -> Option<BehaviorResult> {
    if !ctx.config.wander_enabled {
        return Some(BehaviorResult::default());
    }
    if !ctx.dice.chance(ctx.config.wander_chance) {
        return Some(BehaviorResult::default());
    }
    let (direction, dest_room) = ctx.random_exit()?;
    let name = ctx.npc_name();
    Some(BehaviorResult::move_to(
        direction,
        dest_room,
        format!("{name} wanders {direction}."),
    ))
}

/// NPC occasionally wanders to adjacent rooms (low frequency).
pub struct WandersRarely;

impl Behavior for WandersRarely {
    fn name(&self) -> &'static str {
        "wanders_rarely"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn apply_defaults(&self, config: &mut BehaviorConfig) {
        config.wander_enabled = true;
        config.wander_chance = 0.05;
        config.wander_interval_min = 60.0;
        config.wander_interval_max = 180.0;
    }

    fn on_wander_tick(&self, ctx: &mut BehaviorCtx<'_>) -> Option<BehaviorResult> {
        wander_roll(ctx)
    }
}

/// NPC wanders to adjacent rooms at moderate frequency.
pub struct WandersSometimes;

impl Behavior for WandersSometimes {
    fn name(&self) -> &'static str {
        "wanders_sometimes"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn apply_defaults(&self, config: &mut BehaviorConfig) {
        config.wander_enabled = true;
        config.wander_chance = 0.1;
        config.wander_interval_min = 30.0;
        config.wander_interval_max = 90.0;
    }

    fn on_wander_tick(&self, ctx: &mut BehaviorCtx<'_>) -> Option<BehaviorResult> {
        wander_roll(ctx)
    }
}

/// NPC wanders often, moving around a lot.
pub struct WandersFrequently;

impl Behavior for WandersFrequently {
    fn name(&self) -> &'static str {
        "wanders_frequently"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn apply_defaults(&self, config: &mut BehaviorConfig) {
        config.wander_enabled = true;
        config.wander_chance = 0.2;
        config.wander_interval_min = 15.0;
        config.wander_interval_max = 45.0;
    }

    fn on_wander_tick(&self, ctx: &mut BehaviorCtx<'_>) -> Option<BehaviorResult> {
        wander_roll(ctx)
    }
}

/// NPC never wanders. Priority 50 so it overrides other wander behaviors.
pub struct Stationary;

impl Behavior for Stationary {
    fn name(&self) -> &'static str {
        "stationary"
    }

    fn priority(&self) -> i32 {
        50
    }

    fn apply_defaults(&self, config: &mut BehaviorConfig) {
        config.wander_enabled = false;
    }

    fn on_wander_tick(&self, _ctx: &mut BehaviorCtx<'_>) -> Option<BehaviorResult> {
        Some(BehaviorResult::handled())
    }
}

/// NPC walks a configured waypoint route instead of wandering randomly.
///
/// Requires `patrol` on the NPC instance: a route of room IDs plus a mode
/// (loop, bounce, once). The cursor advances when the engine commits the
/// move.
pub struct Patrols;

impl Behavior for Patrols {
    fn name(&self) -> &'static str {
        "patrols"
    }

    fn priority(&self) -> i32 {
        150
    }

    fn apply_defaults(&self, config: &mut BehaviorConfig) {
        config.wander_enabled = true;
        config.wander_interval_min = 30.0;
        config.wander_interval_max = 60.0;
    }

    fn on_wander_tick(&self, ctx: &mut BehaviorCtx<'_>) -> Option<BehaviorResult> {
        if !ctx.config.wander_enabled {
            return Some(BehaviorResult::default());
        }
        let patrol = ctx.npc.instance_data.patrol.as_ref()?;
        let Some(next_room) = patrol.next_waypoint() else {
            // One-shot route exhausted: stay at the final waypoint.
            return Some(BehaviorResult::handled());
        };
        if &ctx.npc.base.room_id == next_room {
            let mut result = BehaviorResult::handled();
            result.advance_patrol = true;
            return Some(result);
        }

        let room = ctx.world.rooms.get(&ctx.npc.base.room_id)?;
        let direction = room
            .effective_exits()
            .iter()
            .find(|(_, dest)| *dest == next_room)
            .map(|(d, _)| *d);
        let Some(direction) = direction else {
            // Waypoint not adjacent; hold position rather than teleport.
            tracing::debug!(npc = %ctx.npc.base.id, waypoint = %next_room, "patrol waypoint not adjacent");
            return Some(BehaviorResult::handled());
        };

        let name = ctx.npc_name();
        let mut result = BehaviorResult::move_to(
            direction,
            next_room.clone(),
            format!("{name} patrols {direction}."),
        );
        result.advance_patrol = true;
        Some(result)
    }
}
