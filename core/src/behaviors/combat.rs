//! Combat behaviors: aggression and retaliation patterns

use super::{Behavior, BehaviorConfig, BehaviorCtx, BehaviorResult};

/// NPC attacks players on sight and fights back when struck.
pub struct Aggressive;

impl Behavior for Aggressive {
    fn name(&self) -> &'static str {
        "aggressive"
    }

    fn priority(&self) -> i32 {
        80
    }

    fn apply_defaults(&self, config: &mut BehaviorConfig) {
        config.aggro_on_sight = true;
        config.attacks_if_attacked = true;
    }

    fn on_player_enter(&self, ctx: &mut BehaviorCtx<'_>, player_id: &str) -> Option<BehaviorResult> {
        if !ctx.config.aggro_on_sight {
            return Some(BehaviorResult::default());
        }
        let player_name = ctx
            .world
            .players
            .get(player_id)
            .map(|p| p.base.name.clone())
            .unwrap_or_else(|| "someone".to_string());
        Some(BehaviorResult::attack(
            player_id.to_string(),
            Some(format!("{} snarls and attacks {player_name}!", ctx.npc_name())),
        ))
    }

    fn on_combat_start(&self, ctx: &mut BehaviorCtx<'_>, attacker_id: &str) -> Option<BehaviorResult> {
        if !ctx.config.attacks_if_attacked {
            return Some(BehaviorResult::default());
        }
        Some(BehaviorResult::attack(attacker_id.to_string(), None))
    }
}

/// NPC only attacks if attacked first.
pub struct Defensive;

impl Behavior for Defensive {
    fn name(&self) -> &'static str {
        "defensive"
    }

    fn priority(&self) -> i32 {
        90
    }

    fn apply_defaults(&self, config: &mut BehaviorConfig) {
        config.aggro_on_sight = false;
        config.attacks_if_attacked = true;
    }

    fn on_damaged(
        &self,
        ctx: &mut BehaviorCtx<'_>,
        attacker_id: &str,
        _damage: i32,
    ) -> Option<BehaviorResult> {
        if !ctx.config.attacks_if_attacked {
            return Some(BehaviorResult::default());
        }
        if ctx.npc.base.combat.is_in_combat() {
            return Some(BehaviorResult::handled());
        }
        Some(BehaviorResult::attack(
            attacker_id.to_string(),
            Some(format!("{} retaliates!", ctx.npc_name())),
        ))
    }
}

/// NPC never attacks, even if attacked. Priority 70 so it preempts the
/// other combat behaviors.
pub struct Pacifist;

impl Behavior for Pacifist {
    fn name(&self) -> &'static str {
        "pacifist"
    }

    fn priority(&self) -> i32 {
        70
    }

    fn apply_defaults(&self, config: &mut BehaviorConfig) {
        config.aggro_on_sight = false;
        config.attacks_if_attacked = false;
    }

    fn on_player_enter(&self, _ctx: &mut BehaviorCtx<'_>, _player_id: &str) -> Option<BehaviorResult> {
        Some(BehaviorResult::handled())
    }

    fn on_damaged(
        &self,
        ctx: &mut BehaviorCtx<'_>,
        _attacker_id: &str,
        _damage: i32,
    ) -> Option<BehaviorResult> {
        let mut result = BehaviorResult::handled();
        result.message = Some(format!("{} cowers but does not fight back.", ctx.npc_name()));
        Some(result)
    }

    fn on_combat_start(&self, _ctx: &mut BehaviorCtx<'_>, _attacker_id: &str) -> Option<BehaviorResult> {
        Some(BehaviorResult::handled())
    }
}
