//! Idle chatter: ambient flavor lines from the template

use super::{Behavior, BehaviorConfig, BehaviorCtx, BehaviorResult};

/// NPC occasionally emotes one of its template's idle lines.
pub struct IdleChatter;

impl Behavior for IdleChatter {
    fn name(&self) -> &'static str {
        "idle_chatter"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn apply_defaults(&self, config: &mut BehaviorConfig) {
        config.idle_enabled = true;
    }

    fn on_idle_tick(&self, ctx: &mut BehaviorCtx<'_>) -> Option<BehaviorResult> {
        if !ctx.config.idle_enabled || ctx.template.idle_messages.is_empty() {
            return Some(BehaviorResult::default());
        }
        if !ctx.dice.chance(ctx.config.idle_chance) {
            return Some(BehaviorResult::default());
        }
        let index = ctx.dice.pick_index(ctx.template.idle_messages.len());
        let line = ctx.template.idle_messages[index].clone();
        let mut result = BehaviorResult::handled();
        result.message = Some(line);
        Some(result)
    }
}
