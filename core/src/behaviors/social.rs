//! Social behaviors: alerting allies

use super::{Behavior, BehaviorConfig, BehaviorCtx, BehaviorResult};

/// NPC cries for help when struck, alerting co-located allies. Allies are
/// same-faction entities when the NPC has a faction, or NPCs of the same
/// disposition otherwise.
///
/// The result is advisory (`handled = false`) so retaliation behaviors
/// still get their turn.
pub struct CallsForHelp;

impl Behavior for CallsForHelp {
    fn name(&self) -> &'static str {
        "calls_for_help"
    }

    fn priority(&self) -> i32 {
        55
    }

    fn apply_defaults(&self, config: &mut BehaviorConfig) {
        config.calls_for_help = true;
    }

    fn on_damaged(
        &self,
        ctx: &mut BehaviorCtx<'_>,
        _attacker_id: &str,
        _damage: i32,
    ) -> Option<BehaviorResult> {
        if !ctx.config.calls_for_help {
            return Some(BehaviorResult::default());
        }

        let faction = ctx.template.faction_id.as_deref();
        let has_ally = ctx
            .world
            .npc_ids_in_room(&ctx.npc.base.room_id)
            .into_iter()
            .filter(|id| id != &ctx.npc.base.id)
            .filter_map(|id| ctx.world.npcs.get(&id))
            .filter(|ally| ally.base.is_alive())
            .any(|ally| {
                let ally_template = ctx.world.npc_templates.get(&ally.template_id);
                match faction {
                    Some(faction) => {
                        ally_template.and_then(|t| t.faction_id.as_deref()) == Some(faction)
                    }
                    None => ally_template.map(|t| t.npc_type) == Some(ctx.template.npc_type),
                }
            });

        if !has_ally {
            return Some(BehaviorResult::default());
        }
        Some(BehaviorResult {
            handled: false,
            call_for_help: true,
            message: Some(format!("{} cries out for help!", ctx.npc_name())),
            ..BehaviorResult::default()
        })
    }
}

/// NPC never calls for help. Config-only behavior.
pub struct Loner;

impl Behavior for Loner {
    fn name(&self) -> &'static str {
        "loner"
    }

    fn priority(&self) -> i32 {
        50
    }

    fn apply_defaults(&self, config: &mut BehaviorConfig) {
        config.calls_for_help = false;
    }
}
