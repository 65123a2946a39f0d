//! Quest and dialogue system
//!
//! Quests are template-driven: visit / collect / kill objectives tracked
//! per player. Dialogue is a numbered-option conversation with an NPC;
//! while a dialogue is active, raw input routes here instead of the
//! command router. A quest completes the moment its final objective is
//! met, paying its reward immediately.

use emberwake_types::PlayerId;

use crate::engine::WorldEngine;
use crate::systems::combat;
use crate::systems::dispatcher::GameEvent;
use crate::world::templates::{DialogueTree, QuestObjective, QuestTemplate};
use crate::world::{DialogueState, QuestProgress, QuestStatus, World};

// ─────────────────────────────────────────────────────────────────────────────
// Journal Commands
// ─────────────────────────────────────────────────────────────────────────────

/// `journal`: list active and completed quests.
pub fn journal_command(world: &World, player_id: &PlayerId) -> Vec<GameEvent> {
    let Some(player) = world.players.get(player_id) else {
        return vec![GameEvent::to_player(player_id.clone(), "You have no form.")];
    };
    if player.quest_progress.is_empty() && player.completed_quests.is_empty() {
        return vec![GameEvent::to_player(
            player_id.clone(),
            "Your journal is empty.",
        )];
    }

    let mut lines = vec!["═══ Quest Journal ═══".to_string()];
    let mut active: Vec<(&String, &QuestProgress)> = player
        .quest_progress
        .iter()
        .filter(|(_, p)| p.status == QuestStatus::Active)
        .collect();
    active.sort_by_key(|(id, _)| (*id).clone());

    if active.is_empty() {
        lines.push("No active quests.".to_string());
    }
    for (quest_id, progress) in active {
        let Some(template) = world.quest_templates.get(quest_id) else {
            continue;
        };
        lines.push(String::new());
        lines.push(format!("**{}**", template.name));
        for (index, objective) in template.objectives.iter().enumerate() {
            let done = progress.objective_progress.get(index).copied().unwrap_or(0);
            let goal = objective.goal();
            let marker = if done >= goal { "✅" } else { "▫️" };
            lines.push(format!("  {marker} {} ({done}/{goal})", objective.describe()));
        }
    }
    if !player.completed_quests.is_empty() {
        lines.push(String::new());
        lines.push(format!("Completed: {}", player.completed_quests.len()));
    }
    vec![GameEvent::to_player(player_id.clone(), lines.join("\n"))]
}

/// `quest <name>`: details of one quest by name.
pub fn quest_detail_command(world: &World, player_id: &PlayerId, args: &str) -> Vec<GameEvent> {
    let term = args.trim();
    if term.is_empty() {
        return vec![GameEvent::to_player(
            player_id.clone(),
            "Which quest? Usage: quest <quest_name>",
        )];
    }
    let Some(player) = world.players.get(player_id) else {
        return vec![GameEvent::to_player(player_id.clone(), "You have no form.")];
    };

    let found = player.quest_progress.keys().find_map(|quest_id| {
        world
            .quest_templates
            .get(quest_id)
            .filter(|t| t.name.to_lowercase().contains(&term.to_lowercase()))
            .map(|t| (quest_id.clone(), t))
    });
    let Some((quest_id, template)) = found else {
        return vec![GameEvent::to_player(
            player_id.clone(),
            format!("You have no quest matching '{term}'."),
        )];
    };
    let progress = &player.quest_progress[&quest_id];

    let mut lines = vec![
        format!("═══ {} ═══", template.name),
        template.description.clone(),
        String::new(),
    ];
    for (index, objective) in template.objectives.iter().enumerate() {
        let done = progress.objective_progress.get(index).copied().unwrap_or(0);
        let goal = objective.goal();
        let marker = if done >= goal { "✅" } else { "▫️" };
        lines.push(format!("  {marker} {} ({done}/{goal})", objective.describe()));
    }
    if template.xp_reward > 0 {
        lines.push(String::new());
        lines.push(format!("Reward: {} XP", template.xp_reward));
    }
    vec![GameEvent::to_player(player_id.clone(), lines.join("\n"))]
}

/// `abandon <name>`: drop an active quest.
pub fn abandon_command(engine: &mut WorldEngine, player_id: &PlayerId, args: &str) -> Vec<GameEvent> {
    let term = args.trim();
    if term.is_empty() {
        return vec![GameEvent::to_player(
            player_id.clone(),
            "Abandon which quest? Usage: abandon <quest_name>",
        )];
    }
    let found = engine
        .world
        .players
        .get(player_id)
        .map(|player| {
            player
                .quest_progress
                .keys()
                .filter(|quest_id| {
                    engine
                        .world
                        .quest_templates
                        .get(*quest_id)
                        .is_some_and(|t| t.name.to_lowercase().contains(&term.to_lowercase()))
                })
                .cloned()
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let Some(quest_id) = found.first() else {
        return vec![GameEvent::to_player(
            player_id.clone(),
            format!("You have no quest matching '{term}'."),
        )];
    };

    let name = engine
        .world
        .quest_templates
        .get(quest_id)
        .map(|t| t.name.clone())
        .unwrap_or_else(|| quest_id.clone());
    if let Some(player) = engine.world.players.get_mut(player_id) {
        player.quest_progress.remove(quest_id);
    }
    engine.dirty.mark(player_id);
    vec![GameEvent::to_player(
        player_id.clone(),
        format!("You abandon the quest \"{name}\"."),
    )]
}

// ─────────────────────────────────────────────────────────────────────────────
// Dialogue
// ─────────────────────────────────────────────────────────────────────────────

/// `talk <npc>`: open a conversation if the NPC has dialogue.
pub fn talk_command(engine: &mut WorldEngine, player_id: &PlayerId, args: &str) -> Vec<GameEvent> {
    let term = args.trim();
    if term.is_empty() {
        return vec![GameEvent::to_player(
            player_id.clone(),
            "Talk to whom? Usage: talk <npc_name>",
        )];
    }
    let room_id = engine
        .world
        .players
        .get(player_id)
        .map(|p| p.base.room_id.clone());
    let Some(room_id) = room_id else {
        return vec![GameEvent::to_player(player_id.clone(), "You have no form.")];
    };

    let npc = engine
        .world
        .find_entity_in_room(&room_id, term, false, true)
        .map(|e| e.base().id.clone());
    let Some(npc_id) = npc else {
        return vec![GameEvent::to_player(
            player_id.clone(),
            format!("You don't see '{term}' here."),
        )];
    };

    let dialogue = engine
        .world
        .npcs
        .get(&npc_id)
        .and_then(|npc| engine.world.npc_templates.get(&npc.template_id))
        .and_then(|template| template.dialogue.clone());
    let npc_name = engine
        .world
        .npcs
        .get(&npc_id)
        .map(|n| n.display_name().to_string())
        .unwrap_or_default();
    let Some(dialogue) = dialogue else {
        return vec![GameEvent::to_player(
            player_id.clone(),
            format!("{npc_name} has nothing to say."),
        )];
    };

    let node_id = dialogue.start.clone();
    if let Some(player) = engine.world.players.get_mut(player_id) {
        player.active_dialogue = Some(DialogueState {
            npc_id: npc_id.clone(),
            node_id: node_id.clone(),
        });
    }
    render_node(&dialogue, &node_id, &npc_name, player_id)
}

fn render_node(
    dialogue: &DialogueTree,
    node_id: &str,
    npc_name: &str,
    player_id: &PlayerId,
) -> Vec<GameEvent> {
    let Some(node) = dialogue.nodes.get(node_id) else {
        return vec![GameEvent::to_player(
            player_id.clone(),
            format!("{npc_name} falls silent."),
        )];
    };
    let mut lines = vec![format!("{npc_name} says: \"{}\"", node.text)];
    if node.options.is_empty() {
        lines.push(String::new());
        lines.push("(Say 'bye' to end the conversation.)".to_string());
    } else {
        lines.push(String::new());
        for (index, option) in node.options.iter().enumerate() {
            lines.push(format!("  {}. {}", index + 1, option.text));
        }
        lines.push(String::new());
        lines.push("(Enter a number to respond, or 'bye' to leave.)".to_string());
    }
    vec![GameEvent::to_player(player_id.clone(), lines.join("\n"))]
}

/// Raw input while a dialogue is active: numbers pick options, farewell
/// words leave, anything else gets a hint.
pub fn handle_dialogue_input(
    engine: &mut WorldEngine,
    player_id: &PlayerId,
    raw: &str,
) -> Vec<GameEvent> {
    let input = raw.trim().to_lowercase();

    if matches!(input.as_str(), "bye" | "farewell" | "leave" | "exit" | "goodbye") {
        return end_dialogue(engine, player_id);
    }

    if let Ok(choice) = input.parse::<usize>() {
        return select_option(engine, player_id, choice);
    }

    vec![GameEvent::to_player(
        player_id.clone(),
        "You're in a conversation. Enter a number (1, 2, 3...) to respond, or 'bye' to leave.",
    )]
}

fn end_dialogue(engine: &mut WorldEngine, player_id: &PlayerId) -> Vec<GameEvent> {
    let state = engine
        .world
        .players
        .get_mut(player_id)
        .and_then(|p| p.active_dialogue.take());
    let npc_name = state
        .and_then(|s| engine.world.npcs.get(&s.npc_id).map(|n| n.display_name().to_string()))
        .unwrap_or_else(|| "They".to_string());
    vec![GameEvent::to_player(
        player_id.clone(),
        format!("You end the conversation with {npc_name}."),
    )]
}

fn select_option(engine: &mut WorldEngine, player_id: &PlayerId, choice: usize) -> Vec<GameEvent> {
    let Some(state) = engine
        .world
        .players
        .get(player_id)
        .and_then(|p| p.active_dialogue.clone())
    else {
        return vec![GameEvent::to_player(player_id.clone(), "You're not talking to anyone.")];
    };
    let dialogue = engine
        .world
        .npcs
        .get(&state.npc_id)
        .and_then(|npc| engine.world.npc_templates.get(&npc.template_id))
        .and_then(|t| t.dialogue.clone());
    let npc_name = engine
        .world
        .npcs
        .get(&state.npc_id)
        .map(|n| n.display_name().to_string())
        .unwrap_or_default();
    let Some(dialogue) = dialogue else {
        return end_dialogue(engine, player_id);
    };

    let option = dialogue
        .nodes
        .get(&state.node_id)
        .and_then(|node| node.options.get(choice.wrapping_sub(1)))
        .cloned();
    let Some(option) = option else {
        return vec![GameEvent::to_player(
            player_id.clone(),
            "That's not one of the options.",
        )];
    };

    let mut events = Vec::new();
    if let Some(quest_id) = &option.offer_quest {
        events.extend(accept_quest(engine, player_id, quest_id));
    }
    match option.next {
        Some(next_node) => {
            if let Some(player) = engine.world.players.get_mut(player_id)
                && let Some(state) = player.active_dialogue.as_mut()
            {
                state.node_id = next_node.clone();
            }
            events.extend(render_node(&dialogue, &next_node, &npc_name, player_id));
        }
        None => {
            events.extend(end_dialogue(engine, player_id));
        }
    }
    events
}

// ─────────────────────────────────────────────────────────────────────────────
// Progress Tracking
// ─────────────────────────────────────────────────────────────────────────────

/// Begin a quest for a player.
pub fn accept_quest(engine: &mut WorldEngine, player_id: &PlayerId, quest_id: &str) -> Vec<GameEvent> {
    let Some(template) = engine.world.quest_templates.get(quest_id) else {
        tracing::warn!(quest = %quest_id, "dialogue offered unknown quest");
        return Vec::new();
    };
    let name = template.name.clone();
    let objective_count = template.objectives.len();

    let Some(player) = engine.world.players.get_mut(player_id) else {
        return Vec::new();
    };
    if player.quest_progress.contains_key(quest_id) || player.completed_quests.contains(quest_id) {
        return vec![GameEvent::to_player(
            player_id.clone(),
            format!("You already know of \"{name}\"."),
        )];
    }
    player
        .quest_progress
        .insert(quest_id.to_string(), QuestProgress::new(objective_count));
    engine.dirty.mark(player_id);
    vec![GameEvent::to_player(
        player_id.clone(),
        format!("📜 Quest accepted: **{name}**"),
    )]
}

/// Advance visit objectives when a player enters a room.
pub fn on_room_entered(engine: &mut WorldEngine, player_id: &PlayerId, room_id: &str) -> Vec<GameEvent> {
    advance_objectives(engine, player_id, |objective| match objective {
        QuestObjective::Visit { room_id: target } => (target == room_id).then_some(1),
        _ => None,
    })
}

/// Advance collect objectives when a player acquires items.
pub fn on_item_acquired(
    engine: &mut WorldEngine,
    player_id: &PlayerId,
    template_id: &str,
    count: u32,
) -> Vec<GameEvent> {
    advance_objectives(engine, player_id, |objective| match objective {
        QuestObjective::Collect { template_id: target, .. } => {
            (target == template_id).then_some(count)
        }
        _ => None,
    })
}

/// Advance kill objectives when a player slays an NPC.
pub fn on_npc_killed(engine: &mut WorldEngine, player_id: &PlayerId, template_id: &str) -> Vec<GameEvent> {
    advance_objectives(engine, player_id, |objective| match objective {
        QuestObjective::Kill { template_id: target, .. } => (target == template_id).then_some(1),
        _ => None,
    })
}

/// Shared progress engine: bump matching objectives across all active
/// quests, completing any quest whose objectives are all met.
fn advance_objectives(
    engine: &mut WorldEngine,
    player_id: &PlayerId,
    matcher: impl Fn(&QuestObjective) -> Option<u32>,
) -> Vec<GameEvent> {
    let active: Vec<String> = engine
        .world
        .players
        .get(player_id)
        .map(|player| {
            player
                .quest_progress
                .iter()
                .filter(|(_, p)| p.status == QuestStatus::Active)
                .map(|(id, _)| id.clone())
                .collect()
        })
        .unwrap_or_default();

    let mut events = Vec::new();
    let mut completed: Vec<(String, QuestTemplate)> = Vec::new();

    for quest_id in active {
        let Some(template) = engine.world.quest_templates.get(&quest_id).cloned() else {
            continue;
        };
        let mut advanced = false;
        if let Some(player) = engine.world.players.get_mut(player_id)
            && let Some(progress) = player.quest_progress.get_mut(&quest_id)
        {
            for (index, objective) in template.objectives.iter().enumerate() {
                let Some(increment) = matcher(objective) else {
                    continue;
                };
                let goal = objective.goal();
                let Some(slot) = progress.objective_progress.get_mut(index) else {
                    continue;
                };
                if *slot < goal {
                    *slot = (*slot + increment).min(goal);
                    advanced = true;
                }
            }
            let all_met = template
                .objectives
                .iter()
                .enumerate()
                .all(|(index, objective)| {
                    progress.objective_progress.get(index).copied().unwrap_or(0)
                        >= objective.goal()
                });
            if advanced && all_met {
                progress.status = QuestStatus::Completed;
                progress.completed_at = Some(chrono::Utc::now());
                completed.push((quest_id.clone(), template.clone()));
            }
        }
        if advanced {
            engine.dirty.mark(player_id);
        }
    }

    for (quest_id, template) in completed {
        if let Some(player) = engine.world.players.get_mut(player_id) {
            player.quest_progress.remove(&quest_id);
            player.completed_quests.insert(quest_id.clone());
        }
        events.push(GameEvent::to_player(
            player_id.clone(),
            format!("🎯 **Quest Complete:** {}!", template.name),
        ));
        if template.xp_reward > 0 {
            events.extend(combat::award_experience(engine, player_id, template.xp_reward));
        }
    }
    events
}

#[cfg(test)]
mod quest_tests;
