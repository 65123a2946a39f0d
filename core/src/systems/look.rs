//! Look formatters
//!
//! Renders rooms, entities, and items for the `look` family of commands
//! and for movement output. Health reads as descriptive bands, never raw
//! numbers, when examining someone else.

use emberwake_types::{room_type_emoji, PlayerId};

use crate::inventory;
use crate::systems::dispatcher::GameEvent;
use crate::world::{Item, Npc, Player, Room, World};

/// `look` with no argument: render the player's current room.
pub fn look_at_room(world: &World, player_id: &PlayerId) -> Vec<GameEvent> {
    let Some(player) = world.players.get(player_id) else {
        return vec![GameEvent::to_player(
            player_id.clone(),
            "You have no form. (Player not found)",
        )];
    };
    let Some(room) = world.rooms.get(&player.base.room_id) else {
        return vec![GameEvent::to_player(
            player_id.clone(),
            "There is only darkness. (Room not found)",
        )];
    };
    vec![GameEvent::to_player(
        player_id.clone(),
        room_body(world, room, player_id).join("\n"),
    )]
}

/// The common room rendering: header, description, occupants, floor items,
/// exits. Movement prefixes its own lines on top of this.
pub fn room_body(world: &World, room: &Room, viewer_id: &str) -> Vec<String> {
    let mut lines = vec![
        format!("**{} {}**", room_type_emoji(&room.room_type), room.name),
        room.effective_description().to_string(),
    ];

    lines.extend(format_room_entities(world, room, viewer_id));

    if !room.items.is_empty() {
        let mut item_lines = Vec::new();
        for item_id in &room.items {
            let Some(item) = world.items.get(item_id) else {
                continue;
            };
            let quantity = if item.quantity > 1 {
                format!(" x{}", item.quantity)
            } else {
                String::new()
            };
            item_lines.push(format!("  {}{quantity}", item.name));
        }
        if !item_lines.is_empty() {
            item_lines.sort();
            lines.push(String::new());
            lines.push("Items here:".to_string());
            lines.extend(item_lines);
        }
    }

    let exits = room.effective_exits();
    if !exits.is_empty() {
        let mut names: Vec<&str> = exits.keys().map(|d| d.as_str()).collect();
        names.sort_unstable();
        lines.push(String::new());
        lines.push(format!("Exits: {}", names.join(", ")));
    }
    lines
}

/// Occupant listing: connected players, stasis players, then living NPCs.
fn format_room_entities(world: &World, room: &Room, exclude_player_id: &str) -> Vec<String> {
    let mut connected = Vec::new();
    let mut stasis = Vec::new();
    let mut npcs = Vec::new();

    for entity_id in &room.entities {
        if entity_id == exclude_player_id {
            continue;
        }
        if let Some(player) = world.players.get(entity_id) {
            if player.is_connected {
                connected.push(player.base.name.clone());
            } else {
                stasis.push(player.base.name.clone());
            }
        } else if let Some(npc) = world.npcs.get(entity_id) {
            if npc.base.is_alive() {
                npcs.push(npc.display_name().to_string());
            }
        }
    }
    connected.sort();
    stasis.sort();
    npcs.sort();

    let mut lines = Vec::new();
    if !connected.is_empty() {
        lines.push(String::new());
        for name in connected {
            lines.push(format!("{name} is here."));
        }
    }
    if !stasis.is_empty() {
        lines.push(String::new());
        for name in stasis {
            lines.push(format!(
                "(Stasis) The flickering form of {name} is here, suspended in prismatic stasis."
            ));
        }
    }
    if !npcs.is_empty() {
        lines.push(String::new());
        for name in npcs {
            lines.push(format!("{name} is here."));
        }
    }
    lines
}

/// `look <target>`: players, then NPCs, then items in room or inventory.
pub fn look_at_target(world: &World, player_id: &PlayerId, term: &str) -> Vec<GameEvent> {
    let Some(player) = world.players.get(player_id) else {
        return vec![GameEvent::to_player(
            player_id.clone(),
            "You have no form. (Player not found)",
        )];
    };
    let room_id = player.base.room_id.clone();

    if let Some(entity) = world.find_entity_in_room(&room_id, term, true, true) {
        let text = match entity {
            crate::world::EntityRef::Player(target) => describe_player(target),
            crate::world::EntityRef::Npc(npc) => describe_npc(world, npc),
        };
        return vec![GameEvent::to_player(player_id.clone(), text)];
    }
    if let Some(item) = world.find_item_in_room(&room_id, term) {
        return vec![GameEvent::to_player(
            player_id.clone(),
            describe_item(world, item),
        )];
    }
    if let Some(item_id) = inventory::find_item_by_name(world, player_id, term, inventory::SearchScope::Both)
        && let Some(item) = world.items.get(&item_id)
    {
        return vec![GameEvent::to_player(
            player_id.clone(),
            describe_item(world, item),
        )];
    }

    vec![GameEvent::to_player(
        player_id.clone(),
        format!("You don't see '{term}' here."),
    )]
}

fn health_band(percent: f32) -> &'static str {
    if percent >= 100.0 {
        "appears uninjured"
    } else if percent >= 75.0 {
        "has minor injuries"
    } else if percent >= 50.0 {
        "is moderately wounded"
    } else if percent >= 25.0 {
        "is heavily wounded"
    } else {
        "is near death"
    }
}

fn describe_player(target: &Player) -> String {
    let percent = if target.base.max_health > 0 {
        target.base.current_health as f32 / target.base.max_health as f32 * 100.0
    } else {
        0.0
    };
    let mut lines = vec![
        format!("**{}**", target.base.name),
        format!("A level {} {}.", target.level, target.character_class),
        format!("Condition: {} {}.", target.base.name, health_band(percent)),
    ];
    if !target.is_connected {
        lines.push(String::new());
        lines.push("*They appear to be in a trance-like stasis.*".to_string());
    }
    lines.join("\n")
}

fn describe_npc(world: &World, npc: &Npc) -> String {
    let Some(template) = world.npc_templates.get(&npc.template_id) else {
        return format!("You see {}, but something seems off...", npc.display_name());
    };
    let display_name = npc.display_name();
    let percent = if npc.base.max_health > 0 {
        npc.base.current_health as f32 / npc.base.max_health as f32 * 100.0
    } else {
        0.0
    };

    let disposition = match template.npc_type {
        crate::world::templates::NpcType::Hostile => "🔴 Hostile",
        crate::world::templates::NpcType::Neutral => "🟡 Neutral",
        crate::world::templates::NpcType::Friendly => "🟢 Friendly",
        crate::world::templates::NpcType::Merchant => "🛒 Merchant",
    };

    let mut lines = vec![
        format!("**{display_name}**"),
        template.description.clone(),
        String::new(),
        format!("Disposition: {disposition}"),
        format!("Level: {}", template.level),
        format!("Condition: {display_name} {}.", health_band(percent)),
    ];
    if let Some(guard_message) = &npc.instance_data.guard_message {
        lines.push(String::new());
        lines.push(guard_message.clone());
    }
    lines.join("\n")
}

fn describe_item(world: &World, item: &Item) -> String {
    let Some(template) = world.item_templates.get(&item.template_id) else {
        return format!("You see {}, but something seems off...", item.name);
    };

    let mut lines = vec![format!("**{}**", template.name), template.description.clone()];
    if let Some(flavor) = &template.flavor_text {
        lines.push(String::new());
        lines.push(flavor.clone());
    }

    lines.push(String::new());
    let mut properties = Vec::new();

    let mut type_line = capitalize(&template.item_type);
    if let Some(subtype) = &template.item_subtype {
        type_line.push_str(&format!(" ({subtype})"));
    }
    if template.rarity != "common" {
        type_line.push_str(&format!(" - {}", capitalize(&template.rarity)));
    }
    properties.push(format!("Type: {type_line}"));

    let total_weight = template.weight * item.quantity as f32;
    if item.quantity > 1 {
        properties.push(format!(
            "Weight: {total_weight:.1} kg ({:.1} kg each)",
            template.weight
        ));
    } else {
        properties.push(format!("Weight: {total_weight:.1} kg"));
    }

    if template.has_durability
        && let Some(durability) = item.current_durability
    {
        properties.push(format!("Durability: {durability}/{}", template.max_durability));
    }
    if let Some(slot) = &template.equipment_slot {
        properties.push(format!("Equipment Slot: {}", capitalize(slot)));
    }
    if !template.stat_modifiers.is_empty() {
        let mut mods: Vec<String> = template
            .stat_modifiers
            .iter()
            .map(|(stat, delta)| format!("{delta:+} {}", stat.label()))
            .collect();
        mods.sort();
        properties.push(format!("Effects: {}", mods.join(", ")));
    }
    if template.value > 0 {
        let total = template.value * item.quantity;
        if item.quantity > 1 {
            properties.push(format!("Value: {total} gold ({} each)", template.value));
        } else {
            properties.push(format!("Value: {total} gold"));
        }
    }
    if template.max_stack_size > 1 {
        properties.push(format!("Quantity: {}/{}", item.quantity, template.max_stack_size));
    } else if item.quantity > 1 {
        properties.push(format!("Quantity: {}", item.quantity));
    }
    lines.extend(properties.into_iter().map(|p| format!("  {p}")));

    if item.is_equipped() {
        lines.push(String::new());
        lines.push("  [Currently Equipped]".to_string());
    }

    if template.is_container {
        lines.extend(format_container_contents(world, &item.id, &template.name));
    }
    lines.join("\n")
}

/// Container listing with capacity readout.
pub fn format_container_contents(world: &World, container_id: &str, container_name: &str) -> Vec<String> {
    let mut lines = vec![String::new()];
    let mut contents = Vec::new();
    for item_id in world.container_contents(container_id) {
        let Some(item) = world.items.get(&item_id) else {
            continue;
        };
        let quantity = if item.quantity > 1 {
            format!(" x{}", item.quantity)
        } else {
            String::new()
        };
        contents.push(format!("  {}{quantity}", item.name));
    }
    contents.sort();

    if contents.is_empty() {
        lines.push(format!("**{container_name} is empty.**"));
        return lines;
    }

    lines.push(format!("**Contents of {container_name}:**"));
    lines.extend(contents);

    if let Some(template) = world
        .items
        .get(container_id)
        .and_then(|c| world.item_templates.get(&c.template_id))
        && let Some(capacity) = template.container_capacity
    {
        match template.container_type {
            crate::world::templates::ContainerType::WeightBased => {
                lines.push(format!(
                    "  Weight: {:.1}/{capacity:.1} kg",
                    world.container_weight(container_id)
                ));
            }
            crate::world::templates::ContainerType::SlotBased => {
                lines.push(format!(
                    "  Slots: {}/{capacity:.0}",
                    world.container_slot_count(container_id)
                ));
            }
        }
    }
    lines
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
