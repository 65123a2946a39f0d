//! TOML world documents
//!
//! A flat, author-friendly document shape that converts into the engine's
//! world graph at boot. Templates reuse the engine's own serde types;
//! rooms, areas, and spawn lists get small doc structs of their own.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use emberwake_core::systems::triggers::Trigger;
use emberwake_core::world::templates::{ItemTemplate, NpcTemplate, QuestTemplate};
use emberwake_core::world::{Area, Player, Room, World};
use emberwake_types::Direction;

#[derive(Debug, Deserialize)]
pub struct WorldDoc {
    #[serde(default)]
    pub areas: Vec<AreaDoc>,
    pub rooms: Vec<RoomDoc>,
    #[serde(default)]
    pub npc_templates: Vec<NpcTemplate>,
    #[serde(default)]
    pub item_templates: Vec<ItemTemplate>,
    #[serde(default)]
    pub quest_templates: Vec<QuestTemplate>,
    #[serde(default)]
    pub npcs: Vec<NpcSpawnDoc>,
    #[serde(default)]
    pub items: Vec<ItemSpawnDoc>,
}

#[derive(Debug, Deserialize)]
pub struct AreaDoc {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub biome: Option<String>,
    #[serde(default)]
    pub climate: Option<String>,
    #[serde(default)]
    pub ambient_lighting: Option<String>,
    #[serde(default)]
    pub ambient_sound: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub entry_points: Vec<String>,
    #[serde(default = "default_respawn")]
    pub default_respawn_time: i64,
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
}

fn default_respawn() -> i64 {
    300
}

fn default_time_scale() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
pub struct RoomDoc {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub room_type: Option<String>,
    #[serde(default)]
    pub area_id: Option<String>,
    /// direction name -> destination room id
    #[serde(default)]
    pub exits: BTreeMap<String, String>,
    #[serde(default)]
    pub on_enter_effect: Option<String>,
    #[serde(default)]
    pub on_exit_effect: Option<String>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
}

#[derive(Debug, Deserialize)]
pub struct NpcSpawnDoc {
    pub template_id: String,
    pub room_id: String,
    #[serde(default)]
    pub name_override: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ItemSpawnDoc {
    pub template_id: String,
    pub room_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// Load and build a world from a TOML document on disk.
pub fn load_world(path: &Path) -> Result<World, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let doc: WorldDoc =
        toml::from_str(&text).map_err(|e| format!("failed to parse {}: {e}", path.display()))?;
    build_world(doc)
}

/// Convert a parsed document into the runtime world graph.
pub fn build_world(doc: WorldDoc) -> Result<World, String> {
    let mut world = World::new();

    for area_doc in doc.areas {
        let mut area = Area::new(area_doc.id.clone(), area_doc.name);
        if let Some(biome) = area_doc.biome {
            area.biome = biome;
        }
        if let Some(climate) = area_doc.climate {
            area.climate = climate;
        }
        if let Some(lighting) = area_doc.ambient_lighting {
            area.ambient_lighting = lighting;
        }
        if let Some(sound) = area_doc.ambient_sound {
            area.ambient_sound = sound;
        }
        if let Some(description) = area_doc.description {
            area.description = description;
        }
        area.entry_points = area_doc.entry_points.into_iter().collect();
        area.default_respawn_time = area_doc.default_respawn_time;
        area.time_scale = area_doc.time_scale;
        area.triggers = area_doc.triggers;
        world.areas.insert(area.id.clone(), area);
    }

    for room_doc in doc.rooms {
        let mut room = Room::new(room_doc.id.clone(), room_doc.name, room_doc.description);
        if let Some(room_type) = room_doc.room_type {
            room.room_type = room_type;
        }
        room.area_id = room_doc.area_id.clone();
        for (direction, dest) in room_doc.exits {
            let direction: Direction = direction
                .parse()
                .map_err(|_| format!("room {}: bad exit direction '{direction}'", room_doc.id))?;
            room.exits.insert(direction, dest);
        }
        room.on_enter_effect = room_doc.on_enter_effect;
        room.on_exit_effect = room_doc.on_exit_effect;
        room.triggers = room_doc.triggers;

        if let Some(area_id) = &room_doc.area_id {
            match world.areas.get_mut(area_id) {
                Some(area) => {
                    area.room_ids.insert(room.id.clone());
                }
                None => return Err(format!("room {} names unknown area {area_id}", room_doc.id)),
            }
        }
        world.rooms.insert(room.id.clone(), room);
    }

    // Exits must close over the graph.
    for room in world.rooms.values() {
        for dest in room.exits.values() {
            if !world.rooms.contains_key(dest) {
                return Err(format!("room {} exits to unknown room {dest}", room.id));
            }
        }
    }

    for template in doc.item_templates {
        world.insert_item_template(template);
    }
    for template in doc.npc_templates {
        world.insert_npc_template(template);
    }
    for template in doc.quest_templates {
        world.insert_quest_template(template);
    }

    for spawn in doc.npcs {
        let Some(npc_id) = world.spawn_npc(&spawn.template_id, &spawn.room_id) else {
            return Err(format!("unknown NPC template {}", spawn.template_id));
        };
        if let Some(name) = spawn.name_override
            && let Some(npc) = world.npcs.get_mut(&npc_id)
        {
            npc.instance_data.name_override = Some(name);
        }
    }
    for spawn in doc.items {
        if world
            .spawn_item(&spawn.template_id, &spawn.room_id, spawn.quantity)
            .is_none()
        {
            return Err(format!("unknown item template {}", spawn.template_id));
        }
    }

    world.check_invariants().map_err(|e| e.to_string())?;
    Ok(world)
}

/// Drop a fresh player into the world at the given room.
pub fn add_player(world: &mut World, id: &str, name: &str, room_id: &str) -> Result<(), String> {
    if !world.rooms.contains_key(room_id) {
        return Err(format!("start room {room_id} does not exist"));
    }
    let mut player = Player::new(id.to_string(), name, room_id.to_string());
    player.is_connected = false;
    world.insert_player(player);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_document_builds() {
        let doc: WorldDoc = toml::from_str(crate::demo::DEMO_WORLD).unwrap();
        let world = build_world(doc).unwrap();
        assert!(world.rooms.len() >= 4);
        assert!(!world.npc_templates.is_empty());
        world.check_invariants().unwrap();
    }

    #[test]
    fn bad_exit_is_rejected() {
        let doc: WorldDoc = toml::from_str(
            r#"
            [[rooms]]
            id = "a"
            name = "A"
            description = "Room A."
            [rooms.exits]
            north = "missing"
            "#,
        )
        .unwrap();
        assert!(build_world(doc).is_err());
    }
}
