//! The in-memory world graph
//!
//! One `World` value owns every room, area, entity, item, and template.
//! Rooms reference entities and items by ID; all cross-references go
//! through the maps here so scheduled callbacks can survive referent
//! destruction by re-resolving IDs.

mod area;
mod combat_state;
mod effect;
mod entity;
mod item;
pub mod leveling;
mod quest;
mod room;
pub mod templates;
pub mod time;

pub use area::Area;
pub use combat_state::{CombatPhase, CombatState, WeaponStats};
pub use effect::{Effect, EffectType};
pub use entity::{
    EntityBase, EntityMut, EntityRef, InventoryMeta, Npc, NpcInstanceData, PatrolMode, PatrolState,
    Player, Stat,
};
pub use item::{Item, ItemLocation};
pub use quest::{DialogueState, QuestProgress, QuestStatus};
pub use room::Room;

use hashbrown::{HashMap, HashSet};
use thiserror::Error;

use emberwake_types::{AreaId, EntityId, ItemId, PlayerId, RoomId, TemplateId};

use templates::{ItemTemplate, NpcTemplate, QuestTemplate};

/// Invariant violations surfaced by the world-graph audit.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("room {room} lists entity {entity} which does not exist")]
    DanglingRoomEntity { room: RoomId, entity: EntityId },
    #[error("entity {entity} is in room {listed} but claims room {claimed}")]
    EntityRoomMismatch {
        entity: EntityId,
        listed: RoomId,
        claimed: RoomId,
    },
    #[error("item {item} has an inconsistent location")]
    ItemLocationInconsistent { item: ItemId },
    #[error("room {room} lists item {item} which is not on its floor")]
    RoomItemMismatch { room: RoomId, item: ItemId },
    #[error("entity {entity} health {health} outside [0, {max}]")]
    HealthOutOfRange {
        entity: EntityId,
        health: i32,
        max: i32,
    },
    #[error("dead NPC {npc} still present in room {room}")]
    DeadNpcInRoom { npc: EntityId, room: RoomId },
}

/// Aggregate of all world state. Built once at startup and mutated only by
/// the engine loop.
#[derive(Debug, Default)]
pub struct World {
    pub rooms: HashMap<RoomId, Room>,
    pub areas: HashMap<AreaId, Area>,
    pub players: HashMap<PlayerId, Player>,
    pub npcs: HashMap<EntityId, Npc>,
    pub items: HashMap<ItemId, Item>,

    /// Global clock for rooms outside any area; areas keep their own.
    pub world_time: time::WorldTime,

    pub npc_templates: HashMap<TemplateId, NpcTemplate>,
    pub item_templates: HashMap<TemplateId, ItemTemplate>,
    pub quest_templates: HashMap<TemplateId, QuestTemplate>,

    /// Index of container item -> contained item IDs.
    container_contents: HashMap<ItemId, HashSet<ItemId>>,
    /// Monotonic counter for instance ID minting.
    next_instance: u64,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Lookups ────────────────────────────────────────────────────────────

    /// Resolve an entity ID against players first, then NPCs.
    pub fn entity(&self, id: &str) -> Option<EntityRef<'_>> {
        if let Some(player) = self.players.get(id) {
            return Some(EntityRef::Player(player));
        }
        self.npcs.get(id).map(EntityRef::Npc)
    }

    pub fn entity_mut(&mut self, id: &str) -> Option<EntityMut<'_>> {
        if self.players.contains_key(id) {
            return self.players.get_mut(id).map(EntityMut::Player);
        }
        self.npcs.get_mut(id).map(EntityMut::Npc)
    }

    pub fn player_room(&self, player_id: &str) -> Option<&Room> {
        let player = self.players.get(player_id)?;
        self.rooms.get(&player.base.room_id)
    }

    /// Area containing the given room, if any.
    pub fn room_area(&self, room_id: &str) -> Option<&Area> {
        let room = self.rooms.get(room_id)?;
        self.areas.get(room.area_id.as_deref()?)
    }

    pub fn player_ids_in_room(&self, room_id: &str) -> HashSet<PlayerId> {
        let Some(room) = self.rooms.get(room_id) else {
            return HashSet::new();
        };
        room.entities
            .iter()
            .filter(|id| self.players.contains_key(*id))
            .cloned()
            .collect()
    }

    pub fn npc_ids_in_room(&self, room_id: &str) -> Vec<EntityId> {
        let Some(room) = self.rooms.get(room_id) else {
            return Vec::new();
        };
        room.entities
            .iter()
            .filter(|id| self.npcs.contains_key(*id))
            .cloned()
            .collect()
    }

    /// Find a living entity in a room by name or keyword.
    pub fn find_entity_in_room(
        &self,
        room_id: &str,
        term: &str,
        include_players: bool,
        include_npcs: bool,
    ) -> Option<EntityRef<'_>> {
        let room = self.rooms.get(room_id)?;
        for entity_id in &room.entities {
            if include_players
                && let Some(player) = self.players.get(entity_id)
                && player.base.matches_keyword(term)
            {
                return Some(EntityRef::Player(player));
            }
            if include_npcs
                && let Some(npc) = self.npcs.get(entity_id)
                && npc.base.is_alive()
                && (npc.base.matches_keyword(term)
                    || npc
                        .instance_data
                        .name_override
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&term.to_lowercase())))
            {
                return Some(EntityRef::Npc(npc));
            }
        }
        None
    }

    /// Find an item on a room's floor by name or keyword.
    pub fn find_item_in_room(&self, room_id: &str, term: &str) -> Option<&Item> {
        let room = self.rooms.get(room_id)?;
        room.items
            .iter()
            .filter_map(|id| self.items.get(id))
            .find(|item| item.matches_keyword(term))
    }

    // ─── Placement ──────────────────────────────────────────────────────────

    /// Insert a player, registering it in its room's entity set.
    pub fn insert_player(&mut self, player: Player) {
        if let Some(room) = self.rooms.get_mut(&player.base.room_id) {
            room.entities.insert(player.base.id.clone());
        }
        self.players.insert(player.base.id.clone(), player);
    }

    /// Insert an NPC, registering it in its room's entity set.
    pub fn insert_npc(&mut self, npc: Npc) {
        if let Some(room) = self.rooms.get_mut(&npc.base.room_id) {
            room.entities.insert(npc.base.id.clone());
        }
        self.npcs.insert(npc.base.id.clone(), npc);
    }

    /// Insert an item, registering floor placement and the container index.
    pub fn insert_item(&mut self, item: Item) {
        match item.location() {
            ItemLocation::Room(room_id) => {
                if let Some(room) = self.rooms.get_mut(&room_id) {
                    room.items.insert(item.id.clone());
                }
            }
            ItemLocation::Inventory(player_id) => {
                if let Some(player) = self.players.get_mut(&player_id) {
                    player.inventory_items.insert(item.id.clone());
                }
            }
            ItemLocation::Container(container_id) => {
                self.container_contents
                    .entry(container_id)
                    .or_default()
                    .insert(item.id.clone());
            }
            ItemLocation::Inconsistent => {}
        }
        self.items.insert(item.id.clone(), item);
    }

    /// Register an NPC template, resolving its behavior config.
    pub fn insert_npc_template(&mut self, mut template: NpcTemplate) {
        template.resolve_behaviors();
        self.npc_templates.insert(template.id.clone(), template);
    }

    pub fn insert_item_template(&mut self, template: ItemTemplate) {
        self.item_templates.insert(template.id.clone(), template);
    }

    pub fn insert_quest_template(&mut self, template: QuestTemplate) {
        self.quest_templates.insert(template.id.clone(), template);
    }

    /// Mint a fresh instance ID with the given prefix.
    pub fn mint_id(&mut self, prefix: &str) -> String {
        self.next_instance += 1;
        format!("{prefix}_{:06}", self.next_instance)
    }

    /// Stamp a new NPC from a template into a room.
    pub fn spawn_npc(&mut self, template_id: &str, room_id: &str) -> Option<EntityId> {
        let template = self.npc_templates.get(template_id)?.clone();
        let id = self.mint_id(&format!("npc_{template_id}"));
        let mut base = EntityBase::new(id.clone(), template.name.clone(), room_id.to_string());
        base.keywords = template.keywords.clone();
        base.max_health = template.max_health;
        base.current_health = template.max_health;
        base.armor_class = template.armor_class;
        base.strength = template.strength;
        base.dexterity = template.dexterity;
        base.intelligence = template.intelligence;
        base.vitality = template.vitality;

        self.insert_npc(Npc {
            base,
            template_id: template.id.clone(),
            spawn_room_id: room_id.to_string(),
            respawn_time_override: None,
            last_killed_at: None,
            idle_event_id: None,
            wander_event_id: None,
            target_id: None,
            instance_data: NpcInstanceData::default(),
            inventory_items: HashSet::new(),
        });
        Some(id)
    }

    /// Stamp a new item from a template onto a room floor.
    pub fn spawn_item(&mut self, template_id: &str, room_id: &str, quantity: u32) -> Option<ItemId> {
        let template = self.item_templates.get(template_id)?.clone();
        let id = self.mint_id("item");
        let mut item = Item::on_floor(id.clone(), template.id.clone(), template.name.clone(), room_id.to_string());
        item.keywords = template.keywords.clone();
        item.description = template.description.clone();
        item.quantity = quantity;
        if template.has_durability {
            item.current_durability = Some(template.max_durability);
        }
        self.insert_item(item);
        Some(id)
    }

    // ─── Container Index ────────────────────────────────────────────────────

    pub fn container_contents(&self, container_id: &str) -> Vec<ItemId> {
        self.container_contents
            .get(container_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn add_item_to_container(&mut self, item_id: &str, container_id: &str) {
        if let Some(item) = self.items.get_mut(item_id) {
            item.place_in_container(container_id.to_string());
            self.container_contents
                .entry(container_id.to_string())
                .or_default()
                .insert(item_id.to_string());
        }
    }

    pub fn remove_item_from_container(&mut self, item_id: &str) {
        let Some(item) = self.items.get_mut(item_id) else {
            return;
        };
        if let Some(container_id) = item.container_id.take()
            && let Some(contents) = self.container_contents.get_mut(&container_id)
        {
            contents.remove(item_id);
        }
    }

    pub fn container_slot_count(&self, container_id: &str) -> usize {
        self.container_contents
            .get(container_id)
            .map(HashSet::len)
            .unwrap_or(0)
    }

    pub fn container_weight(&self, container_id: &str) -> f32 {
        let Some(contents) = self.container_contents.get(container_id) else {
            return 0.0;
        };
        contents
            .iter()
            .filter_map(|id| self.items.get(id))
            .map(|item| {
                let unit = self
                    .item_templates
                    .get(&item.template_id)
                    .map(|t| t.weight)
                    .unwrap_or(0.0);
                unit * item.quantity as f32
            })
            .sum()
    }

    /// Whether `candidate` appears anywhere in `item_id`'s containment
    /// chain, itself included. Used to refuse recursive containment.
    pub fn containment_chain_includes(&self, item_id: &str, candidate: &str) -> bool {
        let mut current = Some(item_id.to_string());
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.items.get(&id).and_then(|i| i.container_id.clone());
        }
        false
    }

    // ─── Invariant Audit ────────────────────────────────────────────────────

    /// Verify the cross-reference invariants of the graph. Used by tests
    /// after every command or scheduled callback under scrutiny.
    pub fn check_invariants(&self) -> Result<(), WorldError> {
        for (room_id, room) in &self.rooms {
            for entity_id in &room.entities {
                let Some(entity) = self.entity(entity_id) else {
                    return Err(WorldError::DanglingRoomEntity {
                        room: room_id.clone(),
                        entity: entity_id.clone(),
                    });
                };
                if &entity.base().room_id != room_id {
                    return Err(WorldError::EntityRoomMismatch {
                        entity: entity_id.clone(),
                        listed: room_id.clone(),
                        claimed: entity.base().room_id.clone(),
                    });
                }
            }
            for item_id in &room.items {
                let on_floor = self
                    .items
                    .get(item_id)
                    .is_some_and(|i| i.room_id.as_deref() == Some(room_id.as_str()));
                if !on_floor {
                    return Err(WorldError::RoomItemMismatch {
                        room: room_id.clone(),
                        item: item_id.clone(),
                    });
                }
            }
        }
        for (item_id, item) in &self.items {
            if item.location() == ItemLocation::Inconsistent {
                return Err(WorldError::ItemLocationInconsistent {
                    item: item_id.clone(),
                });
            }
        }
        for (id, player) in &self.players {
            let health = player.base.current_health;
            if health < 0 || health > player.base.max_health {
                return Err(WorldError::HealthOutOfRange {
                    entity: id.clone(),
                    health,
                    max: player.base.max_health,
                });
            }
        }
        for (id, npc) in &self.npcs {
            let health = npc.base.current_health;
            if health < 0 || health > npc.base.max_health {
                return Err(WorldError::HealthOutOfRange {
                    entity: id.clone(),
                    health,
                    max: npc.base.max_health,
                });
            }
            if !npc.base.is_alive()
                && let Some(room) = self.rooms.get(&npc.base.room_id)
                && room.entities.contains(id)
            {
                return Err(WorldError::DeadNpcInRoom {
                    npc: id.clone(),
                    room: npc.base.room_id.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emberwake_types::Direction;

    fn tiny_world() -> World {
        let mut world = World::new();
        let mut start = Room::new("start".into(), "Start", "The starting room.");
        start.exits.insert(Direction::North, "hall".into());
        let mut hall = Room::new("hall".into(), "Hall", "A long hall.");
        hall.exits.insert(Direction::South, "start".into());
        world.rooms.insert("start".into(), start);
        world.rooms.insert("hall".into(), hall);
        world
    }

    #[test]
    fn insert_player_registers_room_membership() {
        let mut world = tiny_world();
        world.insert_player(Player::new("p1".into(), "Marn", "start".into()));
        assert!(world.rooms["start"].entities.contains("p1"));
        world.check_invariants().unwrap();
    }

    #[test]
    fn invariant_audit_catches_room_mismatch() {
        let mut world = tiny_world();
        world.insert_player(Player::new("p1".into(), "Marn", "start".into()));
        // Corrupt: move the player without updating the room set
        world.players.get_mut("p1").unwrap().base.room_id = "hall".into();
        assert!(world.check_invariants().is_err());
    }

    #[test]
    fn container_chain_detection() {
        let mut world = tiny_world();
        world.insert_item(Item::on_floor("bag".into(), "bag".into(), "bag".into(), "start".into()));
        world.insert_item(Item::on_floor("box".into(), "box".into(), "box".into(), "start".into()));
        world.rooms.get_mut("start").unwrap().items.remove("box");
        world.add_item_to_container("box", "bag");
        // box's chain is box -> bag
        assert!(world.containment_chain_includes("box", "bag"));
        assert!(!world.containment_chain_includes("bag", "box"));
        assert_eq!(world.container_slot_count("bag"), 1);
    }
}
