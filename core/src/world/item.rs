//! Item instances (runtime state)
//!
//! An item lives in exactly one place at a time: a room floor, a player's
//! inventory, or inside a container item. The three location fields are
//! mutually exclusive; `location()` names the current one.

use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use emberwake_types::{ItemId, PlayerId, RoomId, TemplateId};

/// Where an item currently resides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemLocation {
    Room(RoomId),
    Inventory(PlayerId),
    Container(ItemId),
    /// Invariant violation: zero or multiple location fields set.
    Inconsistent,
}

/// A spawned item instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub template_id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub description: String,

    // Exactly one of these is set at any time.
    #[serde(default)]
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub player_id: Option<PlayerId>,
    #[serde(default)]
    pub container_id: Option<ItemId>,

    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub current_durability: Option<i32>,
    /// Slot name when equipped by the owning player.
    #[serde(default)]
    pub equipped_slot: Option<String>,
    #[serde(default)]
    pub instance_data: HashMap<String, String>,
    /// When the item hit a room floor, for decay sweeps.
    #[serde(default)]
    pub dropped_at: Option<DateTime<Utc>>,
}

fn default_quantity() -> u32 {
    1
}

impl Item {
    /// New instance on a room floor.
    pub fn on_floor(id: ItemId, template_id: TemplateId, name: String, room_id: RoomId) -> Self {
        Self {
            id,
            template_id,
            name,
            keywords: Vec::new(),
            description: String::new(),
            room_id: Some(room_id),
            player_id: None,
            container_id: None,
            quantity: 1,
            current_durability: None,
            equipped_slot: None,
            instance_data: HashMap::new(),
            dropped_at: None,
        }
    }

    /// New instance in a player's inventory.
    pub fn in_inventory(
        id: ItemId,
        template_id: TemplateId,
        name: String,
        player_id: PlayerId,
    ) -> Self {
        Self {
            id,
            template_id,
            name,
            keywords: Vec::new(),
            description: String::new(),
            room_id: None,
            player_id: Some(player_id),
            container_id: None,
            quantity: 1,
            current_durability: None,
            equipped_slot: None,
            instance_data: HashMap::new(),
            dropped_at: None,
        }
    }

    pub fn location(&self) -> ItemLocation {
        match (&self.room_id, &self.player_id, &self.container_id) {
            (Some(r), None, None) => ItemLocation::Room(r.clone()),
            (None, Some(p), None) => ItemLocation::Inventory(p.clone()),
            (None, None, Some(c)) => ItemLocation::Container(c.clone()),
            _ => ItemLocation::Inconsistent,
        }
    }

    /// Move to a room floor, clearing the other location fields.
    pub fn place_in_room(&mut self, room_id: RoomId, now: DateTime<Utc>) {
        self.room_id = Some(room_id);
        self.player_id = None;
        self.container_id = None;
        self.equipped_slot = None;
        self.dropped_at = Some(now);
    }

    /// Move into a player's inventory, clearing the other location fields.
    pub fn place_in_inventory(&mut self, player_id: PlayerId) {
        self.room_id = None;
        self.player_id = Some(player_id);
        self.container_id = None;
        self.dropped_at = None;
    }

    /// Move into a container, clearing the other location fields.
    pub fn place_in_container(&mut self, container_id: ItemId) {
        self.room_id = None;
        self.player_id = None;
        self.container_id = Some(container_id);
        self.equipped_slot = None;
        self.dropped_at = None;
    }

    pub fn is_equipped(&self) -> bool {
        self.equipped_slot.is_some()
    }

    pub fn matches_keyword(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        if term.is_empty() {
            return false;
        }
        let name = self.name.to_lowercase();
        if name == term || name.contains(&term) {
            return true;
        }
        self.keywords.iter().any(|k| {
            let k = k.to_lowercase();
            k == term || k.contains(&term)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_is_exclusive() {
        let mut item = Item::on_floor("i1".into(), "sword".into(), "iron sword".into(), "r1".into());
        assert_eq!(item.location(), ItemLocation::Room("r1".into()));

        item.place_in_inventory("p1".into());
        assert_eq!(item.location(), ItemLocation::Inventory("p1".into()));
        assert!(item.room_id.is_none());

        item.place_in_container("bag".into());
        assert_eq!(item.location(), ItemLocation::Container("bag".into()));
        assert!(item.player_id.is_none());

        item.place_in_room("r2".into(), Utc::now());
        assert_eq!(item.location(), ItemLocation::Room("r2".into()));
        assert!(item.dropped_at.is_some());
    }
}
