//! Rooms: the nodes of the world graph
//!
//! Rooms reference entities and items by ID but do not own them; the world
//! maps are authoritative. Trigger actions can overlay a dynamic description
//! or exit map on top of the authored one.

use hashbrown::{HashMap, HashSet};

use emberwake_types::{AreaId, Direction, EntityId, ItemId, RoomId};

use crate::systems::triggers::Trigger;

#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub description: String,
    pub room_type: String,
    pub area_id: Option<AreaId>,

    pub exits: HashMap<Direction, RoomId>,
    /// Players and NPCs currently in the room.
    pub entities: HashSet<EntityId>,
    /// Items on the floor.
    pub items: HashSet<ItemId>,

    /// Flavor line appended when a player enters, if set.
    pub on_enter_effect: Option<String>,
    /// Flavor line appended when a player leaves, if set.
    pub on_exit_effect: Option<String>,

    pub triggers: Vec<Trigger>,

    /// Trigger-installed overrides shadowing the authored content.
    pub dynamic_description_override: Option<String>,
    pub dynamic_exits_override: Option<HashMap<Direction, RoomId>>,
}

impl Room {
    pub fn new(id: RoomId, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            room_type: "ethereal".to_string(),
            area_id: None,
            exits: HashMap::new(),
            entities: HashSet::new(),
            items: HashSet::new(),
            on_enter_effect: None,
            on_exit_effect: None,
            triggers: Vec::new(),
            dynamic_description_override: None,
            dynamic_exits_override: None,
        }
    }

    /// Description as currently visible, honoring trigger overrides.
    pub fn effective_description(&self) -> &str {
        self.dynamic_description_override
            .as_deref()
            .unwrap_or(&self.description)
    }

    /// Exit map as currently usable, honoring trigger overrides.
    pub fn effective_exits(&self) -> &HashMap<Direction, RoomId> {
        self.dynamic_exits_override.as_ref().unwrap_or(&self.exits)
    }
}
