//! Areas: geographical groupings of rooms
//!
//! An area provides environmental context and carries its own clock,
//! advanced independently at `time_scale`. Entry points double as player
//! respawn locations.

use hashbrown::{HashMap, HashSet};

use emberwake_types::{AreaId, RoomId};

use super::time::{TimePhase, WorldTime};
use crate::systems::triggers::Trigger;

#[derive(Debug, Clone)]
pub struct Area {
    pub id: AreaId,
    pub name: String,
    pub biome: String,
    pub climate: String,
    pub ambient_lighting: String,
    pub description: String,
    pub ambient_sound: String,

    /// This area's independent clock.
    pub area_time: WorldTime,
    /// Multiplier on time passage relative to real seconds.
    pub time_scale: f64,
    /// Per-phase flavor text overriding the defaults.
    pub time_phases: HashMap<TimePhase, String>,

    /// Rooms nominated as spawn/respawn locations.
    pub entry_points: HashSet<RoomId>,
    pub room_ids: HashSet<RoomId>,

    /// Default NPC respawn delay in seconds; negative means never.
    pub default_respawn_time: i64,

    pub triggers: Vec<Trigger>,
}

impl Area {
    pub fn new(id: AreaId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            biome: "temperate".to_string(),
            climate: "temperate".to_string(),
            ambient_lighting: "natural".to_string(),
            description: String::new(),
            ambient_sound: String::new(),
            area_time: WorldTime::default(),
            time_scale: 1.0,
            time_phases: HashMap::new(),
            entry_points: HashSet::new(),
            room_ids: HashSet::new(),
            default_respawn_time: 300,
            triggers: Vec::new(),
        }
    }

    /// Flavor line for the area's current phase of day.
    pub fn phase_flavor(&self) -> &str {
        let phase = self.area_time.phase();
        self.time_phases
            .get(&phase)
            .map(String::as_str)
            .unwrap_or_else(|| phase.default_flavor())
    }
}
