//! Entities: the shared capability core plus player and NPC variants
//!
//! Players and NPCs share one capability set — health, stats, keyword
//! matching, active effects, combat state — carried by `EntityBase`. The
//! world stores them in separate maps under a single ID space and hands out
//! `EntityRef`/`EntityMut` views where code works generically.

use chrono::{DateTime, Utc};
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use emberwake_types::{EntityId, EventId, ItemId, PlayerId, RoomId, TemplateId};

use super::combat_state::{CombatState, WeaponStats};
use super::effect::Effect;
use super::quest::{DialogueState, QuestProgress};

/// Stats that effects and equipment can modify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    Strength,
    Dexterity,
    Intelligence,
    Vitality,
    ArmorClass,
}

impl Stat {
    pub fn label(self) -> &'static str {
        match self {
            Stat::Strength => "strength",
            Stat::Dexterity => "dexterity",
            Stat::Intelligence => "intelligence",
            Stat::Vitality => "vitality",
            Stat::ArmorClass => "armor_class",
        }
    }
}

/// The capability core shared by players and NPCs.
#[derive(Debug, Clone)]
pub struct EntityBase {
    pub id: EntityId,
    pub name: String,
    pub keywords: Vec<String>,
    pub room_id: RoomId,

    pub max_health: i32,
    pub current_health: i32,
    pub armor_class: i32,
    pub strength: i32,
    pub dexterity: i32,
    pub intelligence: i32,
    pub vitality: i32,

    /// Equipment by slot name; values are item template IDs.
    pub equipped_items: HashMap<String, TemplateId>,
    pub active_effects: HashMap<String, Effect>,
    pub combat: CombatState,
}

impl EntityBase {
    pub fn new(id: EntityId, name: String, room_id: RoomId) -> Self {
        Self {
            id,
            name,
            keywords: Vec::new(),
            room_id,
            max_health: 100,
            current_health: 100,
            armor_class: 10,
            strength: 10,
            dexterity: 10,
            intelligence: 10,
            vitality: 10,
            equipped_items: HashMap::new(),
            active_effects: HashMap::new(),
            combat: CombatState::default(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.current_health > 0
    }

    /// Case-insensitive match against the entity name (exact or substring)
    /// or any keyword.
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

    fn base_stat(&self, stat: Stat) -> i32 {
        match stat {
            Stat::Strength => self.strength,
            Stat::Dexterity => self.dexterity,
            Stat::Intelligence => self.intelligence,
            Stat::Vitality => self.vitality,
            Stat::ArmorClass => self.armor_class,
        }
    }

    /// Base stat plus the sum of all active-effect modifiers for it.
    /// Callers never mutate base stats to express effects.
    pub fn effective_stat(&self, stat: Stat) -> i32 {
        let mut total = self.base_stat(stat);
        for effect in self.active_effects.values() {
            if let Some(delta) = effect.stat_modifiers.get(&stat) {
                total += delta;
            }
        }
        total
    }

    pub fn effective_armor_class(&self) -> i32 {
        self.effective_stat(Stat::ArmorClass)
    }

    pub fn effective_strength(&self) -> i32 {
        self.effective_stat(Stat::Strength)
    }

    pub fn effective_dexterity(&self) -> i32 {
        self.effective_stat(Stat::Dexterity)
    }

    /// Attach an effect, stamping its application time. An effect with the
    /// same ID is replaced.
    pub fn apply_effect(&mut self, mut effect: Effect) {
        effect.applied_at = Utc::now();
        self.active_effects.insert(effect.effect_id.clone(), effect);
    }

    pub fn remove_effect(&mut self, effect_id: &str) -> Option<Effect> {
        self.active_effects.remove(effect_id)
    }

    /// Enter combat against `target_id` using `weapon`.
    pub fn start_attack(&mut self, target_id: EntityId, weapon: WeaponStats, now: Instant) {
        self.combat.engage(target_id, weapon, now);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Player
// ─────────────────────────────────────────────────────────────────────────────

/// Inventory capacity bookkeeping, persisted per player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryMeta {
    pub max_weight: f32,
    pub max_slots: u32,
    pub current_weight: f32,
    pub current_slots: u32,
}

impl Default for InventoryMeta {
    fn default() -> Self {
        Self {
            max_weight: 50.0,
            max_slots: 20,
            current_weight: 0.0,
            current_slots: 0,
        }
    }
}

/// A player character in the world. Exists whether or not the player is
/// connected; disconnected players stand in stasis.
#[derive(Debug, Clone)]
pub struct Player {
    pub base: EntityBase,

    pub is_connected: bool,
    pub character_class: String,
    pub level: u32,
    pub experience: u64,
    pub max_energy: i32,
    pub current_energy: i32,
    pub faction_id: Option<String>,

    pub inventory_items: HashSet<ItemId>,
    pub inventory_meta: InventoryMeta,

    /// Flavor line shown when the player moves, if set.
    pub on_move_effect: Option<String>,

    pub quest_progress: HashMap<String, QuestProgress>,
    pub completed_quests: HashSet<String>,
    pub player_flags: HashSet<String>,
    pub active_dialogue: Option<DialogueState>,

    pub death_time: Option<DateTime<Utc>>,
    pub respawn_event_id: Option<EventId>,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, room_id: RoomId) -> Self {
        Self {
            base: EntityBase::new(id, name.into(), room_id),
            is_connected: false,
            character_class: "adventurer".to_string(),
            level: 1,
            experience: 0,
            max_energy: 50,
            current_energy: 50,
            faction_id: None,
            inventory_items: HashSet::new(),
            inventory_meta: InventoryMeta::default(),
            on_move_effect: None,
            quest_progress: HashMap::new(),
            completed_quests: HashSet::new(),
            player_flags: HashSet::new(),
            active_dialogue: None,
            death_time: None,
            respawn_event_id: None,
        }
    }

    pub fn id(&self) -> &PlayerId {
        &self.base.id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// NPC
// ─────────────────────────────────────────────────────────────────────────────

/// Patrol traversal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatrolMode {
    #[default]
    Loop,
    Bounce,
    Once,
}

/// A waypoint route an NPC walks instead of wandering randomly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatrolState {
    pub route: Vec<RoomId>,
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub mode: PatrolMode,
    /// +1 or -1 while bouncing.
    #[serde(default = "default_patrol_dir")]
    pub heading: i32,
}

fn default_patrol_dir() -> i32 {
    1
}

impl PatrolState {
    /// Next waypoint per the patrol mode, or `None` when a one-shot route
    /// is exhausted. Does not advance the cursor; `advance` commits.
    pub fn next_waypoint(&self) -> Option<&RoomId> {
        let len = self.route.len();
        if len < 2 {
            return None;
        }
        let next = match self.mode {
            PatrolMode::Loop => (self.index + 1) % len,
            PatrolMode::Bounce => {
                let candidate = self.index as i32 + self.heading;
                if candidate >= len as i32 {
                    len.saturating_sub(2)
                } else if candidate < 0 {
                    1
                } else {
                    candidate as usize
                }
            }
            PatrolMode::Once => {
                let next = self.index + 1;
                if next >= len {
                    return None;
                }
                next
            }
        };
        self.route.get(next)
    }

    /// Commit the move to the next waypoint.
    pub fn advance(&mut self) {
        let len = self.route.len();
        if len < 2 {
            return;
        }
        match self.mode {
            PatrolMode::Loop => self.index = (self.index + 1) % len,
            PatrolMode::Bounce => {
                let candidate = self.index as i32 + self.heading;
                if candidate >= len as i32 {
                    self.heading = -1;
                    self.index = len.saturating_sub(2);
                } else if candidate < 0 {
                    self.heading = 1;
                    self.index = 1;
                } else {
                    self.index = candidate as usize;
                }
            }
            PatrolMode::Once => {
                if self.index + 1 < len {
                    self.index += 1;
                }
            }
        }
    }
}

/// Per-instance NPC data shadowing template fields when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NpcInstanceData {
    #[serde(default)]
    pub name_override: Option<String>,
    #[serde(default)]
    pub guard_message: Option<String>,
    #[serde(default)]
    pub patrol: Option<PatrolState>,
}

/// A spawned NPC. Template fields are shadowed by instance data when set.
#[derive(Debug, Clone)]
pub struct Npc {
    pub base: EntityBase,

    pub template_id: TemplateId,
    pub spawn_room_id: RoomId,
    /// Seconds until respawn after death; negative means never. `None`
    /// falls through to the area default.
    pub respawn_time_override: Option<i64>,
    pub last_killed_at: Option<DateTime<Utc>>,

    pub idle_event_id: Option<EventId>,
    pub wander_event_id: Option<EventId>,
    pub target_id: Option<EntityId>,

    pub instance_data: NpcInstanceData,
    /// Items handed to the NPC; NPCs have no capacity limits.
    pub inventory_items: HashSet<ItemId>,
}

impl Npc {
    pub fn display_name(&self) -> &str {
        self.instance_data
            .name_override
            .as_deref()
            .unwrap_or(&self.base.name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Generic Views
// ─────────────────────────────────────────────────────────────────────────────

/// Read view over either entity kind.
pub enum EntityRef<'a> {
    Player(&'a Player),
    Npc(&'a Npc),
}

impl<'a> EntityRef<'a> {
    pub fn base(&self) -> &'a EntityBase {
        match self {
            EntityRef::Player(p) => &p.base,
            EntityRef::Npc(n) => &n.base,
        }
    }

    pub fn is_player(&self) -> bool {
        matches!(self, EntityRef::Player(_))
    }

    /// Display name, honoring NPC instance overrides.
    pub fn name(&self) -> &'a str {
        match self {
            EntityRef::Player(p) => &p.base.name,
            EntityRef::Npc(n) => n.display_name(),
        }
    }
}

/// Write view over either entity kind.
pub enum EntityMut<'a> {
    Player(&'a mut Player),
    Npc(&'a mut Npc),
}

impl EntityMut<'_> {
    pub fn base_mut(&mut self) -> &mut EntityBase {
        match self {
            EntityMut::Player(p) => &mut p.base,
            EntityMut::Npc(n) => &mut n.base,
        }
    }

    pub fn base(&self) -> &EntityBase {
        match self {
            EntityMut::Player(p) => &p.base,
            EntityMut::Npc(n) => &n.base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::effect::EffectType;

    fn effect_with(stat: Stat, delta: i32) -> Effect {
        let mut mods = HashMap::new();
        mods.insert(stat, delta);
        Effect {
            effect_id: "fx".into(),
            name: "Test".into(),
            effect_type: EffectType::Buff,
            stat_modifiers: mods,
            duration_secs: 0.0,
            applied_at: Utc::now(),
            interval_secs: 0.0,
            magnitude: 0,
            expiration_event_id: None,
            periodic_event_id: None,
        }
    }

    #[test]
    fn effective_stats_sum_modifiers() {
        let mut base = EntityBase::new("p1".into(), "Marn".into(), "start".into());
        assert_eq!(base.effective_armor_class(), 10);

        base.apply_effect(effect_with(Stat::ArmorClass, 5));
        assert_eq!(base.effective_armor_class(), 15);
        // Base stat untouched
        assert_eq!(base.armor_class, 10);

        base.remove_effect("fx");
        assert_eq!(base.effective_armor_class(), 10);
    }

    #[test]
    fn keyword_matching() {
        let mut base = EntityBase::new("n1".into(), "cave goblin".into(), "r".into());
        base.keywords = vec!["goblin".into(), "cave".into()];
        assert!(base.matches_keyword("goblin"));
        assert!(base.matches_keyword("GOB"));
        assert!(base.matches_keyword("cave goblin"));
        assert!(!base.matches_keyword("dragon"));
        assert!(!base.matches_keyword(""));
    }

    #[test]
    fn patrol_bounce_turns_at_ends() {
        let mut patrol = PatrolState {
            route: vec!["a".into(), "b".into(), "c".into()],
            index: 0,
            mode: PatrolMode::Bounce,
            heading: 1,
        };
        assert_eq!(patrol.next_waypoint(), Some(&"b".to_string()));
        patrol.advance();
        patrol.advance();
        assert_eq!(patrol.index, 2);
        // At the far end the heading flips
        patrol.advance();
        assert_eq!(patrol.index, 1);
        assert_eq!(patrol.heading, -1);
    }

    #[test]
    fn patrol_once_exhausts() {
        let mut patrol = PatrolState {
            route: vec!["a".into(), "b".into()],
            index: 0,
            mode: PatrolMode::Once,
            heading: 1,
        };
        assert_eq!(patrol.next_waypoint(), Some(&"b".to_string()));
        patrol.advance();
        assert_eq!(patrol.next_waypoint(), None);
    }
}
