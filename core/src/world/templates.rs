//! Content templates
//!
//! Templates describe NPCs, items, and quests; instances are stamped from
//! them at spawn time. The core consumes already-parsed template structs —
//! content loaders live in the host. All templates are serde types so hosts
//! can load them from TOML documents.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use emberwake_types::{RoomId, TemplateId};

use super::combat_state::WeaponStats;
use super::effect::EffectType;
use super::entity::Stat;
use crate::behaviors::{self, BehaviorConfig};

// ─────────────────────────────────────────────────────────────────────────────
// NPC Templates
// ─────────────────────────────────────────────────────────────────────────────

/// Disposition of an NPC toward players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NpcType {
    Hostile,
    #[default]
    Neutral,
    Friendly,
    Merchant,
}

impl NpcType {
    pub fn label(self) -> &'static str {
        match self {
            NpcType::Hostile => "hostile",
            NpcType::Neutral => "neutral",
            NpcType::Friendly => "friendly",
            NpcType::Merchant => "merchant",
        }
    }
}

/// One entry of a drop table, rolled independently on death.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropEntry {
    pub template_id: TemplateId,
    /// Probability in [0, 1].
    pub chance: f64,
    #[serde(default)]
    pub quantity: DropQuantity,
}

/// Fixed count or inclusive range.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DropQuantity {
    Fixed(u32),
    Range(u32, u32),
}

impl Default for DropQuantity {
    fn default() -> Self {
        DropQuantity::Fixed(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcTemplate {
    pub id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub npc_type: NpcType,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default = "default_npc_health")]
    pub max_health: i32,
    #[serde(default = "default_stat")]
    pub armor_class: i32,
    #[serde(default = "default_stat")]
    pub strength: i32,
    #[serde(default = "default_stat")]
    pub dexterity: i32,
    #[serde(default = "default_stat")]
    pub intelligence: i32,
    #[serde(default = "default_stat")]
    pub vitality: i32,

    /// Natural attack used when the NPC has no weapon equipped.
    #[serde(default = "WeaponStats::unarmed")]
    pub weapon: WeaponStats,

    #[serde(default)]
    pub experience_reward: u64,
    #[serde(default)]
    pub drop_table: Vec<DropEntry>,

    /// Ordered behavior tags resolved against the registry at load time.
    #[serde(default)]
    pub behaviors: Vec<String>,
    /// Merged behavior config; computed from the tags, not deserialized.
    #[serde(skip)]
    pub resolved_behavior: BehaviorConfig,

    #[serde(default)]
    pub faction_id: Option<String>,
    /// Lines the idle behavior picks from.
    #[serde(default)]
    pub idle_messages: Vec<String>,
    #[serde(default)]
    pub dialogue: Option<DialogueTree>,
}

fn default_level() -> u32 {
    1
}

fn default_npc_health() -> i32 {
    50
}

fn default_stat() -> i32 {
    10
}

impl NpcTemplate {
    /// Compute the merged behavior config from the template's tags.
    /// Call after construction or deserialization.
    pub fn resolve_behaviors(&mut self) {
        self.resolved_behavior = behaviors::merged_config(&self.behaviors);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Item Templates
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerType {
    #[default]
    SlotBased,
    WeightBased,
}

/// Effect applied when a consumable is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumeEffect {
    pub name: String,
    pub effect_type: EffectType,
    #[serde(default)]
    pub duration_secs: f64,
    #[serde(default)]
    pub stat_modifiers: HashMap<Stat, i32>,
    /// HP per tick (or instant heal for `hot` with no interval).
    #[serde(default)]
    pub magnitude: i32,
    #[serde(default)]
    pub interval_secs: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ItemFlags {
    #[serde(default)]
    pub no_pickup: bool,
    #[serde(default)]
    pub no_drop: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemTemplate {
    pub id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub flavor_text: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default = "default_item_type")]
    pub item_type: String,
    #[serde(default)]
    pub item_subtype: Option<String>,
    #[serde(default = "default_rarity")]
    pub rarity: String,
    #[serde(default)]
    pub weight: f32,
    #[serde(default)]
    pub value: u32,
    #[serde(default = "default_stack")]
    pub max_stack_size: u32,

    /// Slot this item occupies when equipped ("weapon", "head", ...).
    #[serde(default)]
    pub equipment_slot: Option<String>,
    #[serde(default)]
    pub stat_modifiers: HashMap<Stat, i32>,
    /// Present for weapons; consulted by combat when equipped.
    #[serde(default)]
    pub weapon: Option<WeaponStats>,

    #[serde(default)]
    pub is_container: bool,
    #[serde(default)]
    pub container_capacity: Option<f32>,
    #[serde(default)]
    pub container_type: ContainerType,

    #[serde(default)]
    pub is_consumable: bool,
    #[serde(default)]
    pub consume_effect: Option<ConsumeEffect>,

    #[serde(default)]
    pub has_durability: bool,
    #[serde(default)]
    pub max_durability: i32,

    #[serde(default)]
    pub flags: ItemFlags,
}

fn default_item_type() -> String {
    "misc".to_string()
}

fn default_rarity() -> String {
    "common".to_string()
}

fn default_stack() -> u32 {
    1
}

// ─────────────────────────────────────────────────────────────────────────────
// Quests & Dialogue
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestObjective {
    /// Enter a specific room.
    Visit { room_id: RoomId },
    /// Acquire `count` items of a template.
    Collect { template_id: TemplateId, count: u32 },
    /// Kill `count` NPCs of a template.
    Kill { template_id: TemplateId, count: u32 },
}

impl QuestObjective {
    pub fn describe(&self) -> String {
        match self {
            QuestObjective::Visit { room_id } => format!("Travel to {room_id}"),
            QuestObjective::Collect { template_id, count } => {
                format!("Collect {count} x {template_id}")
            }
            QuestObjective::Kill { template_id, count } => {
                format!("Slay {count} x {template_id}")
            }
        }
    }

    /// Target count for completion.
    pub fn goal(&self) -> u32 {
        match self {
            QuestObjective::Visit { .. } => 1,
            QuestObjective::Collect { count, .. } | QuestObjective::Kill { count, .. } => *count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestTemplate {
    pub id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub objectives: Vec<QuestObjective>,
    #[serde(default)]
    pub xp_reward: u64,
}

/// One choice offered at a dialogue node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueOption {
    pub text: String,
    /// Node to continue to; `None` ends the conversation.
    #[serde(default)]
    pub next: Option<String>,
    /// Quest granted to the player when chosen.
    #[serde(default)]
    pub offer_quest: Option<TemplateId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueNode {
    pub text: String,
    #[serde(default)]
    pub options: Vec<DialogueOption>,
}

/// An NPC's conversation graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueTree {
    pub start: String,
    pub nodes: HashMap<String, DialogueNode>,
}
