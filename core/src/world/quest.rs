//! Quest and dialogue runtime state carried on players

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use emberwake_types::NpcId;

/// Lifecycle of one quest for one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    Active,
    /// All objectives met; reward paid.
    Completed,
}

/// Per-player progress on a quest, serialized as-is into persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestProgress {
    pub status: QuestStatus,
    /// Counter per objective, index-aligned with the template objectives.
    pub objective_progress: Vec<u32>,
    pub accepted_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl QuestProgress {
    pub fn new(objective_count: usize) -> Self {
        Self {
            status: QuestStatus::Active,
            objective_progress: vec![0; objective_count],
            accepted_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// A player's position inside an NPC conversation. While set, raw command
/// input routes to the dialogue subsystem instead of the command router.
#[derive(Debug, Clone)]
pub struct DialogueState {
    pub npc_id: NpcId,
    pub node_id: String,
}
