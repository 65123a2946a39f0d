//! Persistence sidecar
//!
//! The engine never blocks gameplay on the database. Entity mutators mark
//! IDs dirty; a recurring flush event snapshots the dirty players into
//! plain rows and hands the batch to a background task writing through the
//! host-supplied store. Failures are logged and the entities re-marked so
//! the next flush retries. A final flush runs on shutdown.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use emberwake_types::{EntityId, ItemId, PlayerId, RoomId};

use crate::engine::{EngineMsg, WorldEngine};
use crate::systems::dispatcher::GameEvent;
use crate::systems::effects::{self, EffectSpec};
use crate::world::{EffectType, Stat, World};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("store failure: {0}")]
    Store(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Snapshot Rows
// ─────────────────────────────────────────────────────────────────────────────

/// Player row written on each flush.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRow {
    pub id: PlayerId,
    pub current_health: i32,
    pub current_energy: i32,
    pub level: u32,
    pub experience: u64,
    pub current_room_id: RoomId,
    pub player_flags: Vec<String>,
    /// Serialized quest progress map.
    pub quest_progress: String,
    pub completed_quests: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryRow {
    pub player_id: PlayerId,
    pub max_weight: f32,
    pub max_slots: u32,
    pub current_weight: f32,
    pub current_slots: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRow {
    pub id: ItemId,
    pub player_id: Option<PlayerId>,
    pub room_id: Option<RoomId>,
    pub container_id: Option<ItemId>,
    pub quantity: u32,
    pub current_durability: Option<i32>,
    pub equipped_slot: Option<String>,
    pub instance_data: HashMap<String, String>,
}

/// Active effect row, written so offline ticks can be recomputed against
/// `applied_at` on the way back in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectRow {
    pub player_id: PlayerId,
    pub name: String,
    pub effect_type: EffectType,
    pub stat_modifiers: HashMap<Stat, i32>,
    pub duration_secs: f64,
    pub applied_at: DateTime<Utc>,
    pub interval_secs: f64,
    pub magnitude: i32,
}

/// One flush worth of writes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotBatch {
    pub players: Vec<PlayerRow>,
    pub inventories: Vec<InventoryRow>,
    pub items: Vec<ItemRow>,
    pub effects: Vec<EffectRow>,
}

impl SnapshotBatch {
    pub fn is_empty(&self) -> bool {
        self.players.is_empty() && self.items.is_empty()
    }
}

/// The store the sidecar writes through. Supplied by the host; the core
/// never opens database sessions itself.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn write_snapshot(&self, batch: SnapshotBatch) -> Result<(), PersistError>;

    /// Saved effects for a player, for rehydration after a restart.
    async fn load_player_effects(&self, player_id: &str) -> Result<Vec<EffectRow>, PersistError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Dirty Tracking
// ─────────────────────────────────────────────────────────────────────────────

/// Set of entities with unflushed changes.
#[derive(Debug, Default)]
pub struct DirtyTracker {
    dirty: HashSet<EntityId>,
}

impl DirtyTracker {
    pub fn mark(&mut self, entity_id: &str) {
        self.dirty.insert(entity_id.to_string());
    }

    /// Drain the set for a flush. Failed flushes re-mark their IDs.
    pub fn take(&mut self) -> HashSet<EntityId> {
        std::mem::take(&mut self.dirty)
    }

    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.dirty.contains(entity_id)
    }

    pub fn len(&self) -> usize {
        self.dirty.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Snapshotting & Flushing
// ─────────────────────────────────────────────────────────────────────────────

/// Build the rows for the dirty players. NPC IDs in the set are skipped;
/// NPC state is template-derived and respawns from scratch.
pub fn snapshot_for(world: &World, ids: &HashSet<EntityId>) -> SnapshotBatch {
    let mut batch = SnapshotBatch::default();
    for id in ids {
        let Some(player) = world.players.get(id) else {
            continue;
        };
        let quest_progress = serde_json::to_string(&player.quest_progress).unwrap_or_default();
        batch.players.push(PlayerRow {
            id: id.clone(),
            current_health: player.base.current_health,
            current_energy: player.current_energy,
            level: player.level,
            experience: player.experience,
            current_room_id: player.base.room_id.clone(),
            player_flags: player.player_flags.iter().cloned().collect(),
            quest_progress,
            completed_quests: player.completed_quests.iter().cloned().collect(),
        });
        batch.inventories.push(InventoryRow {
            player_id: id.clone(),
            max_weight: player.inventory_meta.max_weight,
            max_slots: player.inventory_meta.max_slots,
            current_weight: player.inventory_meta.current_weight,
            current_slots: player.inventory_meta.current_slots,
        });
        for item_id in &player.inventory_items {
            let Some(item) = world.items.get(item_id) else {
                continue;
            };
            batch.items.push(ItemRow {
                id: item.id.clone(),
                player_id: item.player_id.clone(),
                room_id: item.room_id.clone(),
                container_id: item.container_id.clone(),
                quantity: item.quantity,
                current_durability: item.current_durability,
                equipped_slot: item.equipped_slot.clone(),
                instance_data: item.instance_data.clone(),
            });
        }
        for effect in player.base.active_effects.values() {
            batch.effects.push(EffectRow {
                player_id: id.clone(),
                name: effect.name.clone(),
                effect_type: effect.effect_type,
                stat_modifiers: effect.stat_modifiers.clone(),
                duration_secs: effect.duration_secs,
                applied_at: effect.applied_at,
                interval_secs: effect.interval_secs,
                magnitude: effect.magnitude,
            });
        }
    }
    batch
}

/// Schedule the recurring flush event.
pub fn schedule_periodic_flush(engine: &mut WorldEngine) {
    let interval = Duration::from_secs(engine.config.persist_interval_secs.max(1));
    engine.timers.schedule_recurring(
        interval,
        interval,
        Some("persistence_flush"),
        Box::new(|engine| {
            flush(engine);
            Vec::new()
        }),
    );
}

/// Drain the dirty set and hand a snapshot to a background write. On
/// failure the IDs come back dirty through the control channel.
pub fn flush(engine: &mut WorldEngine) {
    let Some(store) = engine.store.clone() else {
        return;
    };
    if engine.dirty.is_empty() {
        return;
    }
    let ids = engine.dirty.take();
    let batch = snapshot_for(&engine.world, &ids);
    if batch.is_empty() {
        return;
    }
    tracing::debug!(players = batch.players.len(), items = batch.items.len(), "persistence flush");

    let failure_tx = engine.handle().sender();
    let failed_ids: Vec<EntityId> = ids.into_iter().collect();
    tokio::spawn(async move {
        if let Err(error) = store.write_snapshot(batch).await {
            tracing::warn!(%error, "persistence write failed");
            let _ = failure_tx.send(EngineMsg::PersistFailed(failed_ids)).await;
        }
    });
}

/// Flush everything dirty and wait for the write; used on engine stop.
pub async fn flush_on_shutdown(engine: &mut WorldEngine) {
    let Some(store) = engine.store.clone() else {
        return;
    };
    let ids = engine.dirty.take();
    if ids.is_empty() {
        return;
    }
    let batch = snapshot_for(&engine.world, &ids);
    if batch.is_empty() {
        return;
    }
    if let Err(error) = store.write_snapshot(batch).await {
        tracing::error!(%error, "final persistence flush failed");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Offline Effect Rehydration
// ─────────────────────────────────────────────────────────────────────────────

/// Re-apply saved effects to a player, catching up periodic ticks that
/// elapsed while the effect was out of memory. Expired effects are
/// dropped; surviving ones are rescheduled with their remaining duration.
pub fn rehydrate_effects(
    engine: &mut WorldEngine,
    player_id: &PlayerId,
    rows: Vec<EffectRow>,
) -> Vec<GameEvent> {
    let now = Utc::now();
    let mut events = Vec::new();

    for row in rows {
        let elapsed = (now - row.applied_at).num_milliseconds() as f64 / 1000.0;
        if row.duration_secs > 0.0 && elapsed >= row.duration_secs {
            continue;
        }
        let remaining = if row.duration_secs > 0.0 {
            row.duration_secs - elapsed
        } else {
            0.0
        };

        // Catch up the ticks that fired while the player was away. The
        // same floor-of-1 clamp applies, so a DoT cannot kill offline.
        if row.magnitude != 0 && row.interval_secs > 0.0 {
            let missed = (elapsed / row.interval_secs).floor() as i32;
            if missed > 0
                && let Some(player) = engine.world.players.get_mut(player_id)
            {
                let total = row.magnitude.saturating_mul(missed);
                let base = &mut player.base;
                base.current_health = (base.current_health - total).clamp(1, base.max_health);
            }
        }

        let mut spec = EffectSpec::new(row.name.clone(), row.effect_type)
            .duration(remaining)
            .periodic(row.magnitude, row.interval_secs);
        spec.stat_modifiers = row.stat_modifiers.clone();
        effects::apply_effect(engine, player_id, spec);
    }

    if let Some(player) = engine.world.players.get(player_id) {
        events.push(GameEvent::stat_update(player));
    }
    events
}

#[cfg(test)]
mod persistence_tests;
