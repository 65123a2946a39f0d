//! Engine tuning configuration
//!
//! Loaded by hosts via `confy` from a TOML document; every field carries an
//! in-code default so tests and embedded uses can run with
//! `EngineConfig::default()`.

use serde::{Deserialize, Serialize};

/// Combat mechanics tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Base critical hit chance per swing.
    pub crit_chance: f64,
    /// Damage multiplier applied on a critical hit.
    pub crit_multiplier: f64,
    /// Seconds spent in recovery between auto-attack swings.
    pub recovery_time: f32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            crit_chance: 0.10,
            crit_multiplier: 1.5,
            recovery_time: 0.5,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub combat: CombatConfig,
    /// Seconds of respawn countdown after a player death.
    pub respawn_countdown_secs: u32,
    /// Interval between persistence sidecar flushes.
    pub persist_interval_secs: u64,
    /// Interval of the NPC housekeeping sweep (respawn checks).
    pub npc_housekeeping_interval_secs: u64,
    /// Interval of the world-clock advancement event. One tick advances
    /// every area's clock by one game hour at `time_scale` 1.0.
    pub world_time_tick_secs: u64,
    /// Depth of the bounded inbound control channel.
    pub command_queue_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            combat: CombatConfig::default(),
            respawn_countdown_secs: 10,
            persist_interval_secs: 60,
            npc_housekeeping_interval_secs: 30,
            world_time_tick_secs: 30,
            command_queue_depth: 256,
        }
    }
}
