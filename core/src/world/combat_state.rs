//! Per-entity combat state machine data
//!
//! Combat is a timed cycle `idle → windup → swing → recovery`, looping back
//! to windup while auto-attack stays on. The state here is pure data; the
//! combat system drives transitions through scheduled time events.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use emberwake_types::{EntityId, EventId};

/// Phase of the attack cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombatPhase {
    #[default]
    Idle,
    Windup,
    Swing,
    Recovery,
}

impl CombatPhase {
    pub fn label(self) -> &'static str {
        match self {
            CombatPhase::Idle => "idle",
            CombatPhase::Windup => "windup",
            CombatPhase::Swing => "swing",
            CombatPhase::Recovery => "recovery",
        }
    }
}

/// Stats of the weapon driving the current attack cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponStats {
    pub name: String,
    pub damage_min: i32,
    pub damage_max: i32,
    #[serde(default = "default_damage_type")]
    pub damage_type: String,
    /// Seconds from attack start to the swing phase.
    pub windup_time: f32,
    /// Seconds from swing start to damage application.
    pub swing_time: f32,
}

fn default_damage_type() -> String {
    "physical".to_string()
}

impl WeaponStats {
    /// Bare-handed fallback when nothing is equipped in the weapon slot.
    pub fn unarmed() -> Self {
        Self {
            name: "fists".to_string(),
            damage_min: 1,
            damage_max: 2,
            damage_type: "bludgeoning".to_string(),
            windup_time: 1.0,
            swing_time: 1.0,
        }
    }

    /// Full length of one attack cycle, excluding recovery.
    pub fn swing_speed(&self) -> f32 {
        self.windup_time + self.swing_time
    }
}

/// Live combat state for one entity.
#[derive(Debug, Clone)]
pub struct CombatState {
    pub phase: CombatPhase,
    pub target_id: Option<EntityId>,
    pub current_weapon: WeaponStats,
    pub phase_start: Instant,
    /// Expected length of the current phase in seconds.
    pub phase_duration: f32,
    /// The pending windup/swing event, cancelled on stop or flee.
    pub swing_event_id: Option<EventId>,
    pub auto_attack: bool,
    /// Accumulated threat per attacker; NPCs retaliate against the top entry.
    pub threat: HashMap<EntityId, f32>,
}

impl Default for CombatState {
    fn default() -> Self {
        Self {
            phase: CombatPhase::Idle,
            target_id: None,
            current_weapon: WeaponStats::unarmed(),
            phase_start: Instant::now(),
            phase_duration: 0.0,
            swing_event_id: None,
            auto_attack: false,
            threat: HashMap::new(),
        }
    }
}

impl CombatState {
    pub fn is_in_combat(&self) -> bool {
        self.phase != CombatPhase::Idle
    }

    /// Begin an attack cycle against `target_id` with the given weapon.
    pub fn engage(&mut self, target_id: EntityId, weapon: WeaponStats, now: Instant) {
        let windup = weapon.windup_time;
        self.target_id = Some(target_id);
        self.current_weapon = weapon;
        self.auto_attack = true;
        self.start_phase(CombatPhase::Windup, windup, now);
    }

    pub fn start_phase(&mut self, phase: CombatPhase, duration_secs: f32, now: Instant) {
        self.phase = phase;
        self.phase_start = now;
        self.phase_duration = duration_secs;
    }

    /// Drop out of combat entirely. Threat is forgotten; a fresh engagement
    /// rebuilds it.
    pub fn clear_combat(&mut self) {
        self.phase = CombatPhase::Idle;
        self.target_id = None;
        self.swing_event_id = None;
        self.auto_attack = false;
        self.phase_duration = 0.0;
        self.threat.clear();
    }

    /// Fraction of the current phase elapsed, clamped to [0, 1].
    pub fn phase_progress(&self, now: Instant) -> f32 {
        if self.phase_duration <= 0.0 {
            return 1.0;
        }
        let elapsed = now.duration_since(self.phase_start).as_secs_f32();
        (elapsed / self.phase_duration).clamp(0.0, 1.0)
    }

    /// Seconds left in the current phase, clamped to zero.
    pub fn phase_remaining(&self, now: Instant) -> f32 {
        let elapsed = now.duration_since(self.phase_start).as_secs_f32();
        (self.phase_duration - elapsed).max(0.0)
    }

    pub fn add_threat(&mut self, attacker: &str, amount: f32) {
        *self.threat.entry(attacker.to_string()).or_insert(0.0) += amount;
    }

    /// Entity with the highest accumulated threat, if any.
    pub fn highest_threat(&self) -> Option<&EntityId> {
        self.threat
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engage_enters_windup() {
        let mut combat = CombatState::default();
        assert!(!combat.is_in_combat());

        combat.engage("npc-1".to_string(), WeaponStats::unarmed(), Instant::now());
        assert_eq!(combat.phase, CombatPhase::Windup);
        assert!(combat.auto_attack);
        assert!(combat.is_in_combat());

        combat.clear_combat();
        assert_eq!(combat.phase, CombatPhase::Idle);
        assert!(combat.target_id.is_none());
    }

    #[test]
    fn threat_tracks_highest() {
        let mut combat = CombatState::default();
        combat.add_threat("a", 50.0);
        combat.add_threat("b", 100.0);
        combat.add_threat("a", 25.0);
        assert_eq!(combat.highest_threat(), Some(&"b".to_string()));
    }
}
