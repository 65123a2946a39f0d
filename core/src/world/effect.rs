//! Active effect instances (runtime state)
//!
//! An `Effect` is a temporary modifier (buff/debuff/DoT/HoT) living on a
//! specific entity. It is created by the effect system, which also owns the
//! scheduled expiration and periodic-tick events whose IDs are recorded here
//! so removal can cancel them.

use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use emberwake_types::EventId;

use super::entity::Stat;

/// Effect category, which drives messaging and default behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    Buff,
    Debuff,
    /// Damage over time: positive `magnitude` harms each tick.
    Dot,
    /// Heal over time: negative `magnitude` heals each tick.
    Hot,
}

impl EffectType {
    pub fn label(self) -> &'static str {
        match self {
            EffectType::Buff => "buff",
            EffectType::Debuff => "debuff",
            EffectType::Dot => "dot",
            EffectType::Hot => "hot",
        }
    }
}

/// A live effect on an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Effect {
    pub effect_id: String,
    pub name: String,
    pub effect_type: EffectType,

    /// Stat deltas applied while the effect is active. Base stats are never
    /// mutated; readers sum these through `get_effective_stat`.
    #[serde(default)]
    pub stat_modifiers: HashMap<Stat, i32>,

    /// Total duration in seconds. Zero means "until removed".
    #[serde(default)]
    pub duration_secs: f64,
    /// Wall-clock application time; remaining duration derives from this.
    pub applied_at: DateTime<Utc>,

    /// Seconds between periodic ticks. Zero means not periodic.
    #[serde(default)]
    pub interval_secs: f64,
    /// HP change per tick: positive harms, negative heals.
    #[serde(default)]
    pub magnitude: i32,

    /// Scheduled event that removes this effect, if `duration_secs > 0`.
    #[serde(default)]
    pub expiration_event_id: Option<EventId>,
    /// Recurring event driving periodic ticks, if periodic.
    #[serde(default)]
    pub periodic_event_id: Option<EventId>,
}

impl Effect {
    /// Seconds left before expiry, derived from the wall clock.
    /// Non-expiring effects report their (zero) duration.
    pub fn remaining_duration(&self, now: DateTime<Utc>) -> f64 {
        if self.duration_secs <= 0.0 {
            return self.duration_secs;
        }
        let elapsed = (now - self.applied_at).num_milliseconds() as f64 / 1000.0;
        (self.duration_secs - elapsed).max(0.0)
    }

    /// Whether this effect runs periodic ticks.
    pub fn is_periodic(&self) -> bool {
        self.magnitude != 0 && self.interval_secs > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_duration_counts_down() {
        let applied = Utc::now();
        let effect = Effect {
            effect_id: "e1".into(),
            name: "Poisoned".into(),
            effect_type: EffectType::Dot,
            stat_modifiers: HashMap::new(),
            duration_secs: 15.0,
            applied_at: applied,
            interval_secs: 3.0,
            magnitude: 5,
            expiration_event_id: None,
            periodic_event_id: None,
        };

        let later = applied + chrono::Duration::seconds(6);
        assert!((effect.remaining_duration(later) - 9.0).abs() < 0.01);

        let long_after = applied + chrono::Duration::seconds(60);
        assert_eq!(effect.remaining_duration(long_after), 0.0);
    }
}
