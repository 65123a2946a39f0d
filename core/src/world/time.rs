//! In-game clocks
//!
//! 24 game hours pass in 12 real minutes, so one game hour is 30 real
//! seconds. Every area carries its own clock; `time_scale` multiplies the
//! rate for that area.

use serde::{Deserialize, Serialize};

/// Real seconds per game hour at scale 1.0.
pub const REAL_SECONDS_PER_GAME_HOUR: f64 = 30.0;

pub fn real_seconds_to_game_minutes(real_seconds: f64) -> f64 {
    real_seconds / REAL_SECONDS_PER_GAME_HOUR * 60.0
}

pub fn game_hours_to_real_seconds(game_hours: f64) -> f64 {
    game_hours * REAL_SECONDS_PER_GAME_HOUR
}

/// Named band of the day cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePhase {
    Dawn,
    Morning,
    Afternoon,
    Dusk,
    Evening,
    Night,
}

impl TimePhase {
    pub fn label(self) -> &'static str {
        match self {
            TimePhase::Dawn => "dawn",
            TimePhase::Morning => "morning",
            TimePhase::Afternoon => "afternoon",
            TimePhase::Dusk => "dusk",
            TimePhase::Evening => "evening",
            TimePhase::Night => "night",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            TimePhase::Dawn => "🌅",
            TimePhase::Morning => "🌄",
            TimePhase::Afternoon => "☀️",
            TimePhase::Dusk => "🌆",
            TimePhase::Evening => "🌃",
            TimePhase::Night => "🌙",
        }
    }

    /// Default flavor line for the phase, used when an area supplies none.
    pub fn default_flavor(self) -> &'static str {
        match self {
            TimePhase::Dawn => {
                "The sun rises in the east, painting the sky in hues of orange and pink."
            }
            TimePhase::Morning => "The morning sun shines brightly overhead.",
            TimePhase::Afternoon => "The sun reaches its peak, warming the land below.",
            TimePhase::Dusk => "The sun sets in the west, casting long shadows across the world.",
            TimePhase::Evening => {
                "Twilight descends, and the first stars appear in the darkening sky."
            }
            TimePhase::Night => {
                "The moon hangs in the starry night sky, casting silver light upon the world."
            }
        }
    }
}

/// A day/hour/minute clock advanced by the engine's recurring time event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldTime {
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

impl Default for WorldTime {
    fn default() -> Self {
        // Worlds wake at dawn
        Self {
            day: 1,
            hour: 6,
            minute: 0,
        }
    }
}

impl WorldTime {
    /// Advance by elapsed real seconds at the given scale.
    pub fn advance(&mut self, real_seconds: f64, time_scale: f64) {
        let minutes = real_seconds_to_game_minutes(real_seconds) * time_scale;
        self.minute += minutes as u32;
        if self.minute >= 60 {
            self.hour += self.minute / 60;
            self.minute %= 60;
        }
        if self.hour >= 24 {
            self.day += self.hour / 24;
            self.hour %= 24;
        }
    }

    pub fn phase(&self) -> TimePhase {
        match self.hour {
            5..=6 => TimePhase::Dawn,
            7..=11 => TimePhase::Morning,
            12..=16 => TimePhase::Afternoon,
            17..=18 => TimePhase::Dusk,
            19..=21 => TimePhase::Evening,
            _ => TimePhase::Night,
        }
    }

    pub fn format_time(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }

    pub fn format_full(&self) -> String {
        let phase = self.phase();
        format!(
            "{} Day {}, {:02}:{:02} ({})",
            phase.emoji(),
            self.day,
            self.hour,
            self.minute,
            phase.label()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_rolls_over() {
        let mut t = WorldTime {
            day: 1,
            hour: 23,
            minute: 30,
        };
        // One real minute at scale 1.0 = two game hours
        t.advance(60.0, 1.0);
        assert_eq!(t.day, 2);
        assert_eq!(t.hour, 1);
        assert_eq!(t.minute, 30);
    }

    #[test]
    fn scale_multiplies_passage() {
        let mut t = WorldTime::default();
        // 30 real seconds at 2x = two game hours
        t.advance(30.0, 2.0);
        assert_eq!(t.hour, 8);
    }

    #[test]
    fn phases_cover_the_day() {
        let phase_at = |hour| WorldTime { day: 1, hour, minute: 0 }.phase();
        assert_eq!(phase_at(5), TimePhase::Dawn);
        assert_eq!(phase_at(9), TimePhase::Morning);
        assert_eq!(phase_at(13), TimePhase::Afternoon);
        assert_eq!(phase_at(17), TimePhase::Dusk);
        assert_eq!(phase_at(20), TimePhase::Evening);
        assert_eq!(phase_at(23), TimePhase::Night);
        assert_eq!(phase_at(2), TimePhase::Night);
    }
}
