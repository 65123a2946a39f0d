//! Shared vocabulary types for Emberwake
//!
//! This crate contains the identifier aliases and small world-vocabulary
//! types shared between the engine core and its hosts. Identifiers are
//! opaque strings; entity IDs are globally unique across players, NPCs,
//! and items.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Identifier Aliases
// ─────────────────────────────────────────────────────────────────────────────

pub type PlayerId = String;
pub type NpcId = String;
/// Unified ID space covering players and NPCs.
pub type EntityId = String;
pub type ItemId = String;
pub type RoomId = String;
pub type AreaId = String;
pub type TemplateId = String;
/// Stable handle for a scheduled time event.
pub type EventId = String;

// ─────────────────────────────────────────────────────────────────────────────
// Direction
// ─────────────────────────────────────────────────────────────────────────────

/// The six cardinal movement directions of the world graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    South,
    East,
    West,
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
        Direction::Up,
        Direction::Down,
    ];

    /// The direction leading back the way you came.
    pub const fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    /// One-letter command alias.
    pub const fn short(self) -> &'static str {
        match self {
            Direction::North => "n",
            Direction::South => "s",
            Direction::East => "e",
            Direction::West => "w",
            Direction::Up => "u",
            Direction::Down => "d",
        }
    }

    /// How an arrival reads to observers in the destination room when an
    /// entity moves in this direction. Vertical movement uses
    /// "from above/below" instead of a compass phrase.
    pub fn arrival_phrase(self) -> &'static str {
        match self.opposite() {
            Direction::North => "from the north",
            Direction::South => "from the south",
            Direction::East => "from the east",
            Direction::West => "from the west",
            Direction::Up => "from above",
            Direction::Down => "from below",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse failure for a direction token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDirectionError(pub String);

impl fmt::Display for ParseDirectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a direction: {}", self.0)
    }
}

impl std::error::Error for ParseDirectionError {}

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "north" | "n" => Ok(Direction::North),
            "south" | "s" => Ok(Direction::South),
            "east" | "e" => Ok(Direction::East),
            "west" | "w" => Ok(Direction::West),
            "up" | "u" => Ok(Direction::Up),
            "down" | "d" => Ok(Direction::Down),
            other => Err(ParseDirectionError(other.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Room Type Emoji
// ─────────────────────────────────────────────────────────────────────────────

static ROOM_TYPE_EMOJIS: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "forest" => "🌲",
    "urban" => "🏙️",
    "rural" => "🏘️",
    "underground" => "🕳️",
    "underwater" => "🌊",
    "lake" => "🏞️",
    "ocean" => "🌊",
    "river" => "🏞️",
    "marsh" => "🌾",
    "grassland" => "🌾",
    "desert" => "🏜️",
    "sky" => "☁️",
    "ethereal" => "✨",
    "forsaken" => "💀",
};

/// Emoji marker for a room type, with a fallback for unknown types.
pub fn room_type_emoji(room_type: &str) -> &'static str {
    ROOM_TYPE_EMOJIS.get(room_type).copied().unwrap_or("❓")
}

// ─────────────────────────────────────────────────────────────────────────────
// Formatting Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Prefix a common noun with an indefinite article ("a goblin", "an ogre").
/// Proper nouns (capitalized) are returned unchanged.
pub fn with_article(name: &str) -> String {
    let Some(first) = name.chars().next() else {
        return String::new();
    };
    if first.is_uppercase() {
        return name.to_string();
    }
    let article = match first.to_ascii_lowercase() {
        'a' | 'e' | 'i' | 'o' | 'u' => "an",
        _ => "a",
    };
    format!("{article} {name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_round_trip() {
        for dir in Direction::ALL {
            assert_eq!(dir.as_str().parse::<Direction>().unwrap(), dir);
            assert_eq!(dir.short().parse::<Direction>().unwrap(), dir);
            assert_eq!(dir.opposite().opposite(), dir);
        }
    }

    #[test]
    fn arrival_phrases() {
        assert_eq!(Direction::North.arrival_phrase(), "from the south");
        assert_eq!(Direction::Up.arrival_phrase(), "from below");
        assert_eq!(Direction::Down.arrival_phrase(), "from above");
    }

    #[test]
    fn articles() {
        assert_eq!(with_article("goblin"), "a goblin");
        assert_eq!(with_article("ogre"), "an ogre");
        assert_eq!(with_article("Marn"), "Marn");
    }

    #[test]
    fn unknown_room_type_gets_fallback() {
        assert_eq!(room_type_emoji("forest"), "🌲");
        assert_eq!(room_type_emoji("bogus"), "❓");
    }
}
