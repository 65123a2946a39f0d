//! Randomness seam
//!
//! Combat rolls, drop tables, flee checks, and behavior jitter all flow
//! through the `Dice` trait so scenarios can run deterministically under
//! test with a scripted sequence.

use rand::Rng;

pub trait Dice: Send {
    /// Roll a twenty-sided die: uniform in [1, 20].
    fn d20(&mut self) -> i32;
    /// Uniform integer in [min, max] inclusive.
    fn roll_range(&mut self, min: i32, max: i32) -> i32;
    /// True with the given probability.
    fn chance(&mut self, probability: f64) -> bool;
    /// Uniform index in [0, len). `len` must be non-zero.
    fn pick_index(&mut self, len: usize) -> usize;
    /// Uniform float in [min, max].
    fn uniform(&mut self, min: f32, max: f32) -> f32;
}

/// Production dice backed by the thread-local RNG.
#[derive(Debug, Default)]
pub struct ThreadDice;

impl Dice for ThreadDice {
    fn d20(&mut self) -> i32 {
        rand::rng().random_range(1..=20)
    }

    fn roll_range(&mut self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        rand::rng().random_range(min..=max)
    }

    fn chance(&mut self, probability: f64) -> bool {
        rand::rng().random_bool(probability.clamp(0.0, 1.0))
    }

    fn pick_index(&mut self, len: usize) -> usize {
        rand::rng().random_range(0..len)
    }

    fn uniform(&mut self, min: f32, max: f32) -> f32 {
        if min >= max {
            return min;
        }
        rand::rng().random_range(min..=max)
    }
}

/// Deterministic dice for tests: integer rolls pop from a script (falling
/// back to the minimum), chances pop from a bool script (falling back to
/// false), and picks/uniforms take the first option.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ScriptedDice {
    pub rolls: std::collections::VecDeque<i32>,
    pub chances: std::collections::VecDeque<bool>,
}

#[cfg(test)]
impl ScriptedDice {
    pub fn with_rolls(rolls: &[i32]) -> Self {
        Self {
            rolls: rolls.iter().copied().collect(),
            chances: std::collections::VecDeque::new(),
        }
    }

    pub fn with_chances(&mut self, chances: &[bool]) -> &mut Self {
        self.chances = chances.iter().copied().collect();
        self
    }
}

#[cfg(test)]
impl Dice for ScriptedDice {
    fn d20(&mut self) -> i32 {
        self.rolls.pop_front().unwrap_or(1)
    }

    fn roll_range(&mut self, min: i32, _max: i32) -> i32 {
        self.rolls.pop_front().unwrap_or(min)
    }

    fn chance(&mut self, probability: f64) -> bool {
        // Unscripted chances honor certainties and refuse everything else.
        self.chances.pop_front().unwrap_or(probability >= 1.0)
    }

    fn pick_index(&mut self, _len: usize) -> usize {
        0
    }

    fn uniform(&mut self, min: f32, _max: f32) -> f32 {
        min
    }
}
