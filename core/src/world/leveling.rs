//! Experience thresholds and level-up stat gains
//!
//! Both tables are fixed lookups. XP gain never lowers a level; each
//! threshold crossing applies its row exactly once and refills the current
//! pools to the new maxima.

use serde::Serialize;

use super::entity::EntityBase;

pub const MAX_LEVEL: u32 = 20;

/// Total experience required to REACH each level; index = level - 1.
/// Level 1 costs nothing.
const XP_THRESHOLDS: [u64; MAX_LEVEL as usize] = [
    0, 100, 250, 500, 900, 1_500, 2_300, 3_400, 4_800, 6_600, 8_800, 11_500, 14_800, 18_800,
    23_500, 29_000, 35_400, 42_800, 51_300, 61_000,
];

/// Experience needed to reach `level`, or `None` past the cap.
pub fn xp_for_level(level: u32) -> Option<u64> {
    if level == 0 || level > MAX_LEVEL {
        return None;
    }
    Some(XP_THRESHOLDS[(level - 1) as usize])
}

/// Stat increases granted on reaching a level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatGains {
    pub max_health: i32,
    pub max_energy: i32,
    pub strength: i32,
    pub dexterity: i32,
    pub intelligence: i32,
    pub vitality: i32,
}

/// Gains applied when reaching `level`. Every even level adds a primary
/// stat point on a rotating schedule; health and energy grow every level.
pub fn stat_gains_for(level: u32) -> StatGains {
    let mut gains = StatGains {
        max_health: 10,
        max_energy: 5,
        ..StatGains::default()
    };
    if level.is_multiple_of(2) {
        match (level / 2) % 4 {
            0 => gains.vitality = 1,
            1 => gains.strength = 1,
            2 => gains.dexterity = 1,
            _ => gains.intelligence = 1,
        }
    }
    // Milestone levels grant a little extra
    if level.is_multiple_of(5) {
        gains.max_health += 10;
        gains.max_energy += 5;
    }
    gains
}

/// One level advancement with the gains it applied.
#[derive(Debug, Clone)]
pub struct LevelUp {
    pub new_level: u32,
    pub gains: StatGains,
}

/// Advance `level` while `experience` clears the next threshold, applying
/// each row to the base stats and returning the advancements in order.
/// Pools are refilled to the new maxima on any advancement.
pub fn check_level_up(
    level: &mut u32,
    experience: u64,
    base: &mut EntityBase,
    max_energy: &mut i32,
    current_energy: &mut i32,
) -> Vec<LevelUp> {
    let mut ups = Vec::new();
    while *level < MAX_LEVEL {
        let Some(needed) = xp_for_level(*level + 1) else {
            break;
        };
        if experience < needed {
            break;
        }
        *level += 1;
        let gains = stat_gains_for(*level);
        base.max_health += gains.max_health;
        *max_energy += gains.max_energy;
        base.strength += gains.strength;
        base.dexterity += gains.dexterity;
        base.intelligence += gains.intelligence;
        base.vitality += gains.vitality;
        ups.push(LevelUp {
            new_level: *level,
            gains,
        });
    }
    if !ups.is_empty() {
        base.current_health = base.max_health;
        *current_energy = *max_energy;
    }
    ups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_monotonic() {
        for level in 2..=MAX_LEVEL {
            assert!(xp_for_level(level).unwrap() > xp_for_level(level - 1).unwrap());
        }
        assert_eq!(xp_for_level(0), None);
        assert_eq!(xp_for_level(MAX_LEVEL + 1), None);
    }

    #[test]
    fn single_threshold_crossing() {
        let mut base = EntityBase::new("p".into(), "Marn".into(), "r".into());
        base.current_health = 40;
        let mut level = 1;
        let mut max_energy = 50;
        let mut current_energy = 10;

        let ups = check_level_up(&mut level, 150, &mut base, &mut max_energy, &mut current_energy);
        assert_eq!(ups.len(), 1);
        assert_eq!(level, 2);
        assert_eq!(base.max_health, 110);
        // Pools refilled
        assert_eq!(base.current_health, 110);
        assert_eq!(current_energy, max_energy);
    }

    #[test]
    fn multiple_threshold_crossings_apply_each_row_once() {
        let mut base = EntityBase::new("p".into(), "Marn".into(), "r".into());
        let mut level = 1;
        let mut max_energy = 50;
        let mut current_energy = 50;

        // Enough XP for levels 2, 3 and 4
        let ups = check_level_up(&mut level, 500, &mut base, &mut max_energy, &mut current_energy);
        assert_eq!(ups.len(), 3);
        assert_eq!(level, 4);
        assert_eq!(
            ups.iter().map(|u| u.new_level).collect::<Vec<_>>(),
            vec![2, 3, 4]
        );
        assert_eq!(base.max_health, 130);
    }

    #[test]
    fn insufficient_xp_never_levels() {
        let mut base = EntityBase::new("p".into(), "Marn".into(), "r".into());
        let mut level = 3;
        let mut max_energy = 50;
        let mut current_energy = 50;

        let ups = check_level_up(&mut level, 300, &mut base, &mut max_energy, &mut current_energy);
        assert!(ups.is_empty());
        assert_eq!(level, 3);
    }
}
