use crate::model::FluencyScore;

/// XP needed to advance one level.
pub const XP_PER_LEVEL: u32 = 100;

/// XP awarded for a single session with the given score.
#[must_use]
pub fn xp_for_score(score: FluencyScore) -> u32 {
    match score.value() {
        9.. => 15,
        7..=8 => 10,
        5..=6 => 7,
        _ => 3,
    }
}

/// Level reached with `total_xp`; starts at 1.
#[must_use]
pub fn level_for_xp(total_xp: u32) -> u32 {
    total_xp / XP_PER_LEVEL + 1
}

/// XP still missing before the next level.
#[must_use]
pub fn xp_to_next_level(total_xp: u32) -> u32 {
    let next_level_floor = u64::from(level_for_xp(total_xp)) * u64::from(XP_PER_LEVEL);
    u32::try_from(next_level_floor - u64::from(total_xp)).unwrap_or(XP_PER_LEVEL)
}
