// XP / level curve: xp_needed(level) = base * level^2

use serde::{Deserialize, Serialize};
use spacetimedb::Timestamp;

use crate::tables::Stat;

/// Quadratic leveling curve with a hard level cap
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct LevelCurve {
    pub base: u32,
    pub max_level: u32,
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self { base: 20, max_level: 10 }
    }
}

/// Result of pushing XP through the curve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelProgress {
    pub level: u32,
    pub xp: u32,
    pub levels_gained: u32,
}

impl LevelCurve {
    /// XP needed to advance from `level` to `level + 1`
    pub fn xp_needed(&self, level: u32) -> u64 {
        let n = level.max(1) as u64;
        self.base as u64 * n * n
    }

    /// Apply a gain to a (level, xp) pair.
    ///
    /// Level-ups cascade one at a time so a large grant can cross several
    /// thresholds. XP earned at the cap is dropped.
    pub fn advance(&self, level: u32, xp: u32, gain: i64) -> LevelProgress {
        if gain <= 0 {
            return LevelProgress { level, xp, levels_gained: 0 };
        }

        let mut level = level.max(1);
        let mut xp = xp as u64 + gain as u64;
        let mut levels_gained = 0;

        while level < self.max_level {
            let need = self.xp_needed(level);
            if xp < need {
                break;
            }
            xp -= need;
            level += 1;
            levels_gained += 1;
        }

        if level >= self.max_level {
            level = self.max_level;
            xp = 0;
        }

        LevelProgress {
            level,
            // below xp_needed(level), which fits u32 for any sane base/cap
            xp: xp.min(u32::MAX as u64) as u32,
            levels_gained,
        }
    }

    /// Apply a gain to a stat row in place, returns levels gained
    pub fn apply_xp(&self, stat: &mut Stat, gain: i64, now: Timestamp) -> u32 {
        if gain <= 0 {
            return 0;
        }
        let progress = self.advance(stat.level, stat.xp, gain);
        stat.level = progress.level;
        stat.xp = progress.xp;
        stat.updated_at = now;
        progress.levels_gained
    }

    /// Replay cumulative XP from level 1 (reference path for the stored pair)
    pub fn replay(&self, total_xp: u64) -> LevelProgress {
        self.advance(1, 0, total_xp.min(i64::MAX as u64) as i64)
    }
}
