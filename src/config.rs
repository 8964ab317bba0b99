//! Engine configuration
//!
//! Catalog, hidden spots, category mapping and anti-abuse limits are
//! passed into the engine from here. Partial JSON documents override the
//! defaults field by field (`#[serde(default)]`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::curve::LevelCurve;
use crate::error::{EngineError, Result};
use crate::tables::{Difficulty, Geofence, MissionCategory, StatKind};

/// Upper bound for a single mission's base XP
pub const MAX_XP_REWARD: u32 = 10_000;

/// Upper bound for `curve.max_level`
pub const MAX_LEVEL_CAP: u32 = 1_000;

/// One template the daily picker can choose from
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub title: String,
    pub category: MissionCategory,
    pub difficulty: Difficulty,
    pub xp_reward: u32,
}

/// A location-gated mission template
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HiddenSpot {
    pub title: String,
    pub category: MissionCategory,
    pub difficulty: Difficulty,
    pub xp_reward: u32,
    pub geofence: Geofence,
}

/// Streak bonus: min(cap, step * streak)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct StreakBonus {
    pub step: f64,
    pub cap: f64,
}

impl Default for StreakBonus {
    fn default() -> Self {
        Self { step: 0.05, cap: 0.30 }
    }
}

impl StreakBonus {
    pub fn multiplier(&self, streak: u32) -> f64 {
        if streak == 0 {
            return 0.0;
        }
        (self.step * streak as f64).min(self.cap)
    }
}

/// Soft leaderboard exclusion limits, per UTC day inside the window
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct AbuseThresholds {
    pub max_xp_per_day: u64,
    pub max_missions_per_day: u32,
}

impl Default for AbuseThresholds {
    fn default() -> Self {
        Self { max_xp_per_day: 600, max_missions_per_day: 18 }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Mixed into the daily seed so two deployments get different sets
    pub app_name: String,
    pub curve: LevelCurve,
    pub daily_mission_count: usize,
    /// Categories guaranteed one slot each in the daily set
    pub required_categories: Vec<MissionCategory>,
    pub catalog: Vec<CatalogEntry>,
    pub hidden_spots: Vec<HiddenSpot>,
    pub max_unlocks_per_scan: usize,
    pub stat_mapping: BTreeMap<MissionCategory, StatKind>,
    /// Stat credited when a category has no mapping
    pub fallback_stat: StatKind,
    pub streak_bonus: StreakBonus,
    pub abuse: AbuseThresholds,
    pub leaderboard_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            app_name: "soulsync".to_string(),
            curve: LevelCurve::default(),
            daily_mission_count: 5,
            required_categories: vec![
                MissionCategory::Study,
                MissionCategory::Fitness,
                MissionCategory::Sleep,
                MissionCategory::Nutrition,
                MissionCategory::Reflection,
            ],
            catalog: default_catalog(),
            hidden_spots: default_hidden_spots(),
            max_unlocks_per_scan: 3,
            stat_mapping: default_stat_mapping(),
            fallback_stat: StatKind::Knowledge,
            streak_bonus: StreakBonus::default(),
            abuse: AbuseThresholds::default(),
            leaderboard_limit: 50,
        }
    }
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON document and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn stat_for(&self, category: MissionCategory) -> StatKind {
        self.stat_mapping.get(&category).copied().unwrap_or(self.fallback_stat)
    }

    pub fn validate(&self) -> Result<()> {
        if self.curve.base == 0 {
            return Err(EngineError::Config("curve.base must be positive".into()));
        }
        if self.curve.max_level == 0 || self.curve.max_level > MAX_LEVEL_CAP {
            return Err(EngineError::Config(format!("curve.max_level must be 1..={}", MAX_LEVEL_CAP)));
        }
        // per-level progress is stored as u32
        if self.curve.xp_needed(self.curve.max_level) > u32::MAX as u64 {
            return Err(EngineError::Config("curve.base * max_level^2 must fit in u32".into()));
        }
        let rewards = self
            .catalog
            .iter()
            .map(|e| (e.title.as_str(), e.xp_reward))
            .chain(self.hidden_spots.iter().map(|s| (s.title.as_str(), s.xp_reward)));
        for (title, xp_reward) in rewards {
            if xp_reward > MAX_XP_REWARD {
                return Err(EngineError::Config(format!(
                    "mission {:?} xp_reward exceeds {}",
                    title, MAX_XP_REWARD
                )));
            }
        }
        if self.daily_mission_count == 0 {
            return Err(EngineError::Config("daily_mission_count must be positive".into()));
        }
        if !(self.streak_bonus.step >= 0.0 && self.streak_bonus.cap >= 0.0) {
            return Err(EngineError::Config("streak_bonus values must be non-negative".into()));
        }
        for spot in &self.hidden_spots {
            let g = &spot.geofence;
            if !(-90.0..=90.0).contains(&g.lat) || !(-180.0..=180.0).contains(&g.lon) {
                return Err(EngineError::Config(format!("hidden spot {:?} has out-of-range center", spot.title)));
            }
            if !(g.radius_m > 0.0) {
                return Err(EngineError::Config(format!("hidden spot {:?} needs a positive radius", spot.title)));
            }
        }
        let mut titles: Vec<&str> = self.hidden_spots.iter().map(|s| s.title.as_str()).collect();
        titles.sort_unstable();
        if titles.windows(2).any(|w| w[0] == w[1]) {
            return Err(EngineError::Config("hidden spot titles must be unique".into()));
        }
        Ok(())
    }
}

fn default_stat_mapping() -> BTreeMap<MissionCategory, StatKind> {
    BTreeMap::from([
        (MissionCategory::Study, StatKind::Knowledge),
        (MissionCategory::Fitness, StatKind::Guts),
        (MissionCategory::Sleep, StatKind::Proficiency),
        (MissionCategory::Nutrition, StatKind::Kindness),
        (MissionCategory::Reflection, StatKind::Charm),
        (MissionCategory::Social, StatKind::Kindness),
    ])
}

fn entry(title: &str, category: MissionCategory, difficulty: Difficulty, xp_reward: u32) -> CatalogEntry {
    CatalogEntry { title: title.to_string(), category, difficulty, xp_reward }
}

pub fn default_catalog() -> Vec<CatalogEntry> {
    use Difficulty::*;
    use MissionCategory::*;
    vec![
        entry("Study sprint: 20 minutes (timer)", Study, Easy, 15),
        entry("Review notes for 15 minutes", Study, Easy, 12),
        entry("Practice 5 problems or questions", Study, Medium, 18),
        entry("Move: 10-minute walk or stretch", Fitness, Easy, 12),
        entry("Move: 15 minutes (your choice)", Fitness, Medium, 18),
        entry("Try a short strength set (5-10 mins)", Fitness, Hard, 25),
        entry("Screen-off 30 minutes before bed", Sleep, Medium, 18),
        entry("Plan bedtime + wake time (write it)", Sleep, Easy, 12),
        entry("Add one fruit/veg today", Nutrition, Easy, 12),
        entry("Drink an extra glass of water", Nutrition, Easy, 10),
        entry("Build a balanced plate (photo optional)", Nutrition, Medium, 18),
        entry("3 lines: what went well today?", Reflection, Easy, 12),
        entry("Name 1 worry + 1 tiny next step", Reflection, Medium, 18),
        entry("Send a kind message to someone", Social, Easy, 12),
        entry("Help at home for 10 minutes", Social, Medium, 18),
    ]
}

pub fn default_hidden_spots() -> Vec<HiddenSpot> {
    vec![
        HiddenSpot {
            title: "Hidden: Library Calm Quest (3 deep breaths)".to_string(),
            category: MissionCategory::Study,
            difficulty: Difficulty::Medium,
            xp_reward: 25,
            geofence: Geofence { lat: 12.9716, lon: 77.5946, radius_m: 250.0 },
        },
        HiddenSpot {
            title: "Hidden: Park Power-Up (10-min easy walk)".to_string(),
            category: MissionCategory::Fitness,
            difficulty: Difficulty::Medium,
            xp_reward: 25,
            geofence: Geofence { lat: 12.9750, lon: 77.6050, radius_m: 300.0 },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.catalog.len(), 15);
        assert_eq!(config.required_categories.len(), 5);
    }

    #[test]
    fn test_social_and_nutrition_share_kindness() {
        let config = EngineConfig::default();
        assert_eq!(config.stat_for(MissionCategory::Social), StatKind::Kindness);
        assert_eq!(config.stat_for(MissionCategory::Nutrition), StatKind::Kindness);
        assert_eq!(config.stat_for(MissionCategory::Study), StatKind::Knowledge);
    }

    #[test]
    fn test_unmapped_category_uses_fallback() {
        let mut config = EngineConfig::default();
        config.stat_mapping.remove(&MissionCategory::Social);
        config.fallback_stat = StatKind::Charm;
        assert_eq!(config.stat_for(MissionCategory::Social), StatKind::Charm);
    }

    #[test]
    fn test_partial_json_overrides_defaults() {
        let config = EngineConfig::from_json(
            r#"{"app_name":"pilot","abuse":{"max_xp_per_day":900},"stat_mapping":{"social":"charm"}}"#,
        )
        .unwrap();
        assert_eq!(config.app_name, "pilot");
        assert_eq!(config.abuse.max_xp_per_day, 900);
        assert_eq!(config.abuse.max_missions_per_day, 18);
        assert_eq!(config.stat_for(MissionCategory::Social), StatKind::Charm);
        // a replaced map drops the other entries, so fitness hits the fallback
        assert_eq!(config.stat_for(MissionCategory::Fitness), StatKind::Knowledge);
        assert_eq!(config.catalog.len(), 15);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            EngineConfig::from_json(r#"{"curve":{"base":0}}"#),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"daily_mission_count":0}"#),
            Err(EngineError::Config(_))
        ));
        let bad_spot = r#"{"hidden_spots":[{"title":"x","category":"study","difficulty":"easy",
            "xp_reward":5,"geofence":{"lat":95.0,"lon":0.0,"radius_m":10.0}}]}"#;
        assert!(matches!(EngineConfig::from_json(bad_spot), Err(EngineError::Config(_))));
        assert!(matches!(EngineConfig::from_json("not json"), Err(EngineError::Json(_))));
    }

    #[test]
    fn test_oversized_rewards_and_curve_rejected() {
        let mut config = EngineConfig::default();
        config.catalog[0].xp_reward = u32::MAX;
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));

        let mut config = EngineConfig::default();
        config.hidden_spots[0].xp_reward = MAX_XP_REWARD + 1;
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));

        assert!(matches!(
            EngineConfig::from_json(r#"{"curve":{"base":20,"max_level":5000}}"#),
            Err(EngineError::Config(_))
        ));
        // 100_000 * 1000^2 overflows the stored u32 progress
        assert!(matches!(
            EngineConfig::from_json(r#"{"curve":{"base":100000,"max_level":1000}}"#),
            Err(EngineError::Config(_))
        ));
        assert!(EngineConfig::from_json(r#"{"curve":{"base":4000,"max_level":1000}}"#).is_ok());
    }

    #[test]
    fn test_streak_multiplier_caps_at_thirty_percent() {
        let bonus = StreakBonus::default();
        assert_eq!(bonus.multiplier(0), 0.0);
        assert!((bonus.multiplier(2) - 0.10).abs() < 1e-9);
        assert!((bonus.multiplier(6) - 0.30).abs() < 1e-9);
        assert!((bonus.multiplier(40) - 0.30).abs() < 1e-9);
    }
}
