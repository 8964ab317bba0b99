// Table definitions for the progression module.
// Each row type doubles as the plain data struct the engine works with,
// so the same structs flow through MemoryStore in tests.

use serde::{Deserialize, Serialize};
use spacetimedb::{table, Identity, SpacetimeType, Timestamp};

// ==================== ENUMS ====================

/// The five persistent skill tracks a user levels up
#[derive(SpacetimeType, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    Knowledge,
    Guts,
    Proficiency,
    Kindness,
    Charm,
}

impl StatKind {
    pub const ALL: [StatKind; 5] = [
        StatKind::Knowledge,
        StatKind::Guts,
        StatKind::Proficiency,
        StatKind::Kindness,
        StatKind::Charm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatKind::Knowledge => "knowledge",
            StatKind::Guts => "guts",
            StatKind::Proficiency => "proficiency",
            StatKind::Kindness => "kindness",
            StatKind::Charm => "charm",
        }
    }
}

/// Mission categories; six of them fold onto the five stats via config
#[derive(SpacetimeType, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MissionCategory {
    Study,
    Fitness,
    Sleep,
    Nutrition,
    Reflection,
    Social,
}

impl MissionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionCategory::Study => "study",
            MissionCategory::Fitness => "fitness",
            MissionCategory::Sleep => "sleep",
            MissionCategory::Nutrition => "nutrition",
            MissionCategory::Reflection => "reflection",
            MissionCategory::Social => "social",
        }
    }
}

/// Ordered easy < medium < hard, used for display ordering
#[derive(SpacetimeType, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

#[derive(SpacetimeType, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    Completed,
    Failed,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::Failed => "failed",
        }
    }
}

#[derive(SpacetimeType, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Global,
    Local,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Local => "local",
        }
    }
}

#[derive(SpacetimeType, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Weekly,
    #[serde(rename = "alltime")]
    AllTime,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Weekly => "weekly",
            Period::AllTime => "alltime",
        }
    }
}

/// Which locality field a local leaderboard groups by
#[derive(SpacetimeType, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LocalBy {
    City,
    #[default]
    Region,
}

impl LocalBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocalBy::City => "city",
            LocalBy::Region => "region",
        }
    }
}

/// Circular geofence around a configured spot
#[derive(SpacetimeType, Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Geofence {
    pub lat: f64,
    pub lon: f64,
    pub radius_m: f64,
}

// ==================== TABLES ====================

/// Session links ephemeral connection to a stable user
/// PRIVATE: no PII, just the mapping
#[table(name = session)]
pub struct Session {
    #[primary_key]
    pub connection_id: Identity,

    #[index(btree)]
    pub user_id: u64,

    pub connected_at: Timestamp,
}

/// Identities allowed to call admin reducers and read exports
#[table(name = authorized_worker)]
pub struct AuthorizedWorker {
    #[primary_key]
    pub identity: Identity,
}

/// Registered user with privacy consents
#[table(name = user_account)]
#[derive(Clone, Debug)]
pub struct User {
    #[primary_key]
    #[auto_inc]
    pub id: u64,

    #[unique]
    pub email: String,

    /// Public pseudonym shown on leaderboards
    #[unique]
    pub handle: String,

    /// Opt-in for leaderboards (off by default)
    pub consent_leaderboard: bool,

    /// Opt-in for location-based hidden missions (off by default)
    pub consent_location: bool,

    pub city: Option<String>,
    pub region: Option<String>,

    pub created_at: Timestamp,
}

/// Per-user profile: timezone and streak live here
#[table(name = profile)]
#[derive(Clone, Debug)]
pub struct Profile {
    #[primary_key]
    pub user_id: u64,

    pub avatar_url: Option<String>,

    /// Onboarding goals as JSON
    pub goals_json: Option<String>,

    /// IANA zone name used for every "today" computation
    pub timezone: String,

    /// Consecutive fully-completed days
    pub streak_count: u32,

    /// Last date (YYYY-MM-DD) that counted toward the streak
    pub streak_last_date: Option<String>,

    pub last_login_at: Option<Timestamp>,
}

/// One row per (user, stat kind)
#[table(name = stat)]
#[derive(Clone, Debug)]
pub struct Stat {
    #[primary_key]
    #[auto_inc]
    pub id: u64,

    #[index(btree)]
    pub user_id: u64,

    pub kind: StatKind,

    /// 1..=max_level
    pub level: u32,

    /// Progress toward the next level, always below xp_needed(level)
    pub xp: u32,

    pub updated_at: Timestamp,
}

/// Mission template generated for one calendar day
/// PRIVATE: hidden rows carry their geofence, which clients must not see
#[table(name = mission)]
#[derive(Clone, Debug)]
pub struct Mission {
    #[primary_key]
    #[auto_inc]
    pub id: u64,

    pub title: String,

    pub category: MissionCategory,

    pub difficulty: Difficulty,

    pub xp_reward: u32,

    /// Hidden missions are revealed only through a geofence unlock
    pub is_hidden: bool,

    pub geofence: Option<Geofence>,

    /// ISO date (YYYY-MM-DD) this mission belongs to
    #[index(btree)]
    pub created_for_date: String,

    pub created_by_system: bool,
}

/// A mission handed to one user for one day
#[table(name = mission_assignment)]
#[derive(Clone, Debug)]
pub struct MissionAssignment {
    #[primary_key]
    #[auto_inc]
    pub id: u64,

    #[index(btree)]
    pub user_id: u64,

    pub mission_id: u64,

    /// ISO date (YYYY-MM-DD) in the user's timezone
    pub date: String,

    pub status: AssignmentStatus,

    /// Free-form proof payload as JSON
    pub proof_json: Option<String>,

    pub completed_at: Option<Timestamp>,
}

/// Client-facing row of the `my_assignments` view: an assignment joined
/// with its mission, geofence left out
#[derive(SpacetimeType, Clone, Debug, PartialEq)]
pub struct MyAssignment {
    pub assignment_id: u64,
    pub mission_id: u64,
    pub date: String,
    pub status: AssignmentStatus,
    pub completed_at: Option<Timestamp>,
    pub title: String,
    pub category: MissionCategory,
    pub difficulty: Difficulty,
    pub xp_reward: u32,
    pub is_hidden: bool,
}

/// Append-only event log; the system of record for XP grants
#[table(name = audit_log)]
#[derive(Clone, Debug)]
pub struct AuditLog {
    #[primary_key]
    #[auto_inc]
    pub id: u64,

    #[index(btree)]
    pub user_id: u64,

    pub event_type: String,

    /// Event metadata as JSON, never contains coordinates
    pub meta_json: Option<String>,

    pub created_at: Timestamp,
}

/// Cached ranking row, fully replaced on every recalculation
#[table(name = rank_snapshot, public)]
#[derive(Clone, Debug)]
pub struct RankSnapshot {
    #[primary_key]
    #[auto_inc]
    pub id: u64,

    #[index(btree)]
    pub user_id: u64,

    /// Handle (denormalized for display)
    pub handle: String,

    pub scope: Scope,

    pub period: Period,

    /// "region:<value>" or "city:<value>" for local boards, None for global
    pub locality: Option<String>,

    /// Lower bound of the counted window (None = all time)
    pub window_start: Option<Timestamp>,

    pub xp: u64,

    /// 1-based position
    pub rank: u32,

    pub created_at: Timestamp,
}

/// Active engine configuration as JSON (single row, id = 0)
#[table(name = engine_config)]
pub struct EngineConfigRow {
    #[primary_key]
    pub id: u32,

    pub json: String,
}

/// Pending data export for delivery by an authorized worker
/// SECURITY: Public table with RLS protection - only authorized workers can see rows
#[table(name = data_export, public)]
pub struct DataExport {
    #[primary_key]
    #[auto_inc]
    pub id: u64,

    #[index(btree)]
    pub user_id: u64,

    /// Minimal export document as JSON
    pub payload: String,

    pub created_at: Timestamp,
}
