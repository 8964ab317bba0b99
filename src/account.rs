//! Accounts: signup, profile/stat bootstrap, settings, export and wipe
//!
//! Stats and profiles are created lazily so every engine path can call
//! `ensure_profile` / `get_or_create_stat` without a separate setup step.

use serde_json::{json, Value};
use spacetimedb::Timestamp;

use crate::clock::{parse_timezone, to_utc, DEFAULT_TIMEZONE};
use crate::curve::LevelCurve;
use crate::error::{EngineError, Result};
use crate::store::ProgressStore;
use crate::tables::{AuditLog, Profile, Stat, StatKind, User};

pub const USER_REGISTERED: &str = "user_registered";
pub const SETTINGS_UPDATED: &str = "settings_updated";

const HANDLE_MIN: usize = 3;
const HANDLE_MAX: usize = 32;

/// `local@domain.tld` with no whitespace
pub fn valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// 3-32 characters from [A-Za-z0-9_]
pub fn valid_handle(handle: &str) -> bool {
    let handle = handle.trim();
    (HANDLE_MIN..=HANDLE_MAX).contains(&handle.len())
        && handle.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(crate) fn audit(store: &mut impl ProgressStore, user_id: u64, event_type: &str, meta: Option<Value>, now: Timestamp) {
    store.append_audit(AuditLog {
        id: 0,
        user_id,
        event_type: event_type.to_string(),
        meta_json: meta.map(|m| m.to_string()),
        created_at: now,
    });
}

/// Create a user with both consents off, a zoned profile and all five stats
pub fn register_user<S: ProgressStore>(
    store: &mut S,
    email: &str,
    handle: &str,
    timezone: &str,
    now: Timestamp,
) -> Result<User> {
    let email = email.trim().to_lowercase();
    let handle = handle.trim().to_string();

    if !valid_email(&email) {
        return Err(EngineError::InvalidInput(format!("invalid email {:?}", email)));
    }
    if !valid_handle(&handle) {
        return Err(EngineError::InvalidInput(format!(
            "handle must be {}-{} characters of letters, digits or underscore",
            HANDLE_MIN, HANDLE_MAX
        )));
    }
    let timezone = parse_timezone(timezone)?.name().to_string();

    if store.find_user_by_email(&email).is_some() {
        return Err(EngineError::Conflict("email already registered".into()));
    }
    let handle_lower = handle.to_lowercase();
    if store.users().iter().any(|u| u.handle.to_lowercase() == handle_lower) {
        return Err(EngineError::Conflict(format!("handle {} is taken", handle)));
    }

    let user = store.insert_user(User {
        id: 0,
        email,
        handle,
        consent_leaderboard: false,
        consent_location: false,
        city: None,
        region: None,
        created_at: now,
    });

    store.upsert_profile(new_profile(user.id, timezone));
    ensure_all_stats(store, user.id, now);
    audit(store, user.id, USER_REGISTERED, None, now);

    log::info!("[ACCOUNT] registered user_id={} handle={}", user.id, user.handle);
    Ok(user)
}

fn new_profile(user_id: u64, timezone: String) -> Profile {
    Profile {
        user_id,
        avatar_url: None,
        goals_json: None,
        timezone,
        streak_count: 0,
        streak_last_date: None,
        last_login_at: None,
    }
}

pub fn require_user<S: ProgressStore>(store: &S, user_id: u64) -> Result<User> {
    store.find_user(user_id).ok_or(EngineError::UserNotFound(user_id))
}

/// Profile for an existing user, created with UTC defaults if missing
pub fn ensure_profile<S: ProgressStore>(store: &mut S, user_id: u64) -> Result<Profile> {
    require_user(store, user_id)?;
    if let Some(profile) = store.find_profile(user_id) {
        return Ok(profile);
    }
    let profile = new_profile(user_id, DEFAULT_TIMEZONE.to_string());
    store.upsert_profile(profile.clone());
    Ok(profile)
}

pub fn get_or_create_stat<S: ProgressStore>(store: &mut S, user_id: u64, kind: StatKind, now: Timestamp) -> Stat {
    if let Some(stat) = store.stats_for_user(user_id).into_iter().find(|s| s.kind == kind) {
        return stat;
    }
    store.insert_stat(Stat { id: 0, user_id, kind, level: 1, xp: 0, updated_at: now })
}

/// All five stats for a user, creating any that are missing
pub fn ensure_all_stats<S: ProgressStore>(store: &mut S, user_id: u64, now: Timestamp) -> Vec<Stat> {
    StatKind::ALL
        .iter()
        .map(|kind| get_or_create_stat(store, user_id, *kind, now))
        .collect()
}

/// Push XP through the curve for one stat, returns the stored row and levels gained
pub fn grant_stat_xp<S: ProgressStore>(
    store: &mut S,
    curve: &LevelCurve,
    user_id: u64,
    kind: StatKind,
    gain: i64,
    now: Timestamp,
) -> (Stat, u32) {
    let mut stat = get_or_create_stat(store, user_id, kind, now);
    let levels_gained = curve.apply_xp(&mut stat, gain, now);
    store.update_stat(stat.clone());
    (stat, levels_gained)
}

pub fn record_login<S: ProgressStore>(store: &mut S, user_id: u64, now: Timestamp) -> Result<Profile> {
    let mut profile = ensure_profile(store, user_id)?;
    profile.last_login_at = Some(now);
    store.upsert_profile(profile.clone());
    Ok(profile)
}

/// Partial settings change; `None` leaves a field alone and an empty
/// string clears an optional text field
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub consent_location: Option<bool>,
    pub consent_leaderboard: Option<bool>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub avatar_url: Option<String>,
    pub goals_json: Option<String>,
    pub timezone: Option<String>,
}

fn cleaned(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn update_settings<S: ProgressStore>(
    store: &mut S,
    user_id: u64,
    update: SettingsUpdate,
    now: Timestamp,
) -> Result<User> {
    let mut user = require_user(store, user_id)?;
    let mut profile = ensure_profile(store, user_id)?;
    let mut changed: Vec<&str> = Vec::new();

    if let Some(name) = &update.timezone {
        let tz = parse_timezone(name)?;
        if profile.timezone != tz.name() {
            profile.timezone = tz.name().to_string();
            changed.push("timezone");
        }
    }
    if let Some(goals) = &update.goals_json {
        let parsed: Value = serde_json::from_str(goals)
            .map_err(|e| EngineError::InvalidInput(format!("goals must be JSON: {}", e)))?;
        profile.goals_json = Some(parsed.to_string());
        changed.push("goals_json");
    }
    if let Some(flag) = update.consent_location {
        if user.consent_location != flag {
            user.consent_location = flag;
            changed.push("consent_location");
        }
    }
    if let Some(flag) = update.consent_leaderboard {
        if user.consent_leaderboard != flag {
            user.consent_leaderboard = flag;
            changed.push("consent_leaderboard");
        }
    }
    if let Some(city) = &update.city {
        user.city = cleaned(city);
        changed.push("city");
    }
    if let Some(region) = &update.region {
        user.region = cleaned(region);
        changed.push("region");
    }
    if let Some(avatar) = &update.avatar_url {
        profile.avatar_url = cleaned(avatar);
        changed.push("avatar_url");
    }

    if changed.is_empty() {
        log::debug!("[SETTINGS] no changes user_id={}", user_id);
        return Ok(user);
    }

    store.update_user(user.clone());
    store.upsert_profile(profile);
    // field names only; values may be personal
    audit(store, user_id, SETTINGS_UPDATED, Some(json!({ "changed": changed })), now);

    log::info!("[SETTINGS] updated user_id={} fields={}", user_id, changed.join(","));
    Ok(user)
}

fn iso(ts: Timestamp) -> String {
    to_utc(ts).to_rfc3339()
}

/// Minimal personal-data export: user, profile, stats and missions.
/// Never includes the audit log.
pub fn export_user_data<S: ProgressStore>(store: &S, user_id: u64, now: Timestamp) -> Result<Value> {
    let user = require_user(store, user_id)?;
    let profile = store.find_profile(user_id);

    let mut stats = store.stats_for_user(user_id);
    stats.sort_by_key(|s| s.kind);

    let mut assignments = store.assignments_for_user(user_id);
    assignments.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));

    let missions: Vec<Value> = assignments
        .iter()
        .filter_map(|a| store.find_mission(a.mission_id).map(|m| (a, m)))
        .map(|(a, m)| {
            json!({
                "assignment": {
                    "id": a.id,
                    "date": a.date,
                    "status": a.status.as_str(),
                    "proof": a.proof_json.as_deref().and_then(|p| serde_json::from_str::<Value>(p).ok()),
                    "completed_at": a.completed_at.map(iso),
                },
                "mission": {
                    "id": m.id,
                    "title": m.title,
                    "category": m.category.as_str(),
                    "difficulty": m.difficulty.as_str(),
                    "xp_reward": m.xp_reward,
                    "is_hidden": m.is_hidden,
                    "created_for_date": m.created_for_date,
                    "created_by_system": m.created_by_system,
                },
            })
        })
        .collect();

    Ok(json!({
        "exported_at": iso(now),
        "user": {
            "id": user.id,
            "email": user.email,
            "handle": user.handle,
            "consent_leaderboard": user.consent_leaderboard,
            "consent_location": user.consent_location,
            "city": user.city,
            "region": user.region,
            "created_at": iso(user.created_at),
        },
        "profile": profile.map(|p| json!({
            "avatar_url": p.avatar_url,
            "goals": p.goals_json.as_deref().and_then(|g| serde_json::from_str::<Value>(g).ok()),
            "timezone": p.timezone,
            "streak_count": p.streak_count,
            "last_login_at": p.last_login_at.map(iso),
        })),
        "stats": stats.iter().map(|s| json!({
            "type": s.kind.as_str(),
            "level": s.level,
            "xp": s.xp,
            "updated_at": iso(s.updated_at),
        })).collect::<Vec<_>>(),
        "missions": missions,
    }))
}

/// Row counts removed by an account wipe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    pub snapshots: usize,
    pub assignments: usize,
    pub stats: usize,
    pub audit_events: usize,
    pub profile: bool,
}

/// Full wipe of everything a user owns. Children first, the user row last.
pub fn delete_account<S: ProgressStore>(store: &mut S, user_id: u64) -> Result<DeletionReport> {
    require_user(store, user_id)?;

    let snapshot_ids: Vec<u64> = store
        .snapshots()
        .into_iter()
        .filter(|s| s.user_id == user_id)
        .map(|s| s.id)
        .collect();
    for id in &snapshot_ids {
        store.delete_snapshot(*id);
    }

    let report = DeletionReport {
        snapshots: snapshot_ids.len(),
        assignments: store.delete_assignments_for_user(user_id),
        stats: store.delete_stats_for_user(user_id),
        profile: store.delete_profile(user_id),
        audit_events: store.delete_audit_for_user(user_id),
    };
    store.delete_user(user_id);

    log::info!(
        "[ACCOUNT] deleted user_id={} assignments={} stats={} audit={} snapshots={}",
        user_id, report.assignments, report.stats, report.audit_events, report.snapshots
    );
    Ok(report)
}
