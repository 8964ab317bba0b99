//! Opt-in leaderboards computed from `mission_completed` audit events.
//!
//! Recalculation is a full rebuild: drop snapshots of opted-out users,
//! rank the eligible users for the requested window, then replace the
//! snapshot rows for that exact (scope, period, locality, window).

use std::collections::BTreeMap;

use serde_json::Value;
use spacetimedb::Timestamp;

use crate::clock::{utc_day_key, week_start_utc};
use crate::config::{AbuseThresholds, EngineConfig};
use crate::missions::MISSION_COMPLETED;
use crate::store::ProgressStore;
use crate::tables::{AuditLog, LocalBy, Period, RankSnapshot, Scope, User};

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardQuery {
    pub scope: Scope,
    pub period: Period,
    pub local_by: LocalBy,
    pub local_value: Option<String>,
    pub limit: usize,
}

impl LeaderboardQuery {
    pub fn global(period: Period, limit: usize) -> Self {
        Self { scope: Scope::Global, period, local_by: LocalBy::default(), local_value: None, limit }
    }

    pub fn local(period: Period, local_by: LocalBy, local_value: &str, limit: usize) -> Self {
        Self {
            scope: Scope::Local,
            period,
            local_by,
            local_value: Some(local_value.to_string()),
            limit,
        }
    }

    /// "city:<value>" / "region:<value>" for local boards
    pub fn locality(&self) -> Option<String> {
        match self.scope {
            Scope::Global => None,
            Scope::Local => self
                .local_value
                .as_deref()
                .map(normalize)
                .filter(|v| !v.is_empty())
                .map(|v| format!("{}:{}", self.local_by.as_str(), v)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardRow {
    pub user_id: u64,
    pub handle: String,
    pub avatar_url: Option<String>,
    pub xp: u64,
    pub rank: u32,
    pub city: Option<String>,
    pub region: Option<String>,
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn matches_locality(user: &User, local_by: LocalBy, local_value: Option<&str>) -> bool {
    let Some(wanted) = local_value.map(normalize).filter(|v| !v.is_empty()) else {
        return false;
    };
    let field = match local_by {
        LocalBy::City => user.city.as_deref(),
        LocalBy::Region => user.region.as_deref(),
    };
    field.map(normalize).as_deref() == Some(wanted.as_str())
}

/// Lower bound of the counted window, None for all time
pub fn window_start(period: Period, now: Timestamp) -> Option<Timestamp> {
    match period {
        Period::Weekly => Some(week_start_utc(now)),
        Period::AllTime => None,
    }
}

/// `xp_total` of a completion event; unreadable metadata counts as 0
fn xp_total(event: &AuditLog) -> u64 {
    event
        .meta_json
        .as_deref()
        .and_then(|meta| serde_json::from_str::<Value>(meta).ok())
        .and_then(|meta| meta.get("xp_total").and_then(Value::as_u64))
        .unwrap_or(0)
}

fn completions_in_window<S: ProgressStore>(store: &S, user_id: u64, since: Option<Timestamp>) -> Vec<AuditLog> {
    store
        .audit_for_user(user_id)
        .into_iter()
        .filter(|e| e.event_type == MISSION_COMPLETED)
        .filter(|e| since.map_or(true, |start| e.created_at >= start))
        .collect()
}

/// True when any UTC day in the events goes over the XP or mission limit
pub fn is_suspicious(events: &[AuditLog], limits: &AbuseThresholds) -> bool {
    let mut per_day: BTreeMap<String, (u64, u32)> = BTreeMap::new();
    for event in events {
        let day = per_day.entry(utc_day_key(event.created_at)).or_default();
        day.0 += xp_total(event);
        day.1 += 1;
    }
    per_day
        .values()
        .any(|(xp, missions)| *xp > limits.max_xp_per_day || *missions > limits.max_missions_per_day)
}

/// Remove cached rows of everyone who has not opted in
pub fn cleanup_snapshots_for_optout<S: ProgressStore>(store: &mut S) -> usize {
    let opted_in: Vec<u64> = store
        .users()
        .into_iter()
        .filter(|u| u.consent_leaderboard)
        .map(|u| u.id)
        .collect();
    let stale: Vec<u64> = store
        .snapshots()
        .into_iter()
        .filter(|s| !opted_in.contains(&s.user_id))
        .map(|s| s.id)
        .collect();
    for id in &stale {
        store.delete_snapshot(*id);
    }
    stale.len()
}

/// Rank opted-in users for the query window and refresh its snapshot rows
pub fn recalc_leaderboard<S: ProgressStore>(
    store: &mut S,
    config: &EngineConfig,
    query: &LeaderboardQuery,
    now: Timestamp,
) -> Vec<LeaderboardRow> {
    let since = window_start(query.period, now);
    let locality = query.locality();

    let removed = cleanup_snapshots_for_optout(store);

    let candidates: Vec<User> = store
        .users()
        .into_iter()
        .filter(|u| u.consent_leaderboard)
        .filter(|u| match query.scope {
            Scope::Global => true,
            Scope::Local => matches_locality(u, query.local_by, query.local_value.as_deref()),
        })
        .collect();

    let mut excluded = 0;
    let mut rows: Vec<LeaderboardRow> = Vec::with_capacity(candidates.len());
    for user in candidates {
        let events = completions_in_window(store, user.id, since);
        if is_suspicious(&events, &config.abuse) {
            excluded += 1;
            log::warn!("[LEADERBOARD] excluded user_id={} reason=daily_limit", user.id);
            continue;
        }
        rows.push(LeaderboardRow {
            user_id: user.id,
            avatar_url: store.find_profile(user.id).and_then(|p| p.avatar_url),
            handle: user.handle,
            xp: events.iter().map(xp_total).sum(),
            rank: 0,
            city: user.city,
            region: user.region,
        });
    }

    rows.sort_by(|a, b| b.xp.cmp(&a.xp).then_with(|| a.handle.to_lowercase().cmp(&b.handle.to_lowercase())));
    for (idx, row) in rows.iter_mut().enumerate() {
        row.rank = idx as u32 + 1;
    }
    rows.truncate(query.limit);

    // the current window is replaced and older weekly windows are pruned
    let replaced: Vec<u64> = store
        .snapshots()
        .into_iter()
        .filter(|s| s.scope == query.scope && s.period == query.period && s.locality == locality)
        .filter(|s| match (s.window_start, since) {
            (Some(old), Some(current)) => old <= current,
            (old, current) => old == current,
        })
        .map(|s| s.id)
        .collect();
    for id in &replaced {
        store.delete_snapshot(*id);
    }
    for row in &rows {
        store.insert_snapshot(RankSnapshot {
            id: 0,
            user_id: row.user_id,
            handle: row.handle.clone(),
            scope: query.scope,
            period: query.period,
            locality: locality.clone(),
            window_start: since,
            xp: row.xp,
            rank: row.rank,
            created_at: now,
        });
    }

    log::info!(
        "[LEADERBOARD] recalc scope={} period={} locality={} ranked={} excluded={} optout_cleaned={} replaced={}",
        query.scope.as_str(),
        query.period.as_str(),
        locality.as_deref().unwrap_or("-"),
        rows.len(),
        excluded,
        removed,
        replaced.len()
    );
    rows
}
