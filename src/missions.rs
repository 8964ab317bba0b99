//! Daily missions: seeded catalog pick, per-user assignment, completion
//! with streak bonus, and the streak state machine.
//!
//! The daily set is a pure function of (date, app name, catalog), so every
//! user sees the same five missions no matter when they first ask.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use spacetimedb::Timestamp;

use crate::account::{audit, ensure_profile, grant_stat_xp, require_user};
use crate::clock::{day_key, parse_day_key, previous_day, DayClock};
use crate::config::{CatalogEntry, EngineConfig};
use crate::error::{EngineError, Result};
use crate::store::ProgressStore;
use crate::tables::{
    AssignmentStatus, Mission, MissionAssignment, MissionCategory, MyAssignment, Profile, StatKind,
};

pub const MISSION_COMPLETED: &str = "mission_completed";
pub const STREAK_UPDATED: &str = "streak_updated";

// ==================== DAILY SET ====================

/// 32-byte PRNG seed for a day: SHA-256 of "{date}-{app_name}"
pub fn daily_seed(date: &str, app_name: &str) -> [u8; 32] {
    let digest = Sha256::digest(format!("{}-{}", date, app_name).as_bytes());
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&digest);
    seed
}

/// Pick the day's set: one entry per required category (in order), then
/// fill up to `count` from the shuffled remainder. A thin catalog yields
/// a smaller set.
pub fn pick_daily_set(
    catalog: &[CatalogEntry],
    required: &[MissionCategory],
    count: usize,
    seed: [u8; 32],
) -> Vec<CatalogEntry> {
    let mut rng = StdRng::from_seed(seed);
    let mut shuffled = catalog.to_vec();
    shuffled.shuffle(&mut rng);

    let mut chosen: Vec<CatalogEntry> = Vec::with_capacity(count);
    for category in required {
        if let Some(entry) = shuffled
            .iter()
            .find(|e| e.category == *category && !chosen.iter().any(|c| c.title == e.title))
        {
            chosen.push(entry.clone());
        }
    }

    for entry in &shuffled {
        if chosen.len() >= count {
            break;
        }
        if !chosen.iter().any(|c| c.title == entry.title) {
            chosen.push(entry.clone());
        }
    }

    chosen.truncate(count);
    chosen
}

/// Materialize the day's system missions once; later calls return the same rows
pub fn ensure_daily_missions<S: ProgressStore>(store: &mut S, config: &EngineConfig, date: &str) -> Vec<Mission> {
    let existing: Vec<Mission> = store
        .missions_for_date(date)
        .into_iter()
        .filter(|m| !m.is_hidden && m.created_by_system)
        .collect();
    if !existing.is_empty() {
        return existing;
    }

    let picked = pick_daily_set(
        &config.catalog,
        &config.required_categories,
        config.daily_mission_count,
        daily_seed(date, &config.app_name),
    );
    if picked.is_empty() {
        log::warn!("[MISSION] empty daily set date={} catalog_size={}", date, config.catalog.len());
    }

    let missions: Vec<Mission> = picked
        .into_iter()
        .map(|entry| {
            store.insert_mission(Mission {
                id: 0,
                title: entry.title,
                category: entry.category,
                difficulty: entry.difficulty,
                xp_reward: entry.xp_reward,
                is_hidden: false,
                geofence: None,
                created_for_date: date.to_string(),
                created_by_system: true,
            })
        })
        .collect();

    log::info!("[MISSION] daily set created date={} count={}", date, missions.len());
    missions
}

/// Give the user a pending assignment for every daily mission they lack on
/// `date`; returns all their assignments for that date (hidden unlocks included)
pub fn ensure_assignments_for_user<S: ProgressStore>(
    store: &mut S,
    config: &EngineConfig,
    user_id: u64,
    date: &str,
) -> Result<Vec<MissionAssignment>> {
    require_user(store, user_id)?;
    let missions = ensure_daily_missions(store, config, date);
    let mut assignments = store.assignments_for_user_on(user_id, date);

    let mut created = 0;
    for mission in &missions {
        if assignments.iter().any(|a| a.mission_id == mission.id) {
            continue;
        }
        assignments.push(store.insert_assignment(MissionAssignment {
            id: 0,
            user_id,
            mission_id: mission.id,
            date: date.to_string(),
            status: AssignmentStatus::Pending,
            proof_json: None,
            completed_at: None,
        }));
        created += 1;
    }

    if created > 0 {
        log::info!("[MISSION] assigned user_id={} date={} count={}", user_id, date, created);
    }
    Ok(assignments)
}

#[derive(Debug, Clone)]
pub struct BoardEntry {
    pub assignment: MissionAssignment,
    pub mission: Mission,
}

/// A user's missions for their local "today"
#[derive(Debug, Clone)]
pub struct DailyBoard {
    pub date: String,
    pub entries: Vec<BoardEntry>,
}

impl DailyBoard {
    pub fn all_completed(&self) -> bool {
        !self.entries.is_empty()
            && self.entries.iter().all(|e| e.assignment.status == AssignmentStatus::Completed)
    }
}

/// Flatten an assignment and its mission into the client-facing row
pub fn assignment_row(assignment: &MissionAssignment, mission: &Mission) -> MyAssignment {
    MyAssignment {
        assignment_id: assignment.id,
        mission_id: mission.id,
        date: assignment.date.clone(),
        status: assignment.status,
        completed_at: assignment.completed_at,
        title: mission.title.clone(),
        category: mission.category,
        difficulty: mission.difficulty,
        xp_reward: mission.xp_reward,
        is_hidden: mission.is_hidden,
    }
}

pub fn todays_assignments<S: ProgressStore>(
    store: &mut S,
    config: &EngineConfig,
    user_id: u64,
    clock: &DayClock,
) -> Result<DailyBoard> {
    let date = day_key(clock.today());
    let assignments = ensure_assignments_for_user(store, config, user_id, &date)?;

    let mut entries: Vec<BoardEntry> = assignments
        .into_iter()
        .filter_map(|assignment| {
            store
                .find_mission(assignment.mission_id)
                .map(|mission| BoardEntry { assignment, mission })
        })
        .collect();
    entries.sort_by(|a, b| {
        a.mission
            .difficulty
            .cmp(&b.mission.difficulty)
            .then(a.assignment.id.cmp(&b.assignment.id))
    });

    Ok(DailyBoard { date, entries })
}

// ==================== COMPLETION ====================

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionReport {
    pub assignment_id: u64,
    pub mission_id: u64,
    pub stat: StatKind,
    pub xp_base: u32,
    pub xp_bonus: u32,
    pub xp_total: u32,
    pub level: u32,
    pub xp: u32,
    pub levels_gained: u32,
    /// Streak after this completion
    pub streak: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    /// Second completion of the same assignment; nothing was granted
    AlreadyCompleted,
    Completed(CompletionReport),
}

impl CompletionOutcome {
    pub fn message(&self) -> String {
        match self {
            CompletionOutcome::AlreadyCompleted => "Already completed.".to_string(),
            CompletionOutcome::Completed(r) if r.xp_bonus > 0 => format!(
                "Completed! +{} XP ({} + {} streak bonus) to {}",
                r.xp_total, r.xp_base, r.xp_bonus, r.stat.as_str()
            ),
            CompletionOutcome::Completed(r) => {
                format!("Completed! +{} XP to {}", r.xp_total, r.stat.as_str())
            }
        }
    }
}

/// Streak that still counts on `date`: only a chain ending on that day or
/// the day before earns a bonus
fn live_streak(profile: &Profile, date: &str) -> u32 {
    let Some(last) = profile.streak_last_date.as_deref() else {
        return 0;
    };
    let continues = parse_day_key(date)
        .map(|d| last == date || last == day_key(previous_day(d)))
        .unwrap_or(false);
    if continues {
        profile.streak_count
    } else {
        0
    }
}

/// Complete a pending assignment: grant base + streak bonus to the mapped
/// stat, record the audit event, then refresh the streak
pub fn complete_assignment<S: ProgressStore>(
    store: &mut S,
    config: &EngineConfig,
    user_id: u64,
    assignment_id: u64,
    proof: Option<Value>,
    now: Timestamp,
) -> Result<CompletionOutcome> {
    let mut assignment = store
        .find_assignment(assignment_id)
        .filter(|a| a.user_id == user_id)
        .ok_or(EngineError::AssignmentNotFound(assignment_id))?;

    match assignment.status {
        AssignmentStatus::Completed => {
            log::debug!("[MISSION] already completed user_id={} assignment_id={}", user_id, assignment_id);
            return Ok(CompletionOutcome::AlreadyCompleted);
        }
        AssignmentStatus::Failed => {
            return Err(EngineError::NotPending { id: assignment_id, status: assignment.status });
        }
        AssignmentStatus::Pending => {}
    }

    let mission = store
        .find_mission(assignment.mission_id)
        .ok_or(EngineError::MissionNotFound(assignment.mission_id))?;
    let profile = ensure_profile(store, user_id)?;

    let streak_before = live_streak(&profile, &assignment.date);
    let multiplier = config.streak_bonus.multiplier(streak_before);
    let xp_base = mission.xp_reward;
    let xp_bonus = (xp_base as f64 * multiplier).round_ties_even() as u32;
    let xp_total = xp_base.saturating_add(xp_bonus);
    let stat_kind = config.stat_for(mission.category);

    let (stat, levels_gained) = grant_stat_xp(store, &config.curve, user_id, stat_kind, xp_total as i64, now);

    assignment.status = AssignmentStatus::Completed;
    assignment.completed_at = Some(now);
    assignment.proof_json = Some(proof.unwrap_or_else(|| json!({})).to_string());
    store.update_assignment(assignment.clone());

    audit(
        store,
        user_id,
        MISSION_COMPLETED,
        Some(json!({
            "assignment_id": assignment.id,
            "mission_id": mission.id,
            "xp_base": xp_base,
            "xp_bonus": xp_bonus,
            "xp_total": xp_total,
            "stat_type": stat_kind.as_str(),
        })),
        now,
    );

    log::info!(
        "[MISSION] completed user_id={} assignment_id={} mission_id={} xp_base={} xp_bonus={} xp_total={} stat={}",
        user_id, assignment.id, mission.id, xp_base, xp_bonus, xp_total, stat_kind.as_str()
    );
    if levels_gained > 0 {
        log::info!(
            "[LEVEL_UP] user_id={} stat={} level={} gained={}",
            user_id, stat_kind.as_str(), stat.level, levels_gained
        );
    }

    let streak = match update_streak_for_day(store, user_id, &assignment.date, now)? {
        Some(streak) => streak,
        None => store.find_profile(user_id).map(|p| p.streak_count).unwrap_or(0),
    };

    Ok(CompletionOutcome::Completed(CompletionReport {
        assignment_id: assignment.id,
        mission_id: mission.id,
        stat: stat_kind,
        xp_base,
        xp_bonus,
        xp_total,
        level: stat.level,
        xp: stat.xp,
        levels_gained,
        streak,
    }))
}

// ==================== STREAK ====================

fn all_completed(assignments: &[MissionAssignment]) -> bool {
    !assignments.is_empty() && assignments.iter().all(|a| a.status == AssignmentStatus::Completed)
}

/// Advance the streak once `date` is fully completed.
///
/// A fully completed previous day continues the chain; anything else
/// (no assignments, or some left open) starts over at 1. Each date counts
/// at most once, and a date at or before the last counted one never moves
/// the streak. Returns the new streak when it changed.
pub fn update_streak_for_day<S: ProgressStore>(
    store: &mut S,
    user_id: u64,
    date: &str,
    now: Timestamp,
) -> Result<Option<u32>> {
    if !all_completed(&store.assignments_for_user_on(user_id, date)) {
        return Ok(None);
    }

    let day = parse_day_key(date)?;
    let mut profile = ensure_profile(store, user_id)?;
    let last = profile.streak_last_date.as_deref().and_then(|d| parse_day_key(d).ok());
    if last.is_some_and(|last| day <= last) {
        log::debug!(
            "[STREAK] day not after last counted user_id={} date={} last={:?}",
            user_id, date, profile.streak_last_date
        );
        return Ok(None);
    }

    let yesterday = day_key(previous_day(day));
    let continues = all_completed(&store.assignments_for_user_on(user_id, &yesterday));

    let streak = if continues { profile.streak_count.saturating_add(1).max(1) } else { 1 };
    profile.streak_count = streak;
    profile.streak_last_date = Some(date.to_string());
    store.upsert_profile(profile);

    audit(store, user_id, STREAK_UPDATED, Some(json!({ "date": date, "streak": streak })), now);
    log::info!("[STREAK] user_id={} date={} streak={} continued={}", user_id, date, streak, continues);
    Ok(Some(streak))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::register_user;
    use crate::config::default_catalog;
    use crate::store::MemoryStore;
    use crate::tables::Difficulty;

    fn at(secs: i64) -> Timestamp {
        Timestamp::from_micros_since_unix_epoch(secs * 1_000_000)
    }

    fn setup() -> (MemoryStore, EngineConfig, u64) {
        let mut store = MemoryStore::new();
        let user = register_user(&mut store, "ana@example.com", "ana", "UTC", at(0)).unwrap();
        (store, EngineConfig::default(), user.id)
    }

    fn complete_day(store: &mut MemoryStore, config: &EngineConfig, user_id: u64, date: &str) -> Vec<CompletionOutcome> {
        let assignments = ensure_assignments_for_user(store, config, user_id, date).unwrap();
        assignments
            .iter()
            .map(|a| complete_assignment(store, config, user_id, a.id, None, at(100)).unwrap())
            .collect()
    }

    fn streak(store: &MemoryStore, user_id: u64) -> u32 {
        store.find_profile(user_id).unwrap().streak_count
    }

    #[test]
    fn test_seed_is_stable_per_date() {
        assert_eq!(daily_seed("2025-03-01", "soulsync"), daily_seed("2025-03-01", "soulsync"));
        assert_ne!(daily_seed("2025-03-01", "soulsync"), daily_seed("2025-03-02", "soulsync"));
        assert_ne!(daily_seed("2025-03-01", "soulsync"), daily_seed("2025-03-01", "other"));
    }

    #[test]
    fn test_daily_set_covers_required_categories() {
        let config = EngineConfig::default();
        for day in 1..=28 {
            let date = format!("2025-02-{:02}", day);
            let set = pick_daily_set(
                &config.catalog,
                &config.required_categories,
                5,
                daily_seed(&date, "soulsync"),
            );
            assert_eq!(set.len(), 5);
            for category in &config.required_categories {
                assert!(set.iter().any(|e| e.category == *category), "{} missing {:?}", date, category);
            }
            let mut titles: Vec<&str> = set.iter().map(|e| e.title.as_str()).collect();
            titles.sort_unstable();
            titles.dedup();
            assert_eq!(titles.len(), 5);

            let again = pick_daily_set(
                &config.catalog,
                &config.required_categories,
                5,
                daily_seed(&date, "soulsync"),
            );
            assert_eq!(set, again);
        }
    }

    #[test]
    fn test_small_catalog_yields_partial_set() {
        let catalog: Vec<CatalogEntry> = default_catalog()
            .into_iter()
            .filter(|e| e.category == MissionCategory::Study)
            .collect();
        let required = EngineConfig::default().required_categories;
        let set = pick_daily_set(&catalog, &required, 5, [7u8; 32]);
        assert_eq!(set.len(), 3);
        assert!(set.iter().all(|e| e.category == MissionCategory::Study));

        assert!(pick_daily_set(&[], &required, 5, [7u8; 32]).is_empty());
    }

    #[test]
    fn test_missions_and_assignments_created_once() {
        let (mut store, config, user_id) = setup();
        let first = ensure_daily_missions(&mut store, &config, "2025-03-01");
        let second = ensure_daily_missions(&mut store, &config, "2025-03-01");
        assert_eq!(first.len(), 5);
        assert_eq!(
            first.iter().map(|m| m.id).collect::<Vec<_>>(),
            second.iter().map(|m| m.id).collect::<Vec<_>>()
        );

        let a = ensure_assignments_for_user(&mut store, &config, user_id, "2025-03-01").unwrap();
        let b = ensure_assignments_for_user(&mut store, &config, user_id, "2025-03-01").unwrap();
        assert_eq!(a.len(), 5);
        assert_eq!(b.len(), 5);
        assert_eq!(store.assignments_for_user(user_id).len(), 5);
        assert_eq!(store.missions().len(), 5);

        assert!(matches!(
            ensure_assignments_for_user(&mut store, &config, 999, "2025-03-01"),
            Err(EngineError::UserNotFound(999))
        ));
    }

    #[test]
    fn test_board_uses_local_date_and_orders_by_difficulty() {
        let (mut store, config, user_id) = setup();
        // 2025-03-01 20:00 UTC is already 2025-03-02 in UTC+5:30
        let now = at(1_740_859_200);
        let clock = DayClock::for_zone(now, "Asia/Kolkata");
        let board = todays_assignments(&mut store, &config, user_id, &clock).unwrap();
        assert_eq!(board.date, "2025-03-02");
        assert_eq!(board.entries.len(), 5);
        let difficulties: Vec<Difficulty> = board.entries.iter().map(|e| e.mission.difficulty).collect();
        let mut sorted = difficulties.clone();
        sorted.sort();
        assert_eq!(difficulties, sorted);
        assert!(!board.all_completed());
    }

    #[test]
    fn test_double_completion_is_noop() {
        let (mut store, config, user_id) = setup();
        let assignments = ensure_assignments_for_user(&mut store, &config, user_id, "2025-03-01").unwrap();
        let id = assignments[0].id;

        let first = complete_assignment(&mut store, &config, user_id, id, Some(json!({"note": "done"})), at(50)).unwrap();
        assert!(matches!(first, CompletionOutcome::Completed(_)));

        let stats_before: Vec<(u32, u32)> = store.stats_for_user(user_id).iter().map(|s| (s.level, s.xp)).collect();
        let audit_before = store.audit_len();

        let second = complete_assignment(&mut store, &config, user_id, id, None, at(60)).unwrap();
        assert_eq!(second, CompletionOutcome::AlreadyCompleted);
        assert_eq!(second.message(), "Already completed.");
        assert_eq!(store.audit_len(), audit_before);
        let stats_after: Vec<(u32, u32)> = store.stats_for_user(user_id).iter().map(|s| (s.level, s.xp)).collect();
        assert_eq!(stats_before, stats_after);

        let stored = store.find_assignment(id).unwrap();
        assert_eq!(stored.proof_json.as_deref(), Some(r#"{"note":"done"}"#));
        assert_eq!(stored.completed_at, Some(at(50)));
    }

    #[test]
    fn test_completion_audit_records_breakdown() {
        let (mut store, config, user_id) = setup();
        let assignments = ensure_assignments_for_user(&mut store, &config, user_id, "2025-03-01").unwrap();
        let outcome = complete_assignment(&mut store, &config, user_id, assignments[0].id, None, at(50)).unwrap();
        let CompletionOutcome::Completed(report) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(report.xp_bonus, 0);
        assert_eq!(report.xp_total, report.xp_base);

        let event = store
            .audit_for_user(user_id)
            .into_iter()
            .find(|e| e.event_type == MISSION_COMPLETED)
            .unwrap();
        let meta: Value = serde_json::from_str(event.meta_json.as_deref().unwrap()).unwrap();
        assert_eq!(meta["assignment_id"], report.assignment_id);
        assert_eq!(meta["xp_total"], report.xp_total);
        assert_eq!(meta["stat_type"], report.stat.as_str());
    }

    #[test]
    fn test_social_mission_credits_kindness() {
        let (mut store, config, user_id) = setup();
        let mission = store.insert_mission(Mission {
            id: 0,
            title: "Send a kind message to someone".into(),
            category: MissionCategory::Social,
            difficulty: Difficulty::Easy,
            xp_reward: 12,
            is_hidden: false,
            geofence: None,
            created_for_date: "2025-03-01".into(),
            created_by_system: false,
        });
        let assignment = store.insert_assignment(MissionAssignment {
            id: 0,
            user_id,
            mission_id: mission.id,
            date: "2025-03-01".into(),
            status: AssignmentStatus::Pending,
            proof_json: None,
            completed_at: None,
        });

        let outcome = complete_assignment(&mut store, &config, user_id, assignment.id, None, at(10)).unwrap();
        let CompletionOutcome::Completed(report) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(report.stat, StatKind::Kindness);
        let kindness = store
            .stats_for_user(user_id)
            .into_iter()
            .find(|s| s.kind == StatKind::Kindness)
            .unwrap();
        assert_eq!(kindness.xp, 12);
    }

    #[test]
    fn test_foreign_or_failed_assignment_rejected() {
        let (mut store, config, user_id) = setup();
        let other = register_user(&mut store, "bo@example.com", "bo_b", "UTC", at(0)).unwrap();
        let assignments = ensure_assignments_for_user(&mut store, &config, user_id, "2025-03-01").unwrap();

        let stolen = complete_assignment(&mut store, &config, other.id, assignments[0].id, None, at(10));
        assert!(matches!(stolen, Err(EngineError::AssignmentNotFound(_))));

        let mut failed = assignments[1].clone();
        failed.status = AssignmentStatus::Failed;
        store.update_assignment(failed.clone());
        let result = complete_assignment(&mut store, &config, user_id, failed.id, None, at(10));
        assert!(matches!(result, Err(EngineError::NotPending { .. })));

        assert!(matches!(
            complete_assignment(&mut store, &config, user_id, 4242, None, at(10)),
            Err(EngineError::AssignmentNotFound(4242))
        ));
    }

    #[test]
    fn test_first_full_day_starts_streak_at_one() {
        let (mut store, config, user_id) = setup();
        let assignments = ensure_assignments_for_user(&mut store, &config, user_id, "2025-03-01").unwrap();

        for a in &assignments[..4] {
            complete_assignment(&mut store, &config, user_id, a.id, None, at(10)).unwrap();
            assert_eq!(streak(&store, user_id), 0);
        }
        complete_assignment(&mut store, &config, user_id, assignments[4].id, None, at(10)).unwrap();
        assert_eq!(streak(&store, user_id), 1);
    }

    #[test]
    fn test_consecutive_days_increment_and_gap_resets() {
        let (mut store, config, user_id) = setup();

        complete_day(&mut store, &config, user_id, "2025-03-01");
        assert_eq!(streak(&store, user_id), 1);

        complete_day(&mut store, &config, user_id, "2025-03-02");
        assert_eq!(streak(&store, user_id), 2);

        // 03-03 skipped
        complete_day(&mut store, &config, user_id, "2025-03-04");
        assert_eq!(streak(&store, user_id), 1);
    }

    #[test]
    fn test_streak_bonus_applies_on_continuing_day() {
        let (mut store, config, user_id) = setup();
        complete_day(&mut store, &config, user_id, "2025-03-01");
        complete_day(&mut store, &config, user_id, "2025-03-02");

        // streak 2 going into day three: +10%
        let outcomes = complete_day(&mut store, &config, user_id, "2025-03-03");
        for outcome in outcomes {
            let CompletionOutcome::Completed(report) = outcome else {
                panic!("expected completion");
            };
            let expected = (report.xp_base as f64 * 0.10).round_ties_even() as u32;
            assert_eq!(report.xp_bonus, expected);
            assert_eq!(report.xp_total, report.xp_base + expected);
        }
        assert_eq!(streak(&store, user_id), 3);
    }

    #[test]
    fn test_streak_counts_each_day_once() {
        let (mut store, config, user_id) = setup();
        complete_day(&mut store, &config, user_id, "2025-03-01");
        let events_before = store
            .audit_for_user(user_id)
            .iter()
            .filter(|e| e.event_type == STREAK_UPDATED)
            .count();

        assert_eq!(update_streak_for_day(&mut store, user_id, "2025-03-01", at(20)).unwrap(), None);
        assert_eq!(streak(&store, user_id), 1);
        let events_after = store
            .audit_for_user(user_id)
            .iter()
            .filter(|e| e.event_type == STREAK_UPDATED)
            .count();
        assert_eq!(events_before, events_after);
    }

    #[test]
    fn test_late_completion_of_past_day_keeps_streak() {
        let (mut store, config, user_id) = setup();
        let day_one = ensure_assignments_for_user(&mut store, &config, user_id, "2025-03-01").unwrap();
        for a in &day_one[..4] {
            complete_assignment(&mut store, &config, user_id, a.id, None, at(10)).unwrap();
        }
        complete_day(&mut store, &config, user_id, "2025-03-02");
        complete_day(&mut store, &config, user_id, "2025-03-03");
        assert_eq!(streak(&store, user_id), 2);

        // finishing 03-01 afterwards must not rewind the chain
        complete_assignment(&mut store, &config, user_id, day_one[4].id, None, at(20)).unwrap();
        let profile = store.find_profile(user_id).unwrap();
        assert_eq!(profile.streak_count, 2);
        assert_eq!(profile.streak_last_date.as_deref(), Some("2025-03-03"));

        let outcomes = complete_day(&mut store, &config, user_id, "2025-03-04");
        let CompletionOutcome::Completed(report) = &outcomes[0] else {
            panic!("expected completion");
        };
        assert_eq!(report.xp_bonus, (report.xp_base as f64 * 0.10).round_ties_even() as u32);
        assert_eq!(streak(&store, user_id), 3);
    }

    #[test]
    fn test_user_mission_does_not_replace_daily_set() {
        let (mut store, config, user_id) = setup();
        store.insert_mission(Mission {
            id: 0,
            title: "Write a letter to a friend".into(),
            category: MissionCategory::Social,
            difficulty: Difficulty::Easy,
            xp_reward: 12,
            is_hidden: false,
            geofence: None,
            created_for_date: "2025-03-01".into(),
            created_by_system: false,
        });

        let daily = ensure_daily_missions(&mut store, &config, "2025-03-01");
        assert_eq!(daily.len(), 5);
        assert!(daily.iter().all(|m| m.created_by_system));
        let assignments = ensure_assignments_for_user(&mut store, &config, user_id, "2025-03-01").unwrap();
        assert_eq!(assignments.len(), 5);
    }

    #[test]
    fn test_assignment_row_flattens_mission() {
        let (mut store, config, user_id) = setup();
        let assignments = ensure_assignments_for_user(&mut store, &config, user_id, "2025-03-01").unwrap();
        complete_assignment(&mut store, &config, user_id, assignments[0].id, None, at(30)).unwrap();

        let assignment = store.find_assignment(assignments[0].id).unwrap();
        let mission = store.find_mission(assignment.mission_id).unwrap();
        let row = assignment_row(&assignment, &mission);
        assert_eq!(row.assignment_id, assignment.id);
        assert_eq!(row.mission_id, mission.id);
        assert_eq!(row.date, "2025-03-01");
        assert_eq!(row.status, AssignmentStatus::Completed);
        assert_eq!(row.completed_at, Some(at(30)));
        assert_eq!(row.title, mission.title);
        assert_eq!(row.xp_reward, mission.xp_reward);
        assert!(!row.is_hidden);
    }
}
