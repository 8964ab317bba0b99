// Location-gated hidden missions.
//
// Coordinates arrive as plain reducer arguments and stop here: they feed
// the distance check and are never stored or logged.

use serde_json::json;

use crate::account::{audit, require_user};
use crate::clock::{day_key, DayClock};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::store::ProgressStore;
use crate::tables::{AssignmentStatus, Geofence, Mission, MissionAssignment};

pub const HIDDEN_MISSION_UNLOCKED: &str = "hidden_mission_unlocked";

const EARTH_RADIUS_M: f64 = 6_371_000.0;
const RULE_KIND_RADIUS: &str = "radius";
const UNLOCK_SOURCE: &str = "client_geolocation";

/// Great-circle distance in meters
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

impl Geofence {
    pub fn distance_m(&self, lat: f64, lon: f64) -> f64 {
        haversine_m(lat, lon, self.lat, self.lon)
    }

    /// Boundary counts as inside
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.distance_m(lat, lon) <= self.radius_m
    }
}

fn check_coordinates(lat: f64, lon: f64) -> Result<()> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(EngineError::InvalidInput("coordinates out of range".into()));
    }
    Ok(())
}

/// One hidden mission per configured spot for `date`, created once by (title, date)
pub fn ensure_hidden_missions_for_day<S: ProgressStore>(
    store: &mut S,
    config: &EngineConfig,
    date: &str,
) -> Vec<Mission> {
    let mut hidden: Vec<Mission> = store
        .missions_for_date(date)
        .into_iter()
        .filter(|m| m.is_hidden)
        .collect();

    for spot in &config.hidden_spots {
        if hidden.iter().any(|m| m.title == spot.title) {
            continue;
        }
        hidden.push(store.insert_mission(Mission {
            id: 0,
            title: spot.title.clone(),
            category: spot.category,
            difficulty: spot.difficulty,
            xp_reward: spot.xp_reward,
            is_hidden: true,
            geofence: Some(spot.geofence),
            created_for_date: date.to_string(),
            created_by_system: true,
        }));
    }
    hidden
}

/// Hidden missions of `date` whose geofence contains the point, nearest first
pub fn find_nearby_hidden_missions<S: ProgressStore>(store: &S, date: &str, lat: f64, lon: f64) -> Vec<Mission> {
    let mut nearby: Vec<(f64, Mission)> = store
        .missions_for_date(date)
        .into_iter()
        .filter(|m| m.is_hidden)
        .filter_map(|m| {
            let fence = m.geofence?;
            fence.contains(lat, lon).then(|| (fence.distance_m(lat, lon), m))
        })
        .collect();
    nearby.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.id.cmp(&b.1.id)));
    nearby.into_iter().map(|(_, m)| m).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockedMission {
    pub mission_id: u64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockReport {
    pub date: String,
    pub unlocked: Vec<UnlockedMission>,
    /// Nearby spots the user had already unlocked today
    pub already_unlocked: usize,
}

impl UnlockReport {
    pub fn message(&self) -> String {
        match (self.unlocked.len(), self.already_unlocked) {
            (0, 0) => "No hidden missions nearby right now. Try again later!".to_string(),
            (0, _) => "Hidden missions found, but you already unlocked them today.".to_string(),
            (n, _) => format!("Unlocked {} hidden mission(s)!", n),
        }
    }
}

/// Scan one (lat, lon) against today's hidden spots and hand out at most
/// `max_unlocks_per_scan` new pending assignments
pub fn unlock_hidden_missions<S: ProgressStore>(
    store: &mut S,
    config: &EngineConfig,
    user_id: u64,
    clock: &DayClock,
    lat: f64,
    lon: f64,
) -> Result<UnlockReport> {
    require_user(store, user_id)?;
    check_coordinates(lat, lon)?;

    let date = day_key(clock.today());
    ensure_hidden_missions_for_day(store, config, &date);

    let nearby = find_nearby_hidden_missions(store, &date, lat, lon);
    let assigned: Vec<u64> = store
        .assignments_for_user_on(user_id, &date)
        .into_iter()
        .map(|a| a.mission_id)
        .collect();

    let (already, fresh): (Vec<Mission>, Vec<Mission>) =
        nearby.into_iter().partition(|m| assigned.contains(&m.id));

    let mut unlocked = Vec::new();
    for mission in fresh.into_iter().take(config.max_unlocks_per_scan) {
        store.insert_assignment(MissionAssignment {
            id: 0,
            user_id,
            mission_id: mission.id,
            date: date.clone(),
            status: AssignmentStatus::Pending,
            proof_json: None,
            completed_at: None,
        });

        audit(
            store,
            user_id,
            HIDDEN_MISSION_UNLOCKED,
            Some(json!({
                "mission_id": mission.id,
                "date": date,
                "rule_kind": RULE_KIND_RADIUS,
                "radius_m": mission.geofence.map(|g| g.radius_m),
                "source": UNLOCK_SOURCE,
            })),
            clock.now,
        );

        unlocked.push(UnlockedMission { mission_id: mission.id, title: mission.title });
    }

    log::info!(
        "[HIDDEN] scan user_id={} date={} unlocked={} already_unlocked={}",
        user_id, date, unlocked.len(), already.len()
    );

    Ok(UnlockReport { date, unlocked, already_unlocked: already.len() })
}
