use spacetimedb::{
    client_visibility_filter, reducer, view, Filter, Identity, ReducerContext, Table,
};

pub mod account;
pub mod clock;
pub mod config;
pub mod curve;
pub mod error;
pub mod geo;
pub mod leaderboard;
pub mod missions;
pub mod store;
pub mod table_store;
pub mod tables;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use store::{MemoryStore, ProgressStore};
pub use table_store::TableStore;

use account::SettingsUpdate;
use clock::DayClock;
use leaderboard::LeaderboardQuery;
use tables::{
    authorized_worker, data_export, engine_config, mission__view, mission_assignment__view, profile,
    profile__view, session, session__view, stat__view, user_account, AuthorizedWorker, DataExport,
    EngineConfigRow, LocalBy, MyAssignment, Period, Profile, Scope, Session, Stat, User,
};

// ==================== CONSTANTS ====================

/// Single row id of the active engine configuration
const CONFIG_ROW_ID: u32 = 0;

// ==================== HELPERS ====================

fn is_authorized(ctx: &ReducerContext) -> bool {
    ctx.db.authorized_worker().identity().find(&ctx.sender).is_some()
}

/// Active configuration; defaults when the row is missing or unreadable
fn load_config(ctx: &ReducerContext) -> EngineConfig {
    let Some(row) = ctx.db.engine_config().id().find(&CONFIG_ROW_ID) else {
        return EngineConfig::default();
    };
    EngineConfig::from_json(&row.json).unwrap_or_else(|e| {
        log::warn!("[CONFIG] stored config unreadable, using defaults: {}", e);
        EngineConfig::default()
    })
}

/// Get the user behind the sender's session
fn get_user(ctx: &ReducerContext) -> std::result::Result<User, String> {
    let session = ctx.db.session()
        .connection_id()
        .find(&ctx.sender)
        .ok_or("No session found".to_string())?;

    ctx.db.user_account()
        .id()
        .find(&session.user_id)
        .ok_or("User not found".to_string())
}

/// "Today" in the user's own timezone
fn user_clock(ctx: &ReducerContext, user_id: u64) -> DayClock {
    match ctx.db.profile().user_id().find(&user_id) {
        Some(profile) => DayClock::for_zone(ctx.timestamp, &profile.timezone),
        None => DayClock::utc(ctx.timestamp),
    }
}

fn bind_session(ctx: &ReducerContext, connection_id: Identity, user_id: u64) {
    // same connection re-binding, or same user reconnecting uncleanly
    let stale: Vec<Identity> = ctx.db.session()
        .iter()
        .filter(|s| s.connection_id == connection_id || s.user_id == user_id)
        .map(|s| s.connection_id)
        .collect();
    for conn_id in stale {
        ctx.db.session().connection_id().delete(&conn_id);
    }

    ctx.db.session().insert(Session {
        connection_id,
        user_id,
        connected_at: ctx.timestamp,
    });
}

// ==================== VIEWS ====================

/// The caller's own profile (the table itself is private)
#[view(name = my_profile, public)]
fn my_profile(ctx: &spacetimedb::ViewContext) -> Option<Profile> {
    let session = ctx.db.session().connection_id().find(ctx.sender)?;
    ctx.db.profile().user_id().find(&session.user_id)
}

/// Caller's assignments joined with their missions; geofences stay server-side
#[view(name = my_assignments, public)]
fn my_assignments(ctx: &spacetimedb::ViewContext) -> Vec<MyAssignment> {
    let Some(session) = ctx.db.session().connection_id().find(ctx.sender) else {
        return Vec::new();
    };
    ctx.db.mission_assignment()
        .user_id()
        .filter(&session.user_id)
        .filter_map(|a| {
            let mission = ctx.db.mission().id().find(&a.mission_id)?;
            Some(missions::assignment_row(&a, &mission))
        })
        .collect()
}

#[view(name = my_stats, public)]
fn my_stats(ctx: &spacetimedb::ViewContext) -> Vec<Stat> {
    let Some(session) = ctx.db.session().connection_id().find(ctx.sender) else {
        return Vec::new();
    };
    ctx.db.stat().user_id().filter(&session.user_id).collect()
}

// ==================== ROW LEVEL SECURITY ====================

/// RLS Filter: only authorized workers see pending data exports
#[client_visibility_filter]
const DATA_EXPORT_VISIBILITY: Filter = Filter::Sql(
    "SELECT de.* FROM data_export de
     JOIN authorized_worker aw WHERE aw.identity = :sender"
);

// ==================== ADMIN REDUCERS ====================

#[reducer(init)]
pub fn init(ctx: &ReducerContext) {
    // In init, ctx.sender is the module owner identity
    if ctx.db.authorized_worker().identity().find(&ctx.sender).is_none() {
        ctx.db.authorized_worker().insert(AuthorizedWorker {
            identity: ctx.sender,
        });
    }

    if ctx.db.engine_config().id().find(&CONFIG_ROW_ID).is_none() {
        match EngineConfig::default().to_json() {
            Ok(json) => {
                ctx.db.engine_config().insert(EngineConfigRow { id: CONFIG_ROW_ID, json });
            }
            Err(e) => log::error!("[CONFIG] failed to seed defaults: {}", e),
        }
    }

    log::info!("SoulSync progression module initialized");
}

/// Replace the engine configuration (partial JSON is merged over defaults)
#[reducer]
pub fn set_engine_config(ctx: &ReducerContext, json: String) -> std::result::Result<(), String> {
    if !is_authorized(ctx) {
        log::warn!("Unauthorized set_engine_config attempt by {}", ctx.sender);
        return Err("Unauthorized".to_string());
    }

    let config = EngineConfig::from_json(&json).map_err(|e| e.to_string())?;
    let json = config.to_json().map_err(|e| e.to_string())?;

    if ctx.db.engine_config().id().find(&CONFIG_ROW_ID).is_some() {
        ctx.db.engine_config().id().update(EngineConfigRow { id: CONFIG_ROW_ID, json });
    } else {
        ctx.db.engine_config().insert(EngineConfigRow { id: CONFIG_ROW_ID, json });
    }

    log::info!(
        "[CONFIG] updated catalog={} hidden_spots={} daily={}",
        config.catalog.len(), config.hidden_spots.len(), config.daily_mission_count
    );
    Ok(())
}

/// Bind a verified client identity to an existing user.
/// Only authorized workers (the auth gateway) can call this.
#[reducer]
pub fn create_session(ctx: &ReducerContext, client_identity: String, user_id: u64) -> std::result::Result<(), String> {
    if !is_authorized(ctx) {
        log::warn!("Unauthorized create_session attempt by {}", ctx.sender);
        return Err("Unauthorized: only gateway can create sessions".to_string());
    }

    let identity = Identity::from_hex(&client_identity)
        .map_err(|_| "Invalid identity hex string".to_string())?;
    if ctx.db.user_account().id().find(&user_id).is_none() {
        return Err(EngineError::UserNotFound(user_id).to_string());
    }

    bind_session(ctx, identity, user_id);
    log::info!("[SESSION] created user_id={} ws:{}", user_id, &client_identity[..8.min(client_identity.len())]);
    Ok(())
}

/// Worker acknowledges delivery of an export; the row is dropped
#[reducer]
pub fn mark_export_delivered(ctx: &ReducerContext, export_id: u64) -> std::result::Result<(), String> {
    if !is_authorized(ctx) {
        log::warn!("Unauthorized mark_export_delivered attempt by {}", ctx.sender);
        return Err("Unauthorized".to_string());
    }
    if !ctx.db.data_export().id().delete(&export_id) {
        return Err(format!("Export not found: {}", export_id));
    }
    log::info!("[EXPORT] delivered export_id={}", export_id);
    Ok(())
}

/// Clean up session when a client disconnects
#[reducer(client_disconnected)]
pub fn on_disconnect(ctx: &ReducerContext) {
    if let Some(session) = ctx.db.session().connection_id().find(&ctx.sender) {
        let minutes = ctx.timestamp.duration_since(session.connected_at)
            .map(|d| d.as_secs())
            .unwrap_or(0) as f32 / 60.0;
        log::info!("[DISCONNECT] user_id={} session_min:{:.1}", session.user_id, minutes);
        ctx.db.session().connection_id().delete(&ctx.sender);
    }
}

// ==================== USER REDUCERS ====================

/// Register a new account and bind it to the calling connection
#[reducer]
pub fn sign_up(
    ctx: &ReducerContext,
    email: String,
    handle: String,
    timezone: String,
) -> std::result::Result<(), String> {
    let mut store = TableStore::new(ctx);
    let user = account::register_user(&mut store, &email, &handle, &timezone, ctx.timestamp)
        .map_err(|e| {
            log::warn!("[ACCOUNT] sign_up rejected: {}", e);
            e.to_string()
        })?;

    bind_session(ctx, ctx.sender, user.id);
    Ok(())
}

#[reducer]
#[allow(clippy::too_many_arguments)]
pub fn update_settings(
    ctx: &ReducerContext,
    consent_location: Option<bool>,
    consent_leaderboard: Option<bool>,
    city: Option<String>,
    region: Option<String>,
    avatar_url: Option<String>,
    goals_json: Option<String>,
    timezone: Option<String>,
) -> std::result::Result<(), String> {
    let user = get_user(ctx)?;
    let mut store = TableStore::new(ctx);
    let update = SettingsUpdate {
        consent_location,
        consent_leaderboard,
        city,
        region,
        avatar_url,
        goals_json,
        timezone,
    };
    account::update_settings(&mut store, user.id, update, ctx.timestamp).map_err(|e| e.to_string())?;
    Ok(())
}

/// Make sure today's missions exist and are assigned to the caller
#[reducer]
pub fn refresh_missions(ctx: &ReducerContext) -> std::result::Result<(), String> {
    let user = get_user(ctx)?;
    let config = load_config(ctx);
    let clock = user_clock(ctx, user.id);
    let mut store = TableStore::new(ctx);

    account::record_login(&mut store, user.id, ctx.timestamp).map_err(|e| e.to_string())?;
    let board = missions::todays_assignments(&mut store, &config, user.id, &clock).map_err(|e| e.to_string())?;

    let done = board
        .entries
        .iter()
        .filter(|e| e.assignment.status == tables::AssignmentStatus::Completed)
        .count();
    log::info!(
        "[MISSION] board user_id={} date={} total={} done={} cleared={}",
        user.id, board.date, board.entries.len(), done, board.all_completed()
    );
    Ok(())
}

#[reducer]
pub fn complete_mission(
    ctx: &ReducerContext,
    assignment_id: u64,
    proof_json: Option<String>,
) -> std::result::Result<(), String> {
    let user = get_user(ctx)?;
    let config = load_config(ctx);
    let proof = match proof_json {
        Some(raw) => Some(
            serde_json::from_str::<serde_json::Value>(&raw)
                .map_err(|e| EngineError::InvalidInput(format!("proof must be JSON: {}", e)).to_string())?,
        ),
        None => None,
    };

    let mut store = TableStore::new(ctx);
    let outcome = missions::complete_assignment(&mut store, &config, user.id, assignment_id, proof, ctx.timestamp)
        .map_err(|e| e.to_string())?;
    log::debug!("[MISSION] user_id={} {}", user.id, outcome.message());
    Ok(())
}

/// One-shot location scan; the coordinates are not stored anywhere
#[reducer]
pub fn scan_hidden_missions(ctx: &ReducerContext, lat: f64, lon: f64) -> std::result::Result<(), String> {
    let user = get_user(ctx)?;
    if !user.consent_location {
        log::warn!("[HIDDEN] scan without location consent user_id={}", user.id);
        return Err("Location consent is off".to_string());
    }

    let config = load_config(ctx);
    let clock = user_clock(ctx, user.id);
    let mut store = TableStore::new(ctx);
    let report = geo::unlock_hidden_missions(&mut store, &config, user.id, &clock, lat, lon)
        .map_err(|e| e.to_string())?;
    log::debug!("[HIDDEN] user_id={} {}", user.id, report.message());
    Ok(())
}

/// Rebuild one leaderboard's snapshot rows.
/// Local boards default to the caller's own region or city.
#[reducer]
pub fn refresh_leaderboard(
    ctx: &ReducerContext,
    scope: Scope,
    period: Period,
    local_by: Option<LocalBy>,
    local_value: Option<String>,
) -> std::result::Result<(), String> {
    let user = get_user(ctx)?;
    if !user.consent_leaderboard {
        return Err("Leaderboard consent is off".to_string());
    }

    let config = load_config(ctx);
    let local_by = local_by.unwrap_or_default();
    let local_value = local_value.or_else(|| match local_by {
        LocalBy::City => user.city.clone(),
        LocalBy::Region => user.region.clone(),
    });
    let query = LeaderboardQuery {
        scope,
        period,
        local_by,
        local_value,
        limit: config.leaderboard_limit,
    };

    let mut store = TableStore::new(ctx);
    leaderboard::recalc_leaderboard(&mut store, &config, &query, ctx.timestamp);
    Ok(())
}

/// Queue a minimal personal-data export for worker delivery
#[reducer]
pub fn request_export(ctx: &ReducerContext) -> std::result::Result<(), String> {
    let user = get_user(ctx)?;
    let store = TableStore::new(ctx);
    let payload = account::export_user_data(&store, user.id, ctx.timestamp).map_err(|e| e.to_string())?;

    let row = ctx.db.data_export().insert(DataExport {
        id: 0,
        user_id: user.id,
        payload: payload.to_string(),
        created_at: ctx.timestamp,
    });
    log::info!("[EXPORT] queued user_id={} export_id={}", user.id, row.id);
    Ok(())
}

/// Full wipe of the caller's account and every row it owns
#[reducer]
pub fn delete_my_account(ctx: &ReducerContext) -> std::result::Result<(), String> {
    let user = get_user(ctx)?;
    let mut store = TableStore::new(ctx);
    account::delete_account(&mut store, user.id).map_err(|e| e.to_string())?;

    let exports: Vec<u64> = ctx.db.data_export().user_id().filter(&user.id).map(|e| e.id).collect();
    for id in exports {
        ctx.db.data_export().id().delete(&id);
    }
    let sessions: Vec<Identity> = ctx.db.session().user_id().filter(&user.id).map(|s| s.connection_id).collect();
    for conn_id in sessions {
        ctx.db.session().connection_id().delete(&conn_id);
    }
    Ok(())
}
