//! Storage seam for the engine.
//!
//! `ProgressStore` exposes entity-level operations only; the engine never
//! sees SpacetimeDB handles. `TableStore` (see `table_store.rs`) backs it
//! with module tables inside a reducer transaction, `MemoryStore` keeps
//! everything in process for tests and native callers.

use crate::tables::{AuditLog, Mission, MissionAssignment, Profile, RankSnapshot, Stat, User};

/// Entity operations the progression engine needs.
///
/// Inserts ignore the incoming `id` and return the stored row with its
/// assigned id, mirroring `#[auto_inc]` tables.
pub trait ProgressStore {
    // users
    fn find_user(&self, user_id: u64) -> Option<User>;
    fn find_user_by_email(&self, email: &str) -> Option<User>;
    fn users(&self) -> Vec<User>;
    fn insert_user(&mut self, user: User) -> User;
    fn update_user(&mut self, user: User);
    fn delete_user(&mut self, user_id: u64) -> bool;

    // profiles
    fn find_profile(&self, user_id: u64) -> Option<Profile>;
    fn upsert_profile(&mut self, profile: Profile);
    fn delete_profile(&mut self, user_id: u64) -> bool;

    // stats
    fn stats_for_user(&self, user_id: u64) -> Vec<Stat>;
    fn insert_stat(&mut self, stat: Stat) -> Stat;
    fn update_stat(&mut self, stat: Stat);
    fn delete_stats_for_user(&mut self, user_id: u64) -> usize;

    // missions
    fn find_mission(&self, mission_id: u64) -> Option<Mission>;
    fn missions_for_date(&self, date: &str) -> Vec<Mission>;
    fn insert_mission(&mut self, mission: Mission) -> Mission;

    // assignments
    fn find_assignment(&self, assignment_id: u64) -> Option<MissionAssignment>;
    fn assignments_for_user(&self, user_id: u64) -> Vec<MissionAssignment>;
    fn insert_assignment(&mut self, assignment: MissionAssignment) -> MissionAssignment;
    fn update_assignment(&mut self, assignment: MissionAssignment);
    fn delete_assignments_for_user(&mut self, user_id: u64) -> usize;

    // audit log (append-only outside of account wipes)
    fn append_audit(&mut self, entry: AuditLog) -> AuditLog;
    fn audit_for_user(&self, user_id: u64) -> Vec<AuditLog>;
    fn delete_audit_for_user(&mut self, user_id: u64) -> usize;

    // rank snapshots
    fn snapshots(&self) -> Vec<RankSnapshot>;
    fn insert_snapshot(&mut self, snapshot: RankSnapshot) -> RankSnapshot;
    fn delete_snapshot(&mut self, snapshot_id: u64) -> bool;

    /// Assignments of one user on one date
    fn assignments_for_user_on(&self, user_id: u64, date: &str) -> Vec<MissionAssignment> {
        self.assignments_for_user(user_id)
            .into_iter()
            .filter(|a| a.date == date)
            .collect()
    }
}

/// In-process store. Exclusive `&mut` access serializes every mutation,
/// and `transaction` gives all-or-nothing units of work.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    users: Vec<User>,
    profiles: Vec<Profile>,
    stats: Vec<Stat>,
    missions: Vec<Mission>,
    assignments: Vec<MissionAssignment>,
    audit: Vec<AuditLog>,
    snapshots: Vec<RankSnapshot>,
    next_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Run `f` against the store; if it fails, every write it made is undone
    pub fn transaction<T, E>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, E>) -> Result<T, E> {
        let checkpoint = self.clone();
        let result = f(self);
        if result.is_err() {
            *self = checkpoint;
        }
        result
    }

    pub fn missions(&self) -> &[Mission] {
        &self.missions
    }

    pub fn audit_len(&self) -> usize {
        self.audit.len()
    }
}

impl ProgressStore for MemoryStore {
    fn find_user(&self, user_id: u64) -> Option<User> {
        self.users.iter().find(|u| u.id == user_id).cloned()
    }

    fn find_user_by_email(&self, email: &str) -> Option<User> {
        self.users.iter().find(|u| u.email == email).cloned()
    }

    fn users(&self) -> Vec<User> {
        self.users.clone()
    }

    fn insert_user(&mut self, mut user: User) -> User {
        user.id = self.allocate_id();
        self.users.push(user.clone());
        user
    }

    fn update_user(&mut self, user: User) {
        if let Some(row) = self.users.iter_mut().find(|u| u.id == user.id) {
            *row = user;
        }
    }

    fn delete_user(&mut self, user_id: u64) -> bool {
        let before = self.users.len();
        self.users.retain(|u| u.id != user_id);
        self.users.len() != before
    }

    fn find_profile(&self, user_id: u64) -> Option<Profile> {
        self.profiles.iter().find(|p| p.user_id == user_id).cloned()
    }

    fn upsert_profile(&mut self, profile: Profile) {
        match self.profiles.iter_mut().find(|p| p.user_id == profile.user_id) {
            Some(row) => *row = profile,
            None => self.profiles.push(profile),
        }
    }

    fn delete_profile(&mut self, user_id: u64) -> bool {
        let before = self.profiles.len();
        self.profiles.retain(|p| p.user_id != user_id);
        self.profiles.len() != before
    }

    fn stats_for_user(&self, user_id: u64) -> Vec<Stat> {
        self.stats.iter().filter(|s| s.user_id == user_id).cloned().collect()
    }

    fn insert_stat(&mut self, mut stat: Stat) -> Stat {
        stat.id = self.allocate_id();
        self.stats.push(stat.clone());
        stat
    }

    fn update_stat(&mut self, stat: Stat) {
        if let Some(row) = self.stats.iter_mut().find(|s| s.id == stat.id) {
            *row = stat;
        }
    }

    fn delete_stats_for_user(&mut self, user_id: u64) -> usize {
        let before = self.stats.len();
        self.stats.retain(|s| s.user_id != user_id);
        before - self.stats.len()
    }

    fn find_mission(&self, mission_id: u64) -> Option<Mission> {
        self.missions.iter().find(|m| m.id == mission_id).cloned()
    }

    fn missions_for_date(&self, date: &str) -> Vec<Mission> {
        self.missions.iter().filter(|m| m.created_for_date == date).cloned().collect()
    }

    fn insert_mission(&mut self, mut mission: Mission) -> Mission {
        mission.id = self.allocate_id();
        self.missions.push(mission.clone());
        mission
    }

    fn find_assignment(&self, assignment_id: u64) -> Option<MissionAssignment> {
        self.assignments.iter().find(|a| a.id == assignment_id).cloned()
    }

    fn assignments_for_user(&self, user_id: u64) -> Vec<MissionAssignment> {
        self.assignments.iter().filter(|a| a.user_id == user_id).cloned().collect()
    }

    fn insert_assignment(&mut self, mut assignment: MissionAssignment) -> MissionAssignment {
        assignment.id = self.allocate_id();
        self.assignments.push(assignment.clone());
        assignment
    }

    fn update_assignment(&mut self, assignment: MissionAssignment) {
        if let Some(row) = self.assignments.iter_mut().find(|a| a.id == assignment.id) {
            *row = assignment;
        }
    }

    fn delete_assignments_for_user(&mut self, user_id: u64) -> usize {
        let before = self.assignments.len();
        self.assignments.retain(|a| a.user_id != user_id);
        before - self.assignments.len()
    }

    fn append_audit(&mut self, mut entry: AuditLog) -> AuditLog {
        entry.id = self.allocate_id();
        self.audit.push(entry.clone());
        entry
    }

    fn audit_for_user(&self, user_id: u64) -> Vec<AuditLog> {
        self.audit.iter().filter(|e| e.user_id == user_id).cloned().collect()
    }

    fn delete_audit_for_user(&mut self, user_id: u64) -> usize {
        let before = self.audit.len();
        self.audit.retain(|e| e.user_id != user_id);
        before - self.audit.len()
    }

    fn snapshots(&self) -> Vec<RankSnapshot> {
        self.snapshots.clone()
    }

    fn insert_snapshot(&mut self, mut snapshot: RankSnapshot) -> RankSnapshot {
        snapshot.id = self.allocate_id();
        self.snapshots.push(snapshot.clone());
        snapshot
    }

    fn delete_snapshot(&mut self, snapshot_id: u64) -> bool {
        let before = self.snapshots.len();
        self.snapshots.retain(|s| s.id != snapshot_id);
        self.snapshots.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacetimedb::Timestamp;

    fn user(handle: &str) -> User {
        User {
            id: 0,
            email: format!("{}@example.com", handle),
            handle: handle.to_string(),
            consent_leaderboard: false,
            consent_location: false,
            city: None,
            region: None,
            created_at: Timestamp::from_micros_since_unix_epoch(0),
        }
    }

    #[test]
    fn test_insert_assigns_fresh_ids() {
        let mut store = MemoryStore::new();
        let a = store.insert_user(user("alpha"));
        let b = store.insert_user(user("bravo"));
        assert_ne!(a.id, 0);
        assert_ne!(a.id, b.id);
        assert_eq!(store.find_user(b.id).map(|u| u.handle), Some("bravo".to_string()));
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let mut store = MemoryStore::new();
        store.insert_user(user("keeper"));

        let result: Result<(), &str> = store.transaction(|s| {
            s.insert_user(user("ghost"));
            Err("boom")
        });
        assert!(result.is_err());
        assert!(store.users().iter().all(|u| u.handle != "ghost"));
        assert_eq!(store.users().len(), 1);

        let ok: Result<u64, &str> = store.transaction(|s| Ok(s.insert_user(user("stays")).id));
        assert!(ok.is_ok());
        assert_eq!(store.users().len(), 2);
    }
}
