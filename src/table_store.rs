// ProgressStore over module tables. Lives only inside a reducer, so every
// call made through it belongs to that reducer's transaction.

use spacetimedb::{ReducerContext, Table};

use crate::store::ProgressStore;
use crate::tables::{
    audit_log, mission, mission_assignment, profile, rank_snapshot, stat, user_account,
    AuditLog, Mission, MissionAssignment, Profile, RankSnapshot, Stat, User,
};

pub struct TableStore<'a> {
    ctx: &'a ReducerContext,
}

impl<'a> TableStore<'a> {
    pub fn new(ctx: &'a ReducerContext) -> Self {
        Self { ctx }
    }
}

impl ProgressStore for TableStore<'_> {
    fn find_user(&self, user_id: u64) -> Option<User> {
        self.ctx.db.user_account().id().find(&user_id)
    }

    fn find_user_by_email(&self, email: &str) -> Option<User> {
        self.ctx.db.user_account().email().find(&email.to_string())
    }

    fn users(&self) -> Vec<User> {
        self.ctx.db.user_account().iter().collect()
    }

    fn insert_user(&mut self, user: User) -> User {
        self.ctx.db.user_account().insert(User { id: 0, ..user })
    }

    fn update_user(&mut self, user: User) {
        self.ctx.db.user_account().id().update(user);
    }

    fn delete_user(&mut self, user_id: u64) -> bool {
        self.ctx.db.user_account().id().delete(&user_id)
    }

    fn find_profile(&self, user_id: u64) -> Option<Profile> {
        self.ctx.db.profile().user_id().find(&user_id)
    }

    fn upsert_profile(&mut self, profile: Profile) {
        if self.ctx.db.profile().user_id().find(&profile.user_id).is_some() {
            self.ctx.db.profile().user_id().update(profile);
        } else {
            self.ctx.db.profile().insert(profile);
        }
    }

    fn delete_profile(&mut self, user_id: u64) -> bool {
        self.ctx.db.profile().user_id().delete(&user_id)
    }

    fn stats_for_user(&self, user_id: u64) -> Vec<Stat> {
        self.ctx.db.stat().user_id().filter(&user_id).collect()
    }

    fn insert_stat(&mut self, stat: Stat) -> Stat {
        self.ctx.db.stat().insert(Stat { id: 0, ..stat })
    }

    fn update_stat(&mut self, stat: Stat) {
        self.ctx.db.stat().id().update(stat);
    }

    fn delete_stats_for_user(&mut self, user_id: u64) -> usize {
        let ids: Vec<u64> = self.ctx.db.stat().user_id().filter(&user_id).map(|s| s.id).collect();
        for id in &ids {
            self.ctx.db.stat().id().delete(id);
        }
        ids.len()
    }

    fn find_mission(&self, mission_id: u64) -> Option<Mission> {
        self.ctx.db.mission().id().find(&mission_id)
    }

    fn missions_for_date(&self, date: &str) -> Vec<Mission> {
        self.ctx.db.mission().created_for_date().filter(&date.to_string()).collect()
    }

    fn insert_mission(&mut self, mission: Mission) -> Mission {
        self.ctx.db.mission().insert(Mission { id: 0, ..mission })
    }

    fn find_assignment(&self, assignment_id: u64) -> Option<MissionAssignment> {
        self.ctx.db.mission_assignment().id().find(&assignment_id)
    }

    fn assignments_for_user(&self, user_id: u64) -> Vec<MissionAssignment> {
        self.ctx.db.mission_assignment().user_id().filter(&user_id).collect()
    }

    fn insert_assignment(&mut self, assignment: MissionAssignment) -> MissionAssignment {
        self.ctx.db.mission_assignment().insert(MissionAssignment { id: 0, ..assignment })
    }

    fn update_assignment(&mut self, assignment: MissionAssignment) {
        self.ctx.db.mission_assignment().id().update(assignment);
    }

    fn delete_assignments_for_user(&mut self, user_id: u64) -> usize {
        let ids: Vec<u64> = self.ctx.db.mission_assignment()
            .user_id()
            .filter(&user_id)
            .map(|a| a.id)
            .collect();
        for id in &ids {
            self.ctx.db.mission_assignment().id().delete(id);
        }
        ids.len()
    }

    fn append_audit(&mut self, entry: AuditLog) -> AuditLog {
        self.ctx.db.audit_log().insert(AuditLog { id: 0, ..entry })
    }

    fn audit_for_user(&self, user_id: u64) -> Vec<AuditLog> {
        self.ctx.db.audit_log().user_id().filter(&user_id).collect()
    }

    fn delete_audit_for_user(&mut self, user_id: u64) -> usize {
        let ids: Vec<u64> = self.ctx.db.audit_log().user_id().filter(&user_id).map(|e| e.id).collect();
        for id in &ids {
            self.ctx.db.audit_log().id().delete(id);
        }
        ids.len()
    }

    fn snapshots(&self) -> Vec<RankSnapshot> {
        self.ctx.db.rank_snapshot().iter().collect()
    }

    fn insert_snapshot(&mut self, snapshot: RankSnapshot) -> RankSnapshot {
        self.ctx.db.rank_snapshot().insert(RankSnapshot { id: 0, ..snapshot })
    }

    fn delete_snapshot(&mut self, snapshot_id: u64) -> bool {
        self.ctx.db.rank_snapshot().id().delete(&snapshot_id)
    }

    fn assignments_for_user_on(&self, user_id: u64, date: &str) -> Vec<MissionAssignment> {
        self.ctx.db.mission_assignment()
            .user_id()
            .filter(&user_id)
            .filter(|a| a.date == date)
            .collect()
    }
}
