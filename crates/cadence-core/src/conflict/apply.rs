//! Persisting accepted reordering proposals.
//!
//! The applier is the only component of the conflict engine that writes.
//! It runs after explicit confirmation, commits every change of a proposal
//! as one batch, and degrades gracefully when a proposal has gone stale:
//! a change whose entity has vanished is skipped while the rest proceed,
//! because each change is independently addressed.

use tracing::{info, warn};

use crate::conflict::proposal::ReorderingProposal;
use crate::error::{CoreError, Result};
use crate::schedule::EntityKind;
use crate::storage::ScheduleDb;

/// Writes an accepted [`ReorderingProposal`] to the store.
pub struct ReorderingApplier<'a> {
    db: &'a ScheduleDb,
}

impl<'a> ReorderingApplier<'a> {
    pub fn new(db: &'a ScheduleDb) -> Self {
        Self { db }
    }

    /// Apply every change in the proposal in one transaction.
    ///
    /// Returns false (a no-op) when the proposal has no changes, true once
    /// the batch committed.
    pub fn apply(&self, proposal: &ReorderingProposal) -> Result<bool> {
        if !proposal.has_changes() {
            return Ok(false);
        }

        self.db.with_transaction::<_, CoreError>(|db| {
            for change in &proposal.changes {
                let system_adjusted = change.entity.kind == EntityKind::HabitOccurrence;
                let applied =
                    db.set_entity_window(&change.entity, &change.proposed, system_adjusted)?;
                if !applied {
                    warn!(entity = %change.entity, "stale proposal change skipped");
                }
            }
            Ok(())
        })?;

        info!(
            changes = proposal.changes.len(),
            shift_minutes = proposal.estimated_shift_minutes,
            "reordering applied"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::detector::ConflictDetector;
    use crate::conflict::proposal::ReorderingPlanner;
    use crate::schedule::{EntityRef, Habit, Task};
    use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, h, m, 0).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn scheduled_task(db: &ScheduleDb, title: &str, start: DateTime<Utc>) -> Task {
        let mut task = Task::new(title);
        task.scheduled_at = Some(start);
        db.create_task(&task).unwrap();
        task
    }

    fn proposal_for(db: &ScheduleDb, trigger: &EntityRef) -> ReorderingProposal {
        let conflicts = ConflictDetector::new(db).detect_conflicts(trigger).unwrap();
        ReorderingPlanner::new(db, at(6, 0))
            .build_proposal(&conflicts)
            .unwrap()
    }

    #[test]
    fn empty_proposal_is_a_no_op() {
        let db = ScheduleDb::open_memory().unwrap();
        let proposal = ReorderingPlanner::new(&db, at(6, 0))
            .build_proposal(&[])
            .unwrap();
        assert!(!ReorderingApplier::new(&db).apply(&proposal).unwrap());
    }

    #[test]
    fn applies_task_move() {
        let db = ScheduleDb::open_memory().unwrap();
        let mut a = scheduled_task(&db, "a", at(10, 0));
        a.deadline = Some(at(12, 0));
        db.update_task(&a).unwrap();
        let b = scheduled_task(&db, "b", at(10, 30));

        let proposal = proposal_for(&db, &EntityRef::task(&a.id));
        assert!(ReorderingApplier::new(&db).apply(&proposal).unwrap());

        let moved = db.get_task(&b.id).unwrap().unwrap();
        assert_eq!(moved.scheduled_at, Some(at(11, 0)));
        // The protected side is untouched.
        let kept = db.get_task(&a.id).unwrap().unwrap();
        assert_eq!(kept.scheduled_at, Some(at(10, 0)));
    }

    #[test]
    fn occurrence_move_stays_on_its_date_and_is_flagged() {
        let db = ScheduleDb::open_memory().unwrap();
        let habit = Habit::new("read", vec![0, 1, 2, 3, 4, 5, 6], t(10, 30), t(11, 30)).unwrap();
        db.create_habit(&habit).unwrap();
        let occ = habit.occurrence_on(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
        db.create_occurrence(&occ).unwrap();
        let mut a = scheduled_task(&db, "a", at(10, 0));
        a.deadline = Some(at(12, 0));
        db.update_task(&a).unwrap();

        let proposal = proposal_for(&db, &EntityRef::occurrence(&occ.id));
        assert!(ReorderingApplier::new(&db).apply(&proposal).unwrap());

        let moved = db.get_occurrence(&occ.id).unwrap().unwrap();
        assert_eq!(moved.date, occ.date);
        assert_eq!(moved.start_time, t(11, 0));
        assert_eq!(moved.end_time, t(12, 0));
        assert!(moved.system_adjusted);
    }

    #[test]
    fn stale_change_is_skipped_while_others_apply() {
        let db = ScheduleDb::open_memory().unwrap();
        let mut a = scheduled_task(&db, "a", at(10, 0));
        a.deadline = Some(at(12, 0));
        db.update_task(&a).unwrap();
        let b = scheduled_task(&db, "b", at(10, 30));
        let d = scheduled_task(&db, "d", at(14, 0));
        let mut e = scheduled_task(&db, "e", at(14, 30));
        e.deadline = Some(at(20, 0));
        db.update_task(&e).unwrap();

        let detector = ConflictDetector::new(&db);
        let mut conflicts = detector
            .detect_conflicts(&EntityRef::task(&a.id))
            .unwrap();
        conflicts.extend(detector.detect_conflicts(&EntityRef::task(&d.id)).unwrap());
        let proposal = ReorderingPlanner::new(&db, at(6, 0))
            .build_proposal(&conflicts)
            .unwrap();
        let movers = proposal.affected_refs();
        assert!(movers.contains(&EntityRef::task(&b.id)));
        assert!(movers.contains(&EntityRef::task(&d.id)));

        // b vanishes between proposal and apply.
        db.delete_task(&b.id).unwrap();
        assert!(ReorderingApplier::new(&db).apply(&proposal).unwrap());

        // d's change still landed.
        let d_after = db.get_task(&d.id).unwrap().unwrap();
        assert_eq!(d_after.scheduled_at, Some(at(15, 30)));
    }
}
