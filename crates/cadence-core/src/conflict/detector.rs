//! Pairwise time-window conflict detection.
//!
//! Finds schedulable entities whose windows overlap a trigger entity's
//! window. Overlap is strict half-open: back-to-back windows never
//! conflict. Detection is purely a read; nothing is mutated.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::error::Result;
use crate::schedule::{EntityKind, EntityRef, ScheduleEntity, TimeWindow};
use crate::storage::ScheduleDb;

/// Classification of a detected conflict.
///
/// Only `Overlap` is ever produced. `Sequential` (touching, non-overlapping
/// neighbors) is reserved for a future distinction; back-to-back entities
/// are non-conflicting by contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    Overlap,
    Sequential,
}

/// A detected pairwise overlap between two entities' windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub trigger: EntityRef,
    pub other: EntityRef,
    pub kind: ConflictKind,
    pub trigger_window: TimeWindow,
    pub other_window: TimeWindow,
}

impl Conflict {
    /// Normalized pair key: the two references in sorted order, so (A, B)
    /// and (B, A) collapse to one key.
    pub fn pair_key(&self) -> (EntityRef, EntityRef) {
        if self.trigger <= self.other {
            (self.trigger.clone(), self.other.clone())
        } else {
            (self.other.clone(), self.trigger.clone())
        }
    }
}

/// Scans the store for entities conflicting with a trigger entity.
pub struct ConflictDetector<'a> {
    db: &'a ScheduleDb,
}

impl<'a> ConflictDetector<'a> {
    pub fn new(db: &'a ScheduleDb) -> Self {
        Self { db }
    }

    /// All conflicts involving `target`.
    ///
    /// Returns an empty list (not an error) when the entity is absent or
    /// has no scheduled window.
    pub fn detect_conflicts(&self, target: &EntityRef) -> Result<Vec<Conflict>> {
        let Some(entity) = self.db.fetch_entity(target)? else {
            return Ok(Vec::new());
        };
        let Some(window) = entity.window() else {
            return Ok(Vec::new());
        };

        let mut conflicts = Vec::new();
        for candidate in self.candidates(&window, target)? {
            let Some(candidate_window) = candidate.window() else {
                continue;
            };
            if window.overlaps(&candidate_window) {
                conflicts.push(Conflict {
                    trigger: target.clone(),
                    other: candidate.entity_ref(),
                    kind: ConflictKind::Overlap,
                    trigger_window: window,
                    other_window: candidate_window,
                });
            }
        }
        debug!(entity = %target, count = conflicts.len(), "conflict scan");
        Ok(conflicts)
    }

    /// All distinct conflicts among entities touching `date`, with
    /// symmetric pairs deduplicated. Entities without a window are skipped
    /// silently.
    pub fn conflicts_for_day(&self, date: NaiveDate) -> Result<Vec<Conflict>> {
        let mut seen: HashSet<(EntityRef, EntityRef)> = HashSet::new();
        let mut conflicts = Vec::new();

        for entity in self.day_entities(date)? {
            for conflict in self.detect_conflicts(&entity.entity_ref())? {
                if seen.insert(conflict.pair_key()) {
                    conflicts.push(conflict);
                }
            }
        }
        Ok(conflicts)
    }

    /// Candidates that could overlap `window`: tasks scheduled within the
    /// window padded by one task block on both sides, habit occurrences on
    /// the window's date, and events intersecting the window. The trigger
    /// itself is excluded per kind by the store.
    fn candidates(
        &self,
        window: &TimeWindow,
        exclude: &EntityRef,
    ) -> Result<Vec<ScheduleEntity>> {
        let padded = window.padded(Duration::minutes(crate::schedule::TASK_BLOCK_MINUTES));

        let mut candidates: Vec<ScheduleEntity> = Vec::new();
        candidates.extend(
            self.db
                .tasks_scheduled_between(
                    padded.start,
                    padded.end,
                    exclude_id(exclude, EntityKind::Task),
                )?
                .into_iter()
                .map(ScheduleEntity::Task),
        );
        candidates.extend(
            self.db
                .occurrences_on(
                    window.start.date_naive(),
                    exclude_id(exclude, EntityKind::HabitOccurrence),
                )?
                .into_iter()
                .map(ScheduleEntity::HabitOccurrence),
        );
        candidates.extend(
            self.db
                .events_overlapping(
                    window.start,
                    window.end,
                    exclude_id(exclude, EntityKind::Event),
                )?
                .into_iter()
                .map(ScheduleEntity::Event),
        );
        Ok(candidates)
    }

    /// Every scheduled entity touching the given day.
    fn day_entities(&self, date: NaiveDate) -> Result<Vec<ScheduleEntity>> {
        let day_start = date.and_time(chrono::NaiveTime::MIN).and_utc();
        let day_end = day_start + Duration::days(1);

        let mut entities: Vec<ScheduleEntity> = Vec::new();
        entities.extend(
            self.db
                .tasks_scheduled_between(day_start, day_end, None)?
                .into_iter()
                .map(ScheduleEntity::Task),
        );
        entities.extend(
            self.db
                .occurrences_on(date, None)?
                .into_iter()
                .map(ScheduleEntity::HabitOccurrence),
        );
        entities.extend(
            self.db
                .events_overlapping(day_start, day_end, None)?
                .into_iter()
                .map(ScheduleEntity::Event),
        );
        Ok(entities)
    }
}

/// The trigger's id when it is of the queried kind, for per-kind exclusion
/// in the store queries.
fn exclude_id(exclude: &EntityRef, kind: EntityKind) -> Option<&str> {
    (exclude.kind == kind).then_some(exclude.id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{CalendarEvent, Habit, Task};
    use chrono::{DateTime, NaiveTime, TimeZone, Utc};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, h, m, 0).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn scheduled_task(db: &ScheduleDb, title: &str, start: DateTime<Utc>) -> Task {
        let mut task = Task::new(title);
        task.scheduled_at = Some(start);
        db.create_task(&task).unwrap();
        task
    }

    #[test]
    fn overlapping_tasks_produce_one_conflict() {
        let db = ScheduleDb::open_memory().unwrap();
        let a = scheduled_task(&db, "a", at(10, 0));
        let b = scheduled_task(&db, "b", at(10, 30));

        let detector = ConflictDetector::new(&db);
        let conflicts = detector.detect_conflicts(&EntityRef::task(&a.id)).unwrap();
        assert_eq!(conflicts.len(), 1);
        let conflict = &conflicts[0];
        assert_eq!(conflict.other, EntityRef::task(&b.id));
        assert_eq!(conflict.kind, ConflictKind::Overlap);
        assert_eq!(conflict.trigger_window.start, at(10, 0));
        assert_eq!(conflict.other_window.start, at(10, 30));
    }

    #[test]
    fn back_to_back_never_conflicts() {
        let db = ScheduleDb::open_memory().unwrap();
        let a = scheduled_task(&db, "a", at(10, 0));
        scheduled_task(&db, "b", at(11, 0));
        let event = CalendarEvent::new("standup", at(9, 0), at(10, 0));
        db.create_event(&event).unwrap();

        let detector = ConflictDetector::new(&db);
        let conflicts = detector.detect_conflicts(&EntityRef::task(&a.id)).unwrap();
        assert!(conflicts.is_empty());
    }

    #[test]
    fn absent_or_unscheduled_trigger_yields_empty() {
        let db = ScheduleDb::open_memory().unwrap();
        let detector = ConflictDetector::new(&db);

        assert!(detector
            .detect_conflicts(&EntityRef::task("task-missing"))
            .unwrap()
            .is_empty());

        let unscheduled = Task::new("later");
        db.create_task(&unscheduled).unwrap();
        assert!(detector
            .detect_conflicts(&EntityRef::task(&unscheduled.id))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn trigger_never_conflicts_with_itself() {
        let db = ScheduleDb::open_memory().unwrap();
        let a = scheduled_task(&db, "a", at(10, 0));
        let detector = ConflictDetector::new(&db);
        let conflicts = detector.detect_conflicts(&EntityRef::task(&a.id)).unwrap();
        assert!(conflicts
            .iter()
            .all(|c| c.other != EntityRef::task(&a.id)));
        assert!(conflicts.is_empty());
    }

    #[test]
    fn detects_across_all_three_kinds() {
        let db = ScheduleDb::open_memory().unwrap();
        let habit = Habit::new("read", vec![0, 1, 2, 3, 4, 5, 6], t(10, 0), t(11, 0)).unwrap();
        db.create_habit(&habit).unwrap();
        let occ = habit.occurrence_on(day());
        db.create_occurrence(&occ).unwrap();
        let task = scheduled_task(&db, "t", at(10, 30));
        let event = CalendarEvent::new("call", at(10, 45), at(11, 15));
        db.create_event(&event).unwrap();

        let detector = ConflictDetector::new(&db);
        let conflicts = detector
            .detect_conflicts(&EntityRef::occurrence(&occ.id))
            .unwrap();
        let others: Vec<&EntityRef> = conflicts.iter().map(|c| &c.other).collect();
        assert_eq!(conflicts.len(), 2);
        assert!(others.contains(&&EntityRef::task(&task.id)));
        assert!(others.contains(&&EntityRef::event(&event.id)));
    }

    #[test]
    fn day_scan_dedupes_symmetric_pairs() {
        let db = ScheduleDb::open_memory().unwrap();
        scheduled_task(&db, "a", at(10, 0));
        scheduled_task(&db, "b", at(10, 30));

        let detector = ConflictDetector::new(&db);
        let conflicts = detector.conflicts_for_day(day()).unwrap();
        assert_eq!(conflicts.len(), 1);

        let keys: HashSet<_> = conflicts.iter().map(|c| c.pair_key()).collect();
        assert_eq!(keys.len(), conflicts.len());
    }

    #[test]
    fn day_scan_empty_day() {
        let db = ScheduleDb::open_memory().unwrap();
        let detector = ConflictDetector::new(&db);
        assert!(detector.conflicts_for_day(day()).unwrap().is_empty());
    }
}
