//! Time-tracking lifecycle over persisted sessions.
//!
//! ```text
//! none ──start──> RUNNING ──pause──> PAUSED ──resume──> RUNNING
//!                    |                                     |
//!                  cancel (record erased)                stop (end set, terminal)
//! ```
//!
//! Stopping a session linked to a habit occurrence computes the completion
//! percentage against the occurrence's scheduled window and drives the
//! occurrence to DONE. Every mutating operation samples the clock once and
//! runs inside one database transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::session::{SessionLink, TrackingSession};
use crate::error::{ArithmeticError, CoreError, Result, ValidationError};
use crate::schedule::{HabitOccurrence, Outcome};
use crate::storage::ScheduleDb;

/// Result of stopping a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopSummary {
    pub session: TrackingSession,
    /// Measured active duration in seconds.
    pub duration_secs: i64,
    /// Set when the session was linked to a habit occurrence.
    pub completion_percentage: Option<u32>,
    /// The occurrence after its DONE transition, when applicable.
    pub occurrence: Option<HabitOccurrence>,
}

/// Start/pause/resume/stop/cancel lifecycle over [`TrackingSession`]s.
pub struct TimeTracker<'a> {
    db: &'a ScheduleDb,
}

impl<'a> TimeTracker<'a> {
    pub fn new(db: &'a ScheduleDb) -> Self {
        Self { db }
    }

    /// Start tracking against a link.
    ///
    /// Fails when the link target does not exist or already has an active
    /// session.
    pub fn start(&self, link: SessionLink) -> Result<TrackingSession> {
        self.start_at(link, Utc::now())
    }

    pub fn start_at(&self, link: SessionLink, now: DateTime<Utc>) -> Result<TrackingSession> {
        let target = link.entity_ref();
        if self.db.fetch_entity(&target)?.is_none() {
            return Err(CoreError::not_found(target.kind.as_str(), target.id));
        }
        if self.db.active_session_for(&link)?.is_some() {
            return Err(CoreError::ActiveSessionConflict {
                kind: target.kind.as_str(),
                id: target.id,
            });
        }
        let session = self.db.insert_session(&link, now)?;
        info!(session_id = session.id, "tracking session started");
        Ok(session)
    }

    /// Open a pause marker on an active session.
    pub fn pause(&self, id: i64) -> Result<TrackingSession> {
        self.pause_at(id, Utc::now())
    }

    pub fn pause_at(&self, id: i64, now: DateTime<Utc>) -> Result<TrackingSession> {
        let mut session = self.require_session(id)?;
        if !session.is_active() {
            return Err(invalid_transition("pause", "session already stopped"));
        }
        if session.pause_started_at.is_some() {
            return Err(invalid_transition("pause", "a pause is already open"));
        }
        session.pause_started_at = Some(now);
        self.db.update_session(&session)?;
        debug!(session_id = id, "session paused");
        Ok(session)
    }

    /// Close the open pause, folding it into the accumulated total.
    pub fn resume(&self, id: i64) -> Result<TrackingSession> {
        self.resume_at(id, Utc::now())
    }

    pub fn resume_at(&self, id: i64, now: DateTime<Utc>) -> Result<TrackingSession> {
        let mut session = self.require_session(id)?;
        if !session.is_active() {
            return Err(invalid_transition("resume", "session already stopped"));
        }
        let Some(pause_started) = session.pause_started_at.take() else {
            return Err(invalid_transition("resume", "no pause is open"));
        };
        session.paused_total_secs += (now - pause_started).num_seconds();
        self.db.update_session(&session)?;
        debug!(session_id = id, "session resumed");
        Ok(session)
    }

    /// Stop a session, fixing its end instant.
    ///
    /// An open pause is folded first, exactly as `resume` would. For a
    /// session linked to a habit occurrence the completion percentage is
    /// computed against the occurrence's scheduled window and the occurrence
    /// transitions to DONE; all writes share one transaction.
    pub fn stop(&self, id: i64) -> Result<StopSummary> {
        self.stop_at(id, Utc::now())
    }

    pub fn stop_at(&self, id: i64, now: DateTime<Utc>) -> Result<StopSummary> {
        self.db.with_transaction(|db| {
            let mut session = self.require_session(id)?;
            if !session.is_active() {
                return Err(invalid_transition("stop", "session already stopped"));
            }
            if let Some(pause_started) = session.pause_started_at.take() {
                session.paused_total_secs += (now - pause_started).num_seconds();
            }
            session.ended_at = Some(now);

            let duration = session.active_duration(now)?;
            let duration_secs = duration.num_seconds();

            let (completion_percentage, occurrence) = match &session.link {
                SessionLink::HabitOccurrence(occ_id) => {
                    let mut occurrence = db
                        .get_occurrence(occ_id)?
                        .ok_or_else(|| CoreError::not_found("habit_occurrence", occ_id.clone()))?;
                    let target_minutes = occurrence.target_minutes();
                    if target_minutes <= 0 {
                        return Err(CoreError::Arithmetic(ArithmeticError::NonPositiveTarget {
                            minutes: target_minutes,
                        }));
                    }
                    let pct = (duration_secs as f64 / (target_minutes * 60) as f64 * 100.0)
                        .round() as u32;
                    occurrence.outcome = Outcome::from_completion(pct);
                    occurrence.updated_at = now;
                    db.update_occurrence(&occurrence)?;
                    (Some(pct), Some(occurrence))
                }
                SessionLink::Task(_) => (None, None),
            };

            db.update_session(&session)?;
            info!(
                session_id = id,
                duration_secs,
                completion_percentage,
                "tracking session stopped"
            );
            Ok(StopSummary {
                session,
                duration_secs,
                completion_percentage,
                occurrence,
            })
        })
    }

    /// Erase a session entirely. The linked occurrence's status is left
    /// untouched.
    pub fn cancel(&self, id: i64) -> Result<()> {
        if !self.db.delete_session(id)? {
            return Err(CoreError::not_found("session", id.to_string()));
        }
        info!(session_id = id, "tracking session cancelled");
        Ok(())
    }

    /// The active session for a link, if any. Read-only.
    pub fn get_active(&self, link: &SessionLink) -> Result<Option<TrackingSession>> {
        Ok(self.db.active_session_for(link)?)
    }

    /// Any active session. The interaction layer uses this to enforce a
    /// single globally active session.
    pub fn get_any_active(&self) -> Result<Option<TrackingSession>> {
        Ok(self.db.any_active_session()?)
    }

    fn require_session(&self, id: i64) -> Result<TrackingSession> {
        self.db
            .get_session(id)?
            .ok_or_else(|| CoreError::not_found("session", id.to_string()))
    }
}

fn invalid_transition(op: &str, reason: &str) -> CoreError {
    CoreError::Validation(ValidationError::InvalidTransition(format!(
        "{op}: {reason}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{DoneSubstatus, Habit, Task};
    use chrono::{Duration, NaiveDate, NaiveTime, TimeZone};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, h, m, 0).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    /// 60-minute occurrence on 2025-06-02, 08:00-09:00.
    fn seeded_occurrence(db: &ScheduleDb) -> HabitOccurrence {
        let habit = Habit::new("read", vec![0, 1, 2, 3, 4, 5, 6], t(8, 0), t(9, 0)).unwrap();
        db.create_habit(&habit).unwrap();
        let occ = habit.occurrence_on(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
        db.create_occurrence(&occ).unwrap();
        occ
    }

    #[test]
    fn start_rejects_missing_link_and_double_start() {
        let db = ScheduleDb::open_memory().unwrap();
        let tracker = TimeTracker::new(&db);

        let err = tracker
            .start_at(SessionLink::Task("task-nope".to_string()), at(8, 0))
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));

        let task = Task::new("t");
        db.create_task(&task).unwrap();
        let link = SessionLink::Task(task.id.clone());
        tracker.start_at(link.clone(), at(8, 0)).unwrap();
        let err = tracker.start_at(link, at(8, 5)).unwrap_err();
        assert!(matches!(err, CoreError::ActiveSessionConflict { .. }));
    }

    #[test]
    fn pause_resume_folds_into_total() {
        let db = ScheduleDb::open_memory().unwrap();
        let tracker = TimeTracker::new(&db);
        let task = Task::new("t");
        db.create_task(&task).unwrap();

        let session = tracker
            .start_at(SessionLink::Task(task.id.clone()), at(8, 0))
            .unwrap();
        tracker.pause_at(session.id, at(8, 10)).unwrap();
        // Double pause rejected.
        assert!(tracker.pause_at(session.id, at(8, 11)).is_err());
        let session = tracker.resume_at(session.id, at(8, 16)).unwrap();
        assert_eq!(session.paused_total_secs, 6 * 60);
        assert!(session.pause_started_at.is_none());
        // Resume without an open pause rejected.
        assert!(tracker.resume_at(session.id, at(8, 20)).is_err());
    }

    #[test]
    fn multiple_pause_cycles_accumulate() {
        let db = ScheduleDb::open_memory().unwrap();
        let tracker = TimeTracker::new(&db);
        let task = Task::new("t");
        db.create_task(&task).unwrap();

        let session = tracker
            .start_at(SessionLink::Task(task.id.clone()), at(8, 0))
            .unwrap();
        tracker.pause_at(session.id, at(8, 10)).unwrap();
        tracker.resume_at(session.id, at(8, 15)).unwrap();
        tracker.pause_at(session.id, at(8, 30)).unwrap();
        tracker.resume_at(session.id, at(8, 37)).unwrap();
        let summary = tracker.stop_at(session.id, at(9, 0)).unwrap();

        // 60 min wall, 12 min paused.
        assert_eq!(summary.session.paused_total_secs, 12 * 60);
        assert_eq!(summary.duration_secs, 48 * 60);
    }

    #[test]
    fn stop_folds_open_pause_like_resume() {
        let db = ScheduleDb::open_memory().unwrap();
        let tracker = TimeTracker::new(&db);
        let task = Task::new("t");
        db.create_task(&task).unwrap();

        let session = tracker
            .start_at(SessionLink::Task(task.id.clone()), at(8, 0))
            .unwrap();
        tracker.pause_at(session.id, at(8, 40)).unwrap();
        let summary = tracker.stop_at(session.id, at(9, 0)).unwrap();
        assert_eq!(summary.duration_secs, 40 * 60);
        assert_eq!(summary.completion_percentage, None);

        // Terminal: no further transitions.
        assert!(tracker.stop_at(session.id, at(9, 5)).is_err());
        assert!(tracker.pause_at(session.id, at(9, 5)).is_err());
    }

    #[test]
    fn stop_drives_occurrence_to_done_full_at_90_pct() {
        let db = ScheduleDb::open_memory().unwrap();
        let tracker = TimeTracker::new(&db);
        let occ = seeded_occurrence(&db);

        // 60-min target, 54 active minutes, zero pause => 90% => FULL.
        let session = tracker
            .start_at(SessionLink::HabitOccurrence(occ.id.clone()), at(8, 0))
            .unwrap();
        let summary = tracker
            .stop_at(session.id, at(8, 0) + Duration::minutes(54))
            .unwrap();

        assert_eq!(summary.completion_percentage, Some(90));
        let updated = summary.occurrence.unwrap();
        assert_eq!(
            updated.outcome,
            Outcome::Done {
                substatus: DoneSubstatus::Full,
                completion_percentage: 90,
            }
        );
        let stored = db.get_occurrence(&occ.id).unwrap().unwrap();
        assert_eq!(stored.outcome, updated.outcome);
    }

    #[test]
    fn cancel_leaves_no_trace() {
        let db = ScheduleDb::open_memory().unwrap();
        let tracker = TimeTracker::new(&db);
        let occ = seeded_occurrence(&db);
        let before = db.get_occurrence(&occ.id).unwrap().unwrap().outcome;

        let session = tracker
            .start_at(SessionLink::HabitOccurrence(occ.id.clone()), at(8, 0))
            .unwrap();
        tracker.cancel(session.id).unwrap();

        assert!(db.get_session(session.id).unwrap().is_none());
        let after = db.get_occurrence(&occ.id).unwrap().unwrap().outcome;
        assert_eq!(before, after);

        // Cancelling again is NotFound.
        assert!(matches!(
            tracker.cancel(session.id).unwrap_err(),
            CoreError::NotFound { .. }
        ));
    }

    #[test]
    fn negative_duration_raises_and_rolls_back() {
        let db = ScheduleDb::open_memory().unwrap();
        let tracker = TimeTracker::new(&db);
        let occ = seeded_occurrence(&db);

        let session = tracker
            .start_at(SessionLink::HabitOccurrence(occ.id.clone()), at(8, 0))
            .unwrap();
        // Pause immediately, then "stop" before the pause closes enough
        // wall time: fold makes paused exceed wall time only via clock
        // corruption, so fabricate it directly.
        let mut corrupted = db.get_session(session.id).unwrap().unwrap();
        corrupted.paused_total_secs = 7200;
        db.update_session(&corrupted).unwrap();

        let err = tracker.stop_at(session.id, at(8, 30)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Arithmetic(ArithmeticError::NegativeDuration { .. })
        ));
        // Rolled back: session still active, occurrence untouched.
        assert!(db.get_session(session.id).unwrap().unwrap().is_active());
        assert!(db
            .get_occurrence(&occ.id)
            .unwrap()
            .unwrap()
            .outcome
            .is_pending());
    }

    #[test]
    fn get_active_and_any_active() {
        let db = ScheduleDb::open_memory().unwrap();
        let tracker = TimeTracker::new(&db);
        let task = Task::new("t");
        db.create_task(&task).unwrap();
        let link = SessionLink::Task(task.id.clone());

        assert!(tracker.get_any_active().unwrap().is_none());
        let session = tracker.start_at(link.clone(), at(8, 0)).unwrap();
        assert_eq!(tracker.get_active(&link).unwrap().unwrap().id, session.id);
        assert_eq!(tracker.get_any_active().unwrap().unwrap().id, session.id);
        tracker.stop_at(session.id, at(8, 30)).unwrap();
        assert!(tracker.get_any_active().unwrap().is_none());
    }
}
