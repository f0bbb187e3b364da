//! Habit templates, generated occurrences, and the occurrence outcome
//! state machine.
//!
//! An occurrence's outcome follows strict transitions:
//!
//! ```text
//!   PENDING ──(timer stop)──> DONE(substatus, completion %)
//!      |                        ^
//!      |                        | (timer stop, correction)
//!      +──────(skip)──────> NOT_DONE(substatus, reason?, note?)
//! ```
//!
//! - DONE is reachable only through a stopped tracking session.
//! - NOT_DONE is reachable only through an explicit skip.
//! - Skipping is rejected once the occurrence is DONE, and while an active
//!   session references it.
//! - IGNORED exists in the state space but is only ever produced by an
//!   auto-expiry process outside this library.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::TimeWindow;
use crate::error::ValidationError;

/// Maximum persisted length of a skip note, in characters.
pub const SKIP_NOTE_MAX_LEN: usize = 500;

/// Completion-quality classification of a DONE occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoneSubstatus {
    Partial,
    Full,
    Overdone,
    Excessive,
}

impl DoneSubstatus {
    /// Band a rounded completion percentage into a substatus.
    pub fn from_percentage(pct: u32) -> Self {
        if pct < 90 {
            Self::Partial
        } else if pct <= 110 {
            Self::Full
        } else if pct <= 150 {
            Self::Overdone
        } else {
            Self::Excessive
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Partial => "partial",
            Self::Full => "full",
            Self::Overdone => "overdone",
            Self::Excessive => "excessive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "partial" => Some(Self::Partial),
            "full" => Some(Self::Full),
            "overdone" => Some(Self::Overdone),
            "excessive" => Some(Self::Excessive),
            _ => None,
        }
    }
}

/// Reason classification of a NOT_DONE occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotDoneSubstatus {
    SkippedJustified,
    SkippedUnjustified,
    /// Produced only by the out-of-scope auto-expiry process.
    Ignored,
}

impl NotDoneSubstatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SkippedJustified => "skipped_justified",
            Self::SkippedUnjustified => "skipped_unjustified",
            Self::Ignored => "ignored",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "skipped_justified" => Some(Self::SkippedJustified),
            "skipped_unjustified" => Some(Self::SkippedUnjustified),
            "ignored" => Some(Self::Ignored),
            _ => None,
        }
    }
}

/// Categorical reason supplied with a skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Illness,
    Travel,
    Workload,
    Fatigue,
    Weather,
    Other,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Illness => "illness",
            Self::Travel => "travel",
            Self::Workload => "workload",
            Self::Fatigue => "fatigue",
            Self::Weather => "weather",
            Self::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "illness" => Some(Self::Illness),
            "travel" => Some(Self::Travel),
            "workload" => Some(Self::Workload),
            "fatigue" => Some(Self::Fatigue),
            "weather" => Some(Self::Weather),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Outcome of a habit occurrence.
///
/// Modeled as a tagged union so that illegal field combinations (a DONE
/// occurrence with a skip reason, a NOT_DONE one with a completion
/// percentage) cannot be constructed. The flat column form used by storage
/// is [`OutcomeRow`], which re-checks the same invariants explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Pending,
    Done {
        substatus: DoneSubstatus,
        completion_percentage: u32,
    },
    NotDone {
        substatus: NotDoneSubstatus,
        skip_reason: Option<SkipReason>,
        skip_note: Option<String>,
    },
}

impl Outcome {
    /// DONE outcome from a rounded completion percentage.
    pub fn from_completion(pct: u32) -> Self {
        Outcome::Done {
            substatus: DoneSubstatus::from_percentage(pct),
            completion_percentage: pct,
        }
    }

    /// Justified-skip outcome. Rejects an over-length note.
    pub fn skipped(reason: SkipReason, note: Option<String>) -> Result<Self, ValidationError> {
        if let Some(note) = &note {
            let len = note.chars().count();
            if len > SKIP_NOTE_MAX_LEN {
                return Err(ValidationError::NoteTooLong {
                    len,
                    limit: SKIP_NOTE_MAX_LEN,
                });
            }
        }
        Ok(Outcome::NotDone {
            substatus: NotDoneSubstatus::SkippedJustified,
            skip_reason: Some(reason),
            skip_note: note,
        })
    }

    pub fn status_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Done { .. } => "DONE",
            Self::NotDone { .. } => "NOT_DONE",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

impl Default for Outcome {
    fn default() -> Self {
        Outcome::Pending
    }
}

/// Flat column view of an [`Outcome`], as stored by the database.
///
/// The tagged union makes inconsistent combinations unrepresentable in
/// memory; this type exists so the same invariants are still checked
/// explicitly at the storage boundary (and exercised directly in tests).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeRow {
    pub status: String,
    pub done_substatus: Option<String>,
    pub not_done_substatus: Option<String>,
    pub skip_reason: Option<String>,
    pub skip_note: Option<String>,
    pub completion_percentage: Option<u32>,
}

impl OutcomeRow {
    pub fn from_outcome(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Pending => OutcomeRow {
                status: "PENDING".to_string(),
                ..Default::default()
            },
            Outcome::Done {
                substatus,
                completion_percentage,
            } => OutcomeRow {
                status: "DONE".to_string(),
                done_substatus: Some(substatus.as_str().to_string()),
                completion_percentage: Some(*completion_percentage),
                ..Default::default()
            },
            Outcome::NotDone {
                substatus,
                skip_reason,
                skip_note,
            } => OutcomeRow {
                status: "NOT_DONE".to_string(),
                not_done_substatus: Some(substatus.as_str().to_string()),
                skip_reason: skip_reason.map(|r| r.as_str().to_string()),
                skip_note: skip_note.clone(),
                ..Default::default()
            },
        }
    }

    /// Status-consistency check, run after every outcome mutation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let inconsistent =
            |msg: &str| Err(ValidationError::InconsistentOutcome(msg.to_string()));

        if self.done_substatus.is_some() && self.not_done_substatus.is_some() {
            return inconsistent("both done and not-done substatus set");
        }
        match self.status.as_str() {
            "PENDING" => {
                if self.done_substatus.is_some()
                    || self.not_done_substatus.is_some()
                    || self.skip_reason.is_some()
                    || self.completion_percentage.is_some()
                {
                    return inconsistent("PENDING with outcome fields set");
                }
            }
            "DONE" => {
                if self.done_substatus.is_none() {
                    return inconsistent("DONE without done substatus");
                }
                if self.skip_reason.is_some() || self.not_done_substatus.is_some() {
                    return inconsistent("DONE with not-done fields set");
                }
            }
            "NOT_DONE" => {
                if self.not_done_substatus.is_none() {
                    return inconsistent("NOT_DONE without not-done substatus");
                }
                if self.completion_percentage.is_some() || self.done_substatus.is_some() {
                    return inconsistent("NOT_DONE with done fields set");
                }
                let justified =
                    self.not_done_substatus.as_deref() == Some("skipped_justified");
                if justified && self.skip_reason.is_none() {
                    return inconsistent("skipped_justified without skip reason");
                }
                if !justified && self.skip_reason.is_some() {
                    return inconsistent("skip reason set while not skipped_justified");
                }
            }
            other => {
                return Err(ValidationError::InvalidValue {
                    field: "status".to_string(),
                    message: format!("unknown status '{other}'"),
                });
            }
        }
        Ok(())
    }

    /// Validate and rebuild the tagged union.
    pub fn into_outcome(self) -> Result<Outcome, ValidationError> {
        self.validate()?;
        let parse_fail = |field: &str, value: &str| ValidationError::InvalidValue {
            field: field.to_string(),
            message: format!("unknown value '{value}'"),
        };

        match self.status.as_str() {
            "PENDING" => Ok(Outcome::Pending),
            "DONE" => {
                let raw = self.done_substatus.unwrap_or_default();
                let substatus = DoneSubstatus::parse(&raw)
                    .ok_or_else(|| parse_fail("done_substatus", &raw))?;
                Ok(Outcome::Done {
                    substatus,
                    completion_percentage: self.completion_percentage.unwrap_or(0),
                })
            }
            _ => {
                let raw = self.not_done_substatus.unwrap_or_default();
                let substatus = NotDoneSubstatus::parse(&raw)
                    .ok_or_else(|| parse_fail("not_done_substatus", &raw))?;
                let skip_reason = match self.skip_reason {
                    Some(raw) => Some(
                        SkipReason::parse(&raw)
                            .ok_or_else(|| parse_fail("skip_reason", &raw))?,
                    ),
                    None => None,
                };
                Ok(Outcome::NotDone {
                    substatus,
                    skip_reason,
                    skip_note: self.skip_note,
                })
            }
        }
    }
}

/// A recurring habit template.
///
/// Occurrences are generated from the weekday set and the start/end
/// times-of-day; the habit itself never occupies a window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,
    pub name: String,
    /// Weekdays the habit recurs on: 0=Sun ... 6=Sat
    pub days: Vec<u8>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub created_at: DateTime<Utc>,
}

impl Habit {
    /// Create a new habit. Rejects an empty window.
    pub fn new(
        name: impl Into<String>,
        days: Vec<u8>,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<Self, ValidationError> {
        if end_time <= start_time {
            return Err(ValidationError::InvalidTimeOfDayRange {
                start: start_time,
                end: end_time,
            });
        }
        Ok(Self {
            id: format!("habit-{}", uuid::Uuid::new_v4()),
            name: name.into(),
            days,
            start_time,
            end_time,
            created_at: Utc::now(),
        })
    }

    /// Does the habit recur on the given date?
    pub fn occurs_on(&self, date: NaiveDate) -> bool {
        use chrono::Datelike;
        self.days
            .contains(&(date.weekday().num_days_from_sunday() as u8))
    }

    /// Materialize a PENDING occurrence on a date, inheriting the habit's
    /// time-of-day window.
    pub fn occurrence_on(&self, date: NaiveDate) -> HabitOccurrence {
        let now = Utc::now();
        HabitOccurrence {
            id: format!("occ-{}", uuid::Uuid::new_v4()),
            habit_id: self.id.clone(),
            habit_name: self.name.clone(),
            date,
            start_time: self.start_time,
            end_time: self.end_time,
            outcome: Outcome::Pending,
            system_adjusted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Materialize occurrences for every matching date in `[from, to]`.
    pub fn occurrences_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<HabitOccurrence> {
        dates_inclusive(from, to)
            .filter(|d| self.occurs_on(*d))
            .map(|d| self.occurrence_on(d))
            .collect()
    }
}

/// Inclusive date iteration helper.
pub fn dates_inclusive(from: NaiveDate, to: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    from.iter_days().take_while(move |d| *d <= to)
}

/// A single dated occurrence of a habit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitOccurrence {
    pub id: String,
    pub habit_id: String,
    /// Habit name denormalized for display
    pub habit_name: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(flatten)]
    pub outcome: Outcome,
    /// True when the window was last moved by an accepted reordering rather
    /// than a user edit.
    pub system_adjusted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HabitOccurrence {
    /// The occupied window: the occurrence's date combined with its
    /// start/end times-of-day.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(
            self.date.and_time(self.start_time).and_utc(),
            self.date.and_time(self.end_time).and_utc(),
        )
    }

    /// Target duration for completion-percentage computation, in minutes.
    pub fn target_minutes(&self) -> i64 {
        self.window().duration_minutes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn substatus_banding_exact_boundaries() {
        assert_eq!(DoneSubstatus::from_percentage(89), DoneSubstatus::Partial);
        assert_eq!(DoneSubstatus::from_percentage(90), DoneSubstatus::Full);
        assert_eq!(DoneSubstatus::from_percentage(110), DoneSubstatus::Full);
        assert_eq!(DoneSubstatus::from_percentage(111), DoneSubstatus::Overdone);
        assert_eq!(DoneSubstatus::from_percentage(150), DoneSubstatus::Overdone);
        assert_eq!(DoneSubstatus::from_percentage(151), DoneSubstatus::Excessive);
        assert_eq!(DoneSubstatus::from_percentage(0), DoneSubstatus::Partial);
    }

    #[test]
    fn skip_note_length_limit() {
        let long = "x".repeat(501);
        let err = Outcome::skipped(SkipReason::Travel, Some(long)).unwrap_err();
        assert!(matches!(err, ValidationError::NoteTooLong { len: 501, .. }));

        let exact = "x".repeat(500);
        assert!(Outcome::skipped(SkipReason::Travel, Some(exact)).is_ok());
    }

    #[test]
    fn outcome_row_round_trip() {
        let outcomes = [
            Outcome::Pending,
            Outcome::from_completion(104),
            Outcome::skipped(SkipReason::Illness, Some("flu".to_string())).unwrap(),
        ];
        for outcome in outcomes {
            let row = OutcomeRow::from_outcome(&outcome);
            row.validate().unwrap();
            assert_eq!(row.into_outcome().unwrap(), outcome);
        }
    }

    #[test]
    fn consistency_check_rejections() {
        // DONE without done substatus
        let row = OutcomeRow {
            status: "DONE".to_string(),
            completion_percentage: Some(95),
            ..Default::default()
        };
        assert!(row.validate().is_err());

        // NOT_DONE without not-done substatus
        let row = OutcomeRow {
            status: "NOT_DONE".to_string(),
            ..Default::default()
        };
        assert!(row.validate().is_err());

        // Both substatus fields set
        let row = OutcomeRow {
            status: "DONE".to_string(),
            done_substatus: Some("full".to_string()),
            not_done_substatus: Some("ignored".to_string()),
            ..Default::default()
        };
        assert!(row.validate().is_err());

        // Skip reason while not skipped_justified
        let row = OutcomeRow {
            status: "NOT_DONE".to_string(),
            not_done_substatus: Some("ignored".to_string()),
            skip_reason: Some("travel".to_string()),
            ..Default::default()
        };
        assert!(row.validate().is_err());

        // skipped_justified without skip reason
        let row = OutcomeRow {
            status: "NOT_DONE".to_string(),
            not_done_substatus: Some("skipped_justified".to_string()),
            ..Default::default()
        };
        assert!(row.validate().is_err());
    }

    #[test]
    fn habit_rejects_empty_window() {
        assert!(Habit::new("stretch", vec![1], t(9, 0), t(9, 0)).is_err());
        assert!(Habit::new("stretch", vec![1], t(9, 0), t(8, 0)).is_err());
    }

    #[test]
    fn generation_respects_weekday_set() {
        // Mon/Wed/Fri habit over one week starting Monday 2025-06-02.
        let habit = Habit::new("run", vec![1, 3, 5], t(7, 0), t(8, 0)).unwrap();
        let from = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 6, 8).unwrap();

        let occurrences = habit.occurrences_between(from, to);
        let dates: Vec<_> = occurrences.iter().map(|o| o.date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
                NaiveDate::from_ymd_opt(2025, 6, 4).unwrap(),
                NaiveDate::from_ymd_opt(2025, 6, 6).unwrap(),
            ]
        );
        assert!(occurrences.iter().all(|o| o.outcome.is_pending()));
    }

    #[test]
    fn occurrence_window_combines_date_and_times() {
        let habit = Habit::new("read", vec![0, 1, 2, 3, 4, 5, 6], t(8, 0), t(9, 0)).unwrap();
        let occ = habit.occurrence_on(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
        let window = occ.window();
        assert_eq!(window.duration_minutes(), 60);
        assert_eq!(occ.target_minutes(), 60);
        assert_eq!(window.start.time(), t(8, 0));
    }
}
