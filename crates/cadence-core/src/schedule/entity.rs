//! Schedulable-entity adapter.
//!
//! Tasks, habit occurrences and calendar events store their scheduled time
//! in three different native shapes. The conflict engine never looks at
//! those shapes directly: it works on [`TimeWindow`]s obtained through
//! [`ScheduleEntity`], which dispatches the per-kind logic exactly once.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::event::CalendarEvent;
use super::habit::HabitOccurrence;
use super::task::Task;

/// Fixed block length assumed for a scheduled task, in minutes.
pub const TASK_BLOCK_MINUTES: i64 = 60;

/// A half-open time window `[start, end)` in wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration().num_minutes()
    }

    /// Strict half-open overlap test. Windows that merely touch at an
    /// endpoint (back-to-back) do not overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The same window moved to a new start, preserving its duration.
    pub fn shifted_to(&self, new_start: DateTime<Utc>) -> Self {
        Self {
            start: new_start,
            end: new_start + self.duration(),
        }
    }

    /// The window widened by `by` on both sides.
    pub fn padded(&self, by: Duration) -> Self {
        Self {
            start: self.start - by,
            end: self.end + by,
        }
    }
}

/// Kind tag of a schedulable entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Task,
    HabitOccurrence,
    Event,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::HabitOccurrence => "habit_occurrence",
            Self::Event => "event",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "task" => Some(Self::Task),
            "habit_occurrence" => Some(Self::HabitOccurrence),
            "event" => Some(Self::Event),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weak (id, kind) reference to a schedulable entity. Never an ownership
/// relation: the referenced row may have been deleted since the reference
/// was taken.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EntityRef {
    pub id: String,
    pub kind: EntityKind,
}

impl EntityRef {
    pub fn new(id: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    pub fn task(id: impl Into<String>) -> Self {
        Self::new(id, EntityKind::Task)
    }

    pub fn occurrence(id: impl Into<String>) -> Self {
        Self::new(id, EntityKind::HabitOccurrence)
    }

    pub fn event(id: impl Into<String>) -> Self {
        Self::new(id, EntityKind::Event)
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}'", self.kind, self.id)
    }
}

/// A resolved schedulable entity.
///
/// The conflict engine resolves an [`EntityRef`] into one of these and from
/// then on only uses `entity_ref()`, `window()` and `apply_window()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleEntity {
    Task(Task),
    HabitOccurrence(HabitOccurrence),
    Event(CalendarEvent),
}

impl ScheduleEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Task(_) => EntityKind::Task,
            Self::HabitOccurrence(_) => EntityKind::HabitOccurrence,
            Self::Event(_) => EntityKind::Event,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Task(t) => &t.id,
            Self::HabitOccurrence(o) => &o.id,
            Self::Event(e) => &e.id,
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.id(), self.kind())
    }

    /// The entity's occupied window, or `None` when it has no scheduled
    /// time (an unscheduled task).
    pub fn window(&self) -> Option<TimeWindow> {
        match self {
            Self::Task(t) => t.window(),
            Self::HabitOccurrence(o) => Some(o.window()),
            Self::Event(e) => Some(e.window()),
        }
    }

    /// Rewrite the entity's scheduled time from a window, following each
    /// kind's native representation: a task keeps only the start instant,
    /// an occurrence keeps the start/end times-of-day on its original date,
    /// an event stores both instants directly.
    pub fn apply_window(&mut self, window: &TimeWindow) {
        match self {
            Self::Task(t) => t.scheduled_at = Some(window.start),
            Self::HabitOccurrence(o) => {
                o.start_time = window.start.time();
                o.end_time = window.end.time();
            }
            Self::Event(e) => {
                e.start_time = window.start;
                e.end_time = window.end;
            }
        }
    }
}
