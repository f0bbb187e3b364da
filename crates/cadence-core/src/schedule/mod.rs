//! Schedulable domain types: tasks, habits with their occurrences, and
//! calendar events, plus the window adapter the conflict engine works on.

pub mod entity;
pub mod event;
pub mod habit;
pub mod task;

pub use entity::{EntityKind, EntityRef, ScheduleEntity, TimeWindow, TASK_BLOCK_MINUTES};
pub use event::CalendarEvent;
pub use habit::{
    dates_inclusive, DoneSubstatus, Habit, HabitOccurrence, NotDoneSubstatus, Outcome,
    OutcomeRow, SkipReason, SKIP_NOTE_MAX_LEN,
};
pub use task::{Task, TaskState};
