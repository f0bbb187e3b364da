//! # Cadence Core Library
//!
//! Core business logic for Cadence, a single-user scheduler for three kinds
//! of time-bound activities: recurring habit occurrences, one-off tasks and
//! ad-hoc calendar events. All operations are available through this
//! library; the CLI binary is a thin layer over it.
//!
//! ## Architecture
//!
//! - **Schedule**: the domain types and the window adapter that gives every
//!   schedulable entity a uniform `[start, end)` view
//! - **Conflict**: pairwise overlap detection, urgency classification, and
//!   non-destructive reordering proposals with an explicit apply step
//! - **Timer**: persisted time-tracking sessions whose stop transition
//!   drives an occurrence's completion outcome
//! - **Storage**: SQLite persistence and TOML configuration
//!
//! ## Key Components
//!
//! - [`Planner`]: the interaction-facing facade
//! - [`ConflictDetector`] / [`ReorderingPlanner`] / [`ReorderingApplier`]
//! - [`TimeTracker`]: session lifecycle state machine
//! - [`ScheduleDb`]: persistence

pub mod conflict;
pub mod error;
pub mod planner;
pub mod schedule;
pub mod storage;
pub mod timer;

pub use conflict::{
    Conflict, ConflictDetector, ConflictKind, PriorityClassifier, PriorityTier, ProposedChange,
    ReorderingApplier, ReorderingPlanner, ReorderingProposal,
};
pub use error::{
    ArithmeticError, ConfigError, CoreError, DatabaseError, Result, ValidationError,
};
pub use planner::Planner;
pub use schedule::{
    CalendarEvent, DoneSubstatus, EntityKind, EntityRef, Habit, HabitOccurrence,
    NotDoneSubstatus, Outcome, ScheduleEntity, SkipReason, Task, TaskState, TimeWindow,
};
pub use storage::{Config, ScheduleDb};
pub use timer::{SessionLink, StopSummary, TimeTracker, TrackingSession};
