//! One-off task type and its state transitions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{TimeWindow, TASK_BLOCK_MINUTES};
use crate::error::ValidationError;

/// Task state enumeration.
///
/// Valid transitions:
/// - PLANNED → IN_PROGRESS (start)
/// - IN_PROGRESS → PAUSED (pause)
/// - IN_PROGRESS → DONE (complete)
/// - PAUSED → IN_PROGRESS (resume)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Task is planned but not started (initial state)
    Planned,
    /// Task is currently being worked on
    InProgress,
    /// Task is paused mid-work
    Paused,
    /// Task is completed (terminal state)
    Done,
}

impl TaskState {
    /// Check if a transition is valid.
    pub fn can_transition_to(&self, to: &TaskState) -> bool {
        match self {
            TaskState::Planned => matches!(to, TaskState::InProgress),
            TaskState::InProgress => matches!(to, TaskState::Paused | TaskState::Done),
            TaskState::Paused => matches!(to, TaskState::InProgress),
            TaskState::Done => false, // Terminal state
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "PLANNED",
            Self::InProgress => "IN_PROGRESS",
            Self::Paused => "PAUSED",
            Self::Done => "DONE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PLANNED" => Some(Self::Planned),
            "IN_PROGRESS" => Some(Self::InProgress),
            "PAUSED" => Some(Self::Paused),
            "DONE" => Some(Self::Done),
            _ => None,
        }
    }
}

impl Default for TaskState {
    fn default() -> Self {
        TaskState::Planned
    }
}

/// A one-off task.
///
/// A scheduled task occupies a fixed one-hour block starting at
/// `scheduled_at`; an unscheduled task occupies no window at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: String,
    /// Task title
    pub title: String,
    /// Optional description
    pub description: Option<String>,
    /// Scheduled start instant (None while unscheduled)
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Hard deadline, if any
    pub deadline: Option<DateTime<Utc>>,
    /// Task state for transition management
    pub state: TaskState,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Completion timestamp (null if not completed)
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new unscheduled task in the PLANNED state.
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Task {
            id: format!("task-{}", uuid::Uuid::new_v4()),
            title: title.into(),
            description: None,
            scheduled_at: None,
            deadline: None,
            state: TaskState::Planned,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// The one-hour block this task occupies, if scheduled.
    pub fn window(&self) -> Option<TimeWindow> {
        self.scheduled_at
            .map(|start| TimeWindow::new(start, start + Duration::minutes(TASK_BLOCK_MINUTES)))
    }

    /// Transition to a new state, rejecting disallowed moves.
    pub fn transition(&mut self, to: TaskState) -> Result<(), ValidationError> {
        if !self.state.can_transition_to(&to) {
            return Err(ValidationError::InvalidTransition(format!(
                "task {} -> {}",
                self.state.as_str(),
                to.as_str()
            )));
        }
        self.state = to;
        self.updated_at = Utc::now();
        if to == TaskState::Done {
            self.completed_at = Some(self.updated_at);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn unscheduled_task_has_no_window() {
        let task = Task::new("write report");
        assert!(task.window().is_none());
    }

    #[test]
    fn scheduled_task_occupies_one_hour() {
        let mut task = Task::new("write report");
        let start = Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap();
        task.scheduled_at = Some(start);

        let window = task.window().unwrap();
        assert_eq!(window.start, start);
        assert_eq!(window.duration_minutes(), 60);
    }

    #[test]
    fn transition_table() {
        let mut task = Task::new("t");
        assert!(task.transition(TaskState::Done).is_err());
        task.transition(TaskState::InProgress).unwrap();
        task.transition(TaskState::Paused).unwrap();
        assert!(task.transition(TaskState::Done).is_err());
        task.transition(TaskState::InProgress).unwrap();
        task.transition(TaskState::Done).unwrap();
        assert!(task.completed_at.is_some());
        // Terminal
        assert!(task.transition(TaskState::InProgress).is_err());
    }
}
