//! Ad-hoc calendar events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::TimeWindow;

/// An ad-hoc calendar event with explicit start and end instants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl CalendarEvent {
    /// Create a new calendar event.
    pub fn new(
        title: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("event-{}", uuid::Uuid::new_v4()),
            title: title.into(),
            start_time,
            end_time,
            created_at: Utc::now(),
        }
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.end_time)
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }
}
