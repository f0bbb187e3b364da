//! Tracking-session record types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ArithmeticError;
use crate::schedule::EntityRef;

/// The single entity a session measures time against: a habit occurrence or
/// a task, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SessionLink {
    HabitOccurrence(String),
    Task(String),
}

impl SessionLink {
    pub fn occurrence_id(&self) -> Option<&str> {
        match self {
            Self::HabitOccurrence(id) => Some(id),
            Self::Task(_) => None,
        }
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::HabitOccurrence(_) => None,
            Self::Task(id) => Some(id),
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        match self {
            Self::HabitOccurrence(id) => EntityRef::occurrence(id.clone()),
            Self::Task(id) => EntityRef::task(id.clone()),
        }
    }
}

/// One bounded, possibly-paused interval of active time tracking.
///
/// The open-pause marker is a nullable field on the record itself, so
/// multiple session lifecycles and process restarts never share hidden
/// global state. Once `ended_at` is set the session is terminal and no
/// further mutation is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingSession {
    pub id: i64,
    pub link: SessionLink,
    pub started_at: DateTime<Utc>,
    /// Null while the session is active; immutable once set.
    pub ended_at: Option<DateTime<Utc>>,
    /// Folded total of closed pause intervals, in seconds.
    pub paused_total_secs: i64,
    /// Start of the currently open pause, if one is open.
    pub pause_started_at: Option<DateTime<Utc>>,
}

impl TrackingSession {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn is_paused(&self) -> bool {
        self.is_active() && self.pause_started_at.is_some()
    }

    /// Active duration up to `end`: wall time minus folded pauses.
    ///
    /// A negative result indicates corrupted pause accounting and raises an
    /// arithmetic fault rather than being clamped.
    pub fn active_duration(&self, end: DateTime<Utc>) -> Result<Duration, ArithmeticError> {
        let seconds = (end - self.started_at).num_seconds() - self.paused_total_secs;
        if seconds < 0 {
            return Err(ArithmeticError::NegativeDuration { seconds });
        }
        Ok(Duration::seconds(seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, h, m, 0).unwrap()
    }

    fn session() -> TrackingSession {
        TrackingSession {
            id: 1,
            link: SessionLink::Task("task-1".to_string()),
            started_at: at(8, 0),
            ended_at: None,
            paused_total_secs: 0,
            pause_started_at: None,
        }
    }

    #[test]
    fn active_duration_subtracts_pauses() {
        let mut s = session();
        s.paused_total_secs = 6 * 60;
        let duration = s.active_duration(at(9, 0)).unwrap();
        assert_eq!(duration.num_minutes(), 54);
    }

    #[test]
    fn negative_duration_is_a_fault() {
        let mut s = session();
        s.paused_total_secs = 2 * 3600;
        let err = s.active_duration(at(9, 0)).unwrap_err();
        assert!(matches!(err, ArithmeticError::NegativeDuration { .. }));
    }
}
