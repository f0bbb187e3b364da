//! Urgency-tier classification for conflicting entities.
//!
//! Tiers decide which side of a conflict gets to keep its window. The
//! classification is deterministic per entity for a fixed `now`, so
//! repeated calls over the same conflict set always agree.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::conflict::detector::Conflict;
use crate::error::Result;
use crate::schedule::{EntityRef, ScheduleEntity, TaskState};
use crate::storage::ScheduleDb;
use crate::timer::SessionLink;

/// Urgency tier. Lower rank = more protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriorityTier {
    /// In progress right now, or a task deadline less than 24h away.
    Critical,
    /// Paused mid-work.
    High,
    /// Planned/pending and starting within the next hour.
    Normal,
    /// Planned/pending and starting later than that.
    Low,
}

impl PriorityTier {
    /// Numeric rank, 1 = most protected.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Critical => 1,
            Self::High => 2,
            Self::Normal => 3,
            Self::Low => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Normal => "NORMAL",
            Self::Low => "LOW",
        }
    }
}

/// Assigns an urgency tier to each entity of a conflict set.
pub struct PriorityClassifier<'a> {
    db: &'a ScheduleDb,
    /// Sampled once per operation so every classification in the batch sees
    /// the same clock.
    now: DateTime<Utc>,
}

impl<'a> PriorityClassifier<'a> {
    pub fn new(db: &'a ScheduleDb, now: DateTime<Utc>) -> Self {
        Self { db, now }
    }

    /// Tier for a single resolved entity.
    pub fn classify(&self, entity: &ScheduleEntity) -> Result<PriorityTier> {
        if self.is_in_progress(entity)? {
            return Ok(PriorityTier::Critical);
        }
        if let ScheduleEntity::Task(task) = entity {
            if let Some(deadline) = task.deadline {
                if deadline - self.now < Duration::hours(24) {
                    return Ok(PriorityTier::Critical);
                }
            }
        }
        if self.is_paused(entity)? {
            return Ok(PriorityTier::High);
        }

        let starts_soon = entity
            .window()
            .map(|w| w.start - self.now <= Duration::hours(1))
            .unwrap_or(false);
        if starts_soon {
            Ok(PriorityTier::Normal)
        } else {
            Ok(PriorityTier::Low)
        }
    }

    /// Tiers for every entity referenced by the conflicts. References whose
    /// entity has vanished are left out of the map.
    pub fn calculate_priorities(
        &self,
        conflicts: &[Conflict],
    ) -> Result<BTreeMap<EntityRef, PriorityTier>> {
        let mut tiers = BTreeMap::new();
        for conflict in conflicts {
            for entity_ref in [&conflict.trigger, &conflict.other] {
                if tiers.contains_key(entity_ref) {
                    continue;
                }
                let Some(entity) = self.db.fetch_entity(entity_ref)? else {
                    continue;
                };
                tiers.insert(entity_ref.clone(), self.classify(&entity)?);
            }
        }
        Ok(tiers)
    }

    fn is_in_progress(&self, entity: &ScheduleEntity) -> Result<bool> {
        match entity {
            ScheduleEntity::Task(task) => {
                if task.state == TaskState::InProgress {
                    return Ok(true);
                }
                let session = self
                    .db
                    .active_session_for(&SessionLink::Task(task.id.clone()))?;
                Ok(session.is_some_and(|s| !s.is_paused()))
            }
            ScheduleEntity::HabitOccurrence(occ) => {
                let session = self
                    .db
                    .active_session_for(&SessionLink::HabitOccurrence(occ.id.clone()))?;
                Ok(session.is_some_and(|s| !s.is_paused()))
            }
            ScheduleEntity::Event(_) => Ok(false),
        }
    }

    fn is_paused(&self, entity: &ScheduleEntity) -> Result<bool> {
        match entity {
            ScheduleEntity::Task(task) => {
                if task.state == TaskState::Paused {
                    return Ok(true);
                }
                let session = self
                    .db
                    .active_session_for(&SessionLink::Task(task.id.clone()))?;
                Ok(session.is_some_and(|s| s.is_paused()))
            }
            ScheduleEntity::HabitOccurrence(occ) => {
                let session = self
                    .db
                    .active_session_for(&SessionLink::HabitOccurrence(occ.id.clone()))?;
                Ok(session.is_some_and(|s| s.is_paused()))
            }
            ScheduleEntity::Event(_) => Ok(false),
        }
    }
}
