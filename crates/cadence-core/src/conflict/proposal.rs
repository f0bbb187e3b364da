//! Non-destructive reordering proposals.
//!
//! A proposal is a reviewable batch of suggested window moves resolving a
//! conflict list. Building one never writes; only the applier persists an
//! accepted proposal. Proposals are constructed fresh per call and never
//! stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::conflict::detector::Conflict;
use crate::conflict::priority::{PriorityClassifier, PriorityTier};
use crate::error::Result;
use crate::schedule::{EntityRef, TimeWindow};
use crate::storage::ScheduleDb;

/// One suggested move for one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedChange {
    pub entity: EntityRef,
    pub current: TimeWindow,
    pub proposed: TimeWindow,
    pub tier: PriorityTier,
    pub justification: String,
}

impl ProposedChange {
    /// Absolute start shift in minutes.
    pub fn shift_minutes(&self) -> i64 {
        (self.proposed.start - self.current.start).num_minutes().abs()
    }
}

/// Immutable aggregate of conflicts and the changes that would resolve
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderingProposal {
    pub conflicts: Vec<Conflict>,
    pub changes: Vec<ProposedChange>,
    /// Sum of absolute minute shifts across all changes.
    pub estimated_shift_minutes: i64,
}

impl ReorderingProposal {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// The set of entities a change touches.
    pub fn affected_refs(&self) -> BTreeSet<EntityRef> {
        self.changes.iter().map(|c| c.entity.clone()).collect()
    }
}

/// Turns a conflict list into a [`ReorderingProposal`].
pub struct ReorderingPlanner<'a> {
    db: &'a ScheduleDb,
    now: DateTime<Utc>,
}

impl<'a> ReorderingPlanner<'a> {
    pub fn new(db: &'a ScheduleDb, now: DateTime<Utc>) -> Self {
        Self { db, now }
    }

    /// Build a proposal: for each conflict the side with the larger (less
    /// urgent) tier moves to start right after the protected side's end,
    /// keeping its duration. On a tie the non-trigger side moves.
    ///
    /// An entity is moved at most once per proposal; conflicts whose mover
    /// was already claimed still appear in the conflict list but add no
    /// second change. Purely computational; safe to call speculatively.
    pub fn build_proposal(&self, conflicts: &[Conflict]) -> Result<ReorderingProposal> {
        let classifier = PriorityClassifier::new(self.db, self.now);
        let tiers = classifier.calculate_priorities(conflicts)?;

        let mut changes: Vec<ProposedChange> = Vec::new();
        let mut moved: BTreeSet<EntityRef> = BTreeSet::new();

        for conflict in conflicts {
            let (Some(&trigger_tier), Some(&other_tier)) =
                (tiers.get(&conflict.trigger), tiers.get(&conflict.other))
            else {
                // One side vanished since detection; nothing to move.
                continue;
            };

            // Larger rank moves; on a tie the non-trigger side moves.
            let trigger_moves = trigger_tier.rank() > other_tier.rank();
            let (mover, mover_window, mover_tier, kept, kept_window, kept_tier) =
                if trigger_moves {
                    (
                        &conflict.trigger,
                        conflict.trigger_window,
                        trigger_tier,
                        &conflict.other,
                        conflict.other_window,
                        other_tier,
                    )
                } else {
                    (
                        &conflict.other,
                        conflict.other_window,
                        other_tier,
                        &conflict.trigger,
                        conflict.trigger_window,
                        trigger_tier,
                    )
                };

            if !moved.insert(mover.clone()) {
                continue;
            }

            let proposed = mover_window.shifted_to(kept_window.end);
            let justification = format!(
                "{} ({}) yields to {} ({}); moved to {}",
                mover,
                mover_tier.as_str(),
                kept,
                kept_tier.as_str(),
                proposed.start.format("%H:%M"),
            );
            changes.push(ProposedChange {
                entity: mover.clone(),
                current: mover_window,
                proposed,
                tier: mover_tier,
                justification,
            });
        }

        let estimated_shift_minutes = changes.iter().map(|c| c.shift_minutes()).sum();
        debug!(
            conflicts = conflicts.len(),
            changes = changes.len(),
            estimated_shift_minutes,
            "reordering proposal built"
        );
        Ok(ReorderingProposal {
            conflicts: conflicts.to_vec(),
            changes,
            estimated_shift_minutes,
        })
    }
}
