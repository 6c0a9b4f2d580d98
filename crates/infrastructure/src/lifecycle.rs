//! The lifecycle pass run by every save.
//!
//! Two passes over the whole staged set, in this order:
//! 1. every Deleted entry is turned into a soft delete: its lifecycle is marked
//!    deleted and the entry becomes Modified;
//! 2. every Modified entry, including those converted in pass 1, is touched.
//!
//! No Deleted entry survives the pass, so no physical delete ever reaches a store.

use crate::unit_of_work::{ChangeTracker, EntryState, TrackedEntity};
use chrono::{DateTime, Utc};
use tracing::debug;

/// What a lifecycle pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleReport {
    /// Deleted entries converted into soft deletes
    pub soft_deleted: usize,
    /// Modified entries whose `updated_at` was stamped
    pub touched: usize,
}

pub struct LifecycleEnforcer;

impl LifecycleEnforcer {
    pub fn apply(tracker: &mut ChangeTracker, now: DateTime<Utc>) -> LifecycleReport {
        let mut report = LifecycleReport::default();

        for entry in tracker.entries_mut() {
            if entry.state() == EntryState::Deleted {
                entry.entity_mut().audit_mut().mark_deleted(now);
                entry.set_state(EntryState::Modified);
                report.soft_deleted += 1;
            }
        }

        for entry in tracker.entries_mut() {
            if entry.state() == EntryState::Modified {
                entry.entity_mut().audit_mut().touch(now);
                report.touched += 1;
            }
        }

        debug!(
            soft_deleted = report.soft_deleted,
            touched = report.touched,
            "lifecycle pass applied"
        );
        report
    }
}
