use std::collections::{BTreeMap, BTreeSet};

use crate::{MigrationId, MigrationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleChange {
    Start,
    Stop,
}

/// Decides when a migration's periodic refresh runs.
///
/// A schedule exists while at least one detail view watches the migration
/// and its authoritative status is `in_progress`. Views are reference
/// counted so re-entering a watched migration never creates a second
/// schedule.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollPlan {
    watchers: BTreeMap<MigrationId, usize>,
    scheduled: BTreeSet<MigrationId>,
}

impl PollPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true for the first watcher of `id`.
    pub fn watch(&mut self, id: MigrationId) -> bool {
        let count = self.watchers.entry(id).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Returns true when the last watcher of `id` left.
    pub fn unwatch(&mut self, id: MigrationId) -> bool {
        match self.watchers.get_mut(&id) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                self.watchers.remove(&id);
                true
            }
            None => false,
        }
    }

    pub fn is_watched(&self, id: MigrationId) -> bool {
        self.watchers.contains_key(&id)
    }

    pub fn is_scheduled(&self, id: MigrationId) -> bool {
        self.scheduled.contains(&id)
    }

    /// Re-evaluates the schedule for `id` against its current status.
    pub fn sync(&mut self, id: MigrationId, status: Option<MigrationStatus>) -> Option<ScheduleChange> {
        let wanted = self.is_watched(id) && status.is_some_and(MigrationStatus::is_active);
        match (wanted, self.scheduled.contains(&id)) {
            (true, false) => {
                self.scheduled.insert(id);
                Some(ScheduleChange::Start)
            }
            (false, true) => {
                self.scheduled.remove(&id);
                Some(ScheduleChange::Stop)
            }
            _ => None,
        }
    }
}
