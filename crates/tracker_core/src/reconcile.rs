//! Single writer of the locally observed migration state.
//!
//! Poll results, push events and confirmed command responses all arrive
//! here as candidates. Arrival order between producers is not meaningful;
//! terminal status and the processed-item count decide which candidate wins.
//! A poll or push already in flight when a pause is confirmed carries
//! `in_progress` with older counts; the counter check turns it away.
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use tracker_logging::{tracker_debug, tracker_error};

use crate::{
    MigrationId, MigrationRecord, MigrationStatus, ProgressSnapshot, TransitionError, UpdateSource,
};

/// Authoritative display state for one migration.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedMigration {
    pub record: MigrationRecord,
    pub current_item_name: Option<String>,
    pub speed: Option<f64>,
    pub estimated_remaining_minutes: Option<f64>,
    pub last_source: UpdateSource,
}

impl TrackedMigration {
    pub fn id(&self) -> MigrationId {
        self.record.id
    }

    pub fn status(&self) -> MigrationStatus {
        self.record.status
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            current_item_name: self.current_item_name.clone(),
            speed: self.speed,
            estimated_remaining_minutes: self.estimated_remaining_minutes,
            ..ProgressSnapshot::from(&self.record)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// First candidate for this id, taken verbatim.
    Adopted { status: MigrationStatus },
    Accepted {
        previous: MigrationStatus,
        current: MigrationStatus,
    },
    /// Held status is terminal and the candidate was not.
    TerminalRegression {
        held: MigrationStatus,
        offered: MigrationStatus,
    },
    /// Candidate's counters are behind a running or paused record.
    Stale { held: u64, offered: u64 },
    Violation(TransitionError),
    /// The migration was cancelled locally and is no longer tracked.
    Removed,
}

impl ApplyOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(
            self,
            ApplyOutcome::Adopted { .. } | ApplyOutcome::Accepted { .. }
        )
    }

    pub fn status_change(&self) -> Option<(MigrationStatus, MigrationStatus)> {
        match *self {
            ApplyOutcome::Accepted { previous, current } if previous != current => {
                Some((previous, current))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reconciler {
    tracked: BTreeMap<MigrationId, TrackedMigration>,
    removed: BTreeSet<MigrationId>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: MigrationId) -> Option<&TrackedMigration> {
        self.tracked.get(&id)
    }

    pub fn status(&self, id: MigrationId) -> Option<MigrationStatus> {
        self.tracked.get(&id).map(TrackedMigration::status)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedMigration> {
        self.tracked.values()
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    pub fn apply(&mut self, candidate: ProgressSnapshot, source: UpdateSource) -> ApplyOutcome {
        self.merge(candidate, None, source)
    }

    /// Applies a full record from a list or detail read. Record-only fields
    /// (timestamps, error text) follow the same acceptance decision.
    pub fn apply_record(&mut self, record: MigrationRecord, source: UpdateSource) -> ApplyOutcome {
        let candidate = ProgressSnapshot::from(&record);
        self.merge(candidate, Some(record), source)
    }

    /// Drops the record and ignores any later candidate for the id.
    pub fn remove(&mut self, id: MigrationId) -> Option<TrackedMigration> {
        self.removed.insert(id);
        self.tracked.remove(&id)
    }

    pub fn is_removed(&self, id: MigrationId) -> bool {
        self.removed.contains(&id)
    }

    fn merge(
        &mut self,
        candidate: ProgressSnapshot,
        record: Option<MigrationRecord>,
        source: UpdateSource,
    ) -> ApplyOutcome {
        let id = candidate.migration_id;
        if self.removed.contains(&id) {
            tracker_debug!("migration {} was removed; dropping {:?} update", id, source);
            return ApplyOutcome::Removed;
        }

        let held = match self.tracked.entry(id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let mut tracked = TrackedMigration {
                    record: record.unwrap_or_else(|| record_from_snapshot(&candidate)),
                    current_item_name: candidate.current_item_name,
                    speed: candidate.speed,
                    estimated_remaining_minutes: candidate.estimated_remaining_minutes,
                    last_source: source,
                };
                clamp_total(&mut tracked.record);
                let status = tracked.status();
                entry.insert(tracked);
                return ApplyOutcome::Adopted { status };
            }
        };

        let previous = held.status();
        if previous.is_terminal() && !candidate.status.is_terminal() {
            tracker_debug!(
                "migration {}: {:?} update {} arrived after terminal {}",
                id,
                source,
                candidate.status,
                previous
            );
            return ApplyOutcome::TerminalRegression {
                held: previous,
                offered: candidate.status,
            };
        }

        let held_processed = held.record.processed();
        let regresses = candidate.processed() < held_processed
            || candidate.migrated_count < held.record.migrated_count
            || candidate.failed_count < held.record.failed_count;
        if previous.holds_progress() && regresses {
            tracker_debug!(
                "migration {}: stale {:?} update ({} < {})",
                id,
                source,
                candidate.processed(),
                held_processed
            );
            return ApplyOutcome::Stale {
                held: held_processed,
                offered: candidate.processed(),
            };
        }

        let current = match previous.transition_to(candidate.status) {
            Ok(next) => next,
            Err(err) => {
                tracker_error!("migration {}: {:?} update rejected: {}", id, source, err);
                return ApplyOutcome::Violation(err);
            }
        };

        let target = &mut held.record;
        target.status = current;
        target.total_count = candidate.total_count;
        target.migrated_count = candidate.migrated_count;
        target.failed_count = candidate.failed_count;
        if let Some(record) = record {
            merge_record_fields(target, record);
        }
        clamp_total(target);

        if candidate.current_item_name.is_some() {
            held.current_item_name = candidate.current_item_name;
        }
        if candidate.speed.is_some() {
            held.speed = candidate.speed;
        }
        if candidate.estimated_remaining_minutes.is_some() {
            held.estimated_remaining_minutes = candidate.estimated_remaining_minutes;
        }
        held.last_source = source;

        ApplyOutcome::Accepted { previous, current }
    }
}

fn record_from_snapshot(snapshot: &ProgressSnapshot) -> MigrationRecord {
    MigrationRecord {
        id: snapshot.migration_id,
        user_id: None,
        status: snapshot.status,
        total_count: snapshot.total_count,
        migrated_count: snapshot.migrated_count,
        failed_count: snapshot.failed_count,
        started_at: None,
        completed_at: None,
        error_message: None,
        created_at: None,
    }
}

fn merge_record_fields(target: &mut MigrationRecord, record: MigrationRecord) {
    if record.user_id.is_some() {
        target.user_id = record.user_id;
    }
    if record.started_at.is_some() {
        target.started_at = record.started_at;
    }
    if record.completed_at.is_some() {
        target.completed_at = record.completed_at;
    }
    if record.error_message.is_some() {
        target.error_message = record.error_message;
    }
    if record.created_at.is_some() {
        target.created_at = record.created_at;
    }
}

// A zero total means the server has not counted the source library yet.
fn clamp_total(record: &mut MigrationRecord) {
    let processed = record.processed();
    if record.total_count > 0 && processed > record.total_count {
        tracker_debug!(
            "migration {}: processed {} exceeds total {}; raising total",
            record.id,
            processed,
            record.total_count
        );
        record.total_count = processed;
    }
}
