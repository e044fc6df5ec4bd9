use std::collections::BTreeSet;

use crate::accounts::Accounts;
use crate::dispatch::CommandDispatcher;
use crate::reconcile::{Reconciler, TrackedMigration};
use crate::redirect::RedirectGuard;
use crate::schedule::PollPlan;
use crate::view_model::{progress_percent, AppViewModel, MigrationRowView};
use crate::{Command, MigrationId, MigrationStatus};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    pub(crate) reconciler: Reconciler,
    pub(crate) dispatcher: CommandDispatcher,
    pub(crate) polls: PollPlan,
    pub(crate) redirects: RedirectGuard,
    pub(crate) accounts: Accounts,
    pub(crate) live: BTreeSet<MigrationId>,
    /// Ids in the order of the last list read.
    pub(crate) listing: Vec<MigrationId>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracked(&self, id: MigrationId) -> Option<&TrackedMigration> {
        self.reconciler.get(id)
    }

    pub fn status(&self, id: MigrationId) -> Option<MigrationStatus> {
        self.reconciler.status(id)
    }

    pub fn is_polling(&self, id: MigrationId) -> bool {
        self.polls.is_scheduled(id)
    }

    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    /// First migration, in list order, that is running or waiting to run.
    pub fn active_migration(&self) -> Option<MigrationId> {
        self.ordered()
            .find(|tracked| {
                matches!(
                    tracked.status(),
                    MigrationStatus::InProgress | MigrationStatus::Pending
                )
            })
            .map(TrackedMigration::id)
    }

    pub fn view(&self) -> AppViewModel {
        let migrations: Vec<MigrationRowView> =
            self.ordered().map(|tracked| self.row(tracked)).collect();
        let active_migration = self.active_migration();
        let creating_migration = self.dispatcher.is_creating();

        AppViewModel {
            migrations,
            active_migration,
            accounts: self.accounts.rows(),
            creating_migration,
            can_create_migration: !creating_migration
                && active_migration.is_none()
                && self.accounts.is_loaded()
                && self.accounts.missing_for_migration().is_none(),
            dirty: self.dirty,
        }
    }

    /// Returns whether a re-render is due and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    // Last list order first, then anything tracked but not listed.
    fn ordered(&self) -> impl Iterator<Item = &TrackedMigration> {
        let listed = self
            .listing
            .iter()
            .filter_map(move |id| self.reconciler.get(*id));
        let unlisted = self
            .reconciler
            .iter()
            .filter(move |tracked| !self.listing.contains(&tracked.id()));
        listed.chain(unlisted)
    }

    fn row(&self, tracked: &TrackedMigration) -> MigrationRowView {
        let record = &tracked.record;
        let id = record.id;
        MigrationRowView {
            id,
            status: record.status,
            total_count: record.total_count,
            migrated_count: record.migrated_count,
            failed_count: record.failed_count,
            progress_percent: progress_percent(record.migrated_count, record.total_count),
            current_item_name: tracked.current_item_name.clone(),
            speed: tracked.speed,
            estimated_remaining_minutes: tracked.estimated_remaining_minutes,
            started_at: record.started_at.clone(),
            completed_at: record.completed_at.clone(),
            error_message: record.error_message.clone(),
            actions: Command::available_for(record.status),
            command_in_flight: self.dispatcher.in_flight(id),
            awaiting_cancel_confirmation: self.dispatcher.awaiting_confirmation(id),
            polling: self.polls.is_scheduled(id),
            live: self.live.contains(&id),
        }
    }
}
