use crate::{AccountRow, Command, MigrationId, MigrationStatus};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub migrations: Vec<MigrationRowView>,
    /// First listed migration that is running or waiting to run.
    pub active_migration: Option<MigrationId>,
    /// `None` until account state has been read.
    pub accounts: Option<Vec<AccountRow>>,
    pub creating_migration: bool,
    pub can_create_migration: bool,
    pub dirty: bool,
}

impl AppViewModel {
    pub fn migration(&self, id: MigrationId) -> Option<&MigrationRowView> {
        self.migrations.iter().find(|row| row.id == id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationRowView {
    pub id: MigrationId,
    pub status: MigrationStatus,
    pub total_count: u64,
    pub migrated_count: u64,
    pub failed_count: u64,
    pub progress_percent: u8,
    pub current_item_name: Option<String>,
    pub speed: Option<f64>,
    pub estimated_remaining_minutes: Option<f64>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub error_message: Option<String>,
    pub actions: Vec<Command>,
    pub command_in_flight: Option<Command>,
    pub awaiting_cancel_confirmation: bool,
    pub polling: bool,
    /// Push channel connected; otherwise tracking is poll-only.
    pub live: bool,
}

/// Rounded share of `total` that has been migrated; 0 while the total is unknown.
pub fn progress_percent(migrated: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = (migrated.min(total) as f64 / total as f64 * 100.0).round();
    percent as u8
}
