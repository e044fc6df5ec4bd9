use crate::MigrationStatus;

pub type MigrationId = u64;
pub type UserId = u64;

/// A migration as returned by list/detail reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub id: MigrationId,
    pub user_id: Option<UserId>,
    pub status: MigrationStatus,
    pub total_count: u64,
    pub migrated_count: u64,
    pub failed_count: u64,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Option<String>,
}

impl MigrationRecord {
    pub fn processed(&self) -> u64 {
        self.migrated_count.saturating_add(self.failed_count)
    }
}

/// A point-in-time progress reading. Never authoritative on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub migration_id: MigrationId,
    pub status: MigrationStatus,
    pub total_count: u64,
    pub migrated_count: u64,
    pub failed_count: u64,
    pub current_item_name: Option<String>,
    /// MB/s as reported by the transfer engine.
    pub speed: Option<f64>,
    pub estimated_remaining_minutes: Option<f64>,
}

impl ProgressSnapshot {
    pub fn processed(&self) -> u64 {
        self.migrated_count.saturating_add(self.failed_count)
    }
}

impl From<&MigrationRecord> for ProgressSnapshot {
    fn from(record: &MigrationRecord) -> Self {
        Self {
            migration_id: record.id,
            status: record.status,
            total_count: record.total_count,
            migrated_count: record.migrated_count,
            failed_count: record.failed_count,
            current_item_name: None,
            speed: None,
            estimated_remaining_minutes: None,
        }
    }
}

/// Which producer delivered a candidate update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    Poll,
    Push,
    /// Status reported back by a confirmed pause/resume.
    Command,
}

/// Screens that own tracking resources or inspect redirect parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Dashboard,
    /// Past and current migrations, optionally narrowed to one status.
    History { filter: Option<MigrationStatus> },
    Settings,
    Detail(MigrationId),
}

impl View {
    /// Views an external authorization flow can return to.
    pub fn completes_authorization(self) -> bool {
        matches!(self, View::Dashboard | View::Settings)
    }

    /// Views that show linked account state.
    pub fn shows_accounts(self) -> bool {
        matches!(self, View::Dashboard | View::Settings)
    }
}
