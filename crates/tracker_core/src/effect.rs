use crate::{Command, MigrationId, MigrationStatus};

/// Work requested from the outside world by `update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ListMigrations { filter: Option<MigrationStatus> },
    FetchMigration { migration_id: MigrationId },
    StartPolling { migration_id: MigrationId },
    StopPolling { migration_id: MigrationId },
    Subscribe { migration_id: MigrationId },
    Unsubscribe { migration_id: MigrationId },
    /// Ask the user before a destructive command is sent.
    ConfirmCancel { migration_id: MigrationId },
    SendCommand {
        migration_id: MigrationId,
        command: Command,
    },
    /// Create a migration from the linked accounts.
    CreateMigration,
    LoadCredentials,
    /// Re-read account state after `service` was linked.
    RefreshCredentials { service: String },
    /// Rewrite the ambient query string in place, without navigation.
    ReplaceLocationQuery { query: Option<String> },
    Notify(Notification),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub text: String,
}

impl Notification {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            text: text.into(),
        }
    }

    pub(crate) fn command_confirmed(command: Command, migration_id: MigrationId) -> Self {
        let verb = match command {
            Command::Start => "started",
            Command::Pause => "paused",
            Command::Resume => "resumed",
            Command::Cancel => "cancelled",
        };
        Self::success(format!("Migration {migration_id} {verb}"))
    }
}
