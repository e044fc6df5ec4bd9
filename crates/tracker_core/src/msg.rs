use crate::{
    Command, Credential, MigrationId, MigrationRecord, MigrationStatus, ProgressSnapshot,
    UpdateSource, View,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// A view was shown. `location_query` is the ambient query string at
    /// entry time, if any.
    ViewEntered {
        view: View,
        location_query: Option<String>,
    },
    /// A view was torn down, on any exit path.
    ViewExited { view: View },
    /// User asked for a (filtered) list refresh.
    ListRequested { filter: Option<MigrationStatus> },
    /// List read completed.
    MigrationsListed(Vec<MigrationRecord>),
    /// Detail read completed.
    MigrationFetched(MigrationRecord),
    /// Poll tick or push event produced a progress reading.
    SnapshotReceived {
        snapshot: ProgressSnapshot,
        source: UpdateSource,
    },
    /// A single read or push delivery failed. Never fatal.
    FetchFailed {
        migration_id: Option<MigrationId>,
        reason: String,
    },
    /// A collaborator delivered something that is not a valid update.
    ProtocolViolation {
        migration_id: Option<MigrationId>,
        reason: String,
    },
    /// Push channel for a migration went up or down.
    PushConnectionChanged {
        migration_id: MigrationId,
        connected: bool,
    },
    /// User clicked start/pause/resume/cancel.
    CommandRequested {
        migration_id: MigrationId,
        command: Command,
    },
    CancelConfirmed { migration_id: MigrationId },
    CancelDismissed { migration_id: MigrationId },
    /// Server accepted a command. `reported_status` is the status the
    /// server returned, when it returned one.
    CommandSucceeded {
        migration_id: MigrationId,
        command: Command,
        reported_status: Option<MigrationStatus>,
    },
    /// Server refused a command or the request failed.
    CommandRejected {
        migration_id: MigrationId,
        command: Command,
        reason: String,
    },
    /// User asked for a new migration.
    CreateRequested,
    /// Server created a migration; it starts out pending.
    MigrationCreated(MigrationRecord),
    CreateRejected { reason: String },
    CredentialsLoaded(Vec<Credential>),
    CredentialsFailed { reason: String },
    /// UI/render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
