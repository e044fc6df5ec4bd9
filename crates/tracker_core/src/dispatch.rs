use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::{MigrationId, MigrationStatus};

/// User-issued control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Starts a migration that is still waiting to run.
    Start,
    Pause,
    Resume,
    Cancel,
}

impl Command {
    pub fn is_valid_from(self, status: MigrationStatus) -> bool {
        match self {
            Command::Start => status == MigrationStatus::Pending,
            Command::Pause => status == MigrationStatus::InProgress,
            Command::Resume => status == MigrationStatus::Paused,
            Command::Cancel => !status.is_terminal(),
        }
    }

    /// Status a confirmed command normally leaves the migration in. Cancel
    /// removes the migration instead.
    pub fn target_status(self) -> Option<MigrationStatus> {
        match self {
            Command::Start => Some(MigrationStatus::InProgress),
            Command::Pause => Some(MigrationStatus::Paused),
            Command::Resume => Some(MigrationStatus::InProgress),
            Command::Cancel => None,
        }
    }

    /// Cancel discards server-side progress and needs an explicit yes.
    pub fn requires_confirmation(self) -> bool {
        self == Command::Cancel
    }

    /// Commands offered for a migration in `status`.
    pub fn available_for(status: MigrationStatus) -> Vec<Command> {
        [Command::Start, Command::Pause, Command::Resume, Command::Cancel]
            .into_iter()
            .filter(|command| command.is_valid_from(status))
            .collect()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Cancel => "cancel",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("migration {0} is not loaded")]
    UnknownMigration(MigrationId),
    #[error("cannot {command} a migration that is {status}")]
    InvalidState {
        command: Command,
        status: MigrationStatus,
    },
    #[error("a {pending} request for migration {migration_id} is still unresolved")]
    AlreadyInFlight {
        migration_id: MigrationId,
        pending: Command,
    },
    #[error("no cancel is awaiting confirmation for migration {0}")]
    NotAwaitingConfirmation(MigrationId),
    #[error("a new migration is already being created")]
    CreateInFlight,
    #[error("migration {0} has not finished yet")]
    MigrationAlreadyActive(MigrationId),
    #[error("connect {0} before starting a migration")]
    AccountNotConnected(String),
}

/// What the caller should do after a command passed local checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Send(Command),
    ConfirmFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    AwaitingConfirmation,
    Sent(Command),
}

/// Gatekeeper for pause/resume/cancel. At most one unresolved command per
/// migration id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandDispatcher {
    pending: BTreeMap<MigrationId, Pending>,
    creating: bool,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(
        &mut self,
        migration_id: MigrationId,
        command: Command,
        status: Option<MigrationStatus>,
    ) -> Result<Dispatch, CommandError> {
        if let Some(pending) = self.pending.get(&migration_id) {
            let pending = match pending {
                Pending::AwaitingConfirmation => Command::Cancel,
                Pending::Sent(command) => *command,
            };
            return Err(CommandError::AlreadyInFlight {
                migration_id,
                pending,
            });
        }
        let status = status.ok_or(CommandError::UnknownMigration(migration_id))?;
        if !command.is_valid_from(status) {
            return Err(CommandError::InvalidState { command, status });
        }

        if command.requires_confirmation() {
            self.pending
                .insert(migration_id, Pending::AwaitingConfirmation);
            Ok(Dispatch::ConfirmFirst)
        } else {
            self.pending.insert(migration_id, Pending::Sent(command));
            Ok(Dispatch::Send(command))
        }
    }

    /// Turns an awaiting cancel into a sent one. The status is re-checked
    /// because the migration may have finished while the prompt was open.
    pub fn confirm_cancel(
        &mut self,
        migration_id: MigrationId,
        status: Option<MigrationStatus>,
    ) -> Result<Command, CommandError> {
        if self.pending.get(&migration_id) != Some(&Pending::AwaitingConfirmation) {
            return Err(CommandError::NotAwaitingConfirmation(migration_id));
        }
        let Some(status) = status else {
            self.pending.remove(&migration_id);
            return Err(CommandError::UnknownMigration(migration_id));
        };
        if !Command::Cancel.is_valid_from(status) {
            self.pending.remove(&migration_id);
            return Err(CommandError::InvalidState {
                command: Command::Cancel,
                status,
            });
        }
        self.pending
            .insert(migration_id, Pending::Sent(Command::Cancel));
        Ok(Command::Cancel)
    }

    pub fn dismiss_cancel(&mut self, migration_id: MigrationId) -> bool {
        if self.pending.get(&migration_id) == Some(&Pending::AwaitingConfirmation) {
            self.pending.remove(&migration_id);
            true
        } else {
            false
        }
    }

    /// Clears the in-flight command once the server answered.
    pub fn resolve(&mut self, migration_id: MigrationId, command: Command) -> bool {
        if self.pending.get(&migration_id) == Some(&Pending::Sent(command)) {
            self.pending.remove(&migration_id);
            true
        } else {
            false
        }
    }

    pub fn in_flight(&self, migration_id: MigrationId) -> Option<Command> {
        match self.pending.get(&migration_id) {
            Some(Pending::Sent(command)) => Some(*command),
            _ => None,
        }
    }

    pub fn awaiting_confirmation(&self, migration_id: MigrationId) -> bool {
        self.pending.get(&migration_id) == Some(&Pending::AwaitingConfirmation)
    }

    /// Allows one create at a time, and only while no other migration is
    /// unfinished. Missing accounts block it once their state is known.
    pub fn request_create(
        &mut self,
        active: Option<MigrationId>,
        missing_account: Option<&str>,
    ) -> Result<(), CommandError> {
        if self.creating {
            return Err(CommandError::CreateInFlight);
        }
        if let Some(migration_id) = active {
            return Err(CommandError::MigrationAlreadyActive(migration_id));
        }
        if let Some(service) = missing_account {
            return Err(CommandError::AccountNotConnected(service.to_string()));
        }
        self.creating = true;
        Ok(())
    }

    pub fn resolve_create(&mut self) -> bool {
        std::mem::take(&mut self.creating)
    }

    pub fn is_creating(&self) -> bool {
        self.creating
    }
}
