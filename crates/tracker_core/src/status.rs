use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Lifecycle state of a migration as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MigrationStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal status transition {from} -> {to}")]
pub struct TransitionError {
    pub from: MigrationStatus,
    pub to: MigrationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown migration status {0:?}")]
pub struct ParseStatusError(pub String);

impl MigrationStatus {
    pub const ALL: [MigrationStatus; 5] = [
        MigrationStatus::Pending,
        MigrationStatus::InProgress,
        MigrationStatus::Completed,
        MigrationStatus::Failed,
        MigrationStatus::Paused,
    ];

    /// No transition leaves a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, MigrationStatus::Completed | MigrationStatus::Failed)
    }

    /// The server is actively moving items.
    pub fn is_active(self) -> bool {
        self == MigrationStatus::InProgress
    }

    /// Counters only move forward: the migration has started and is not
    /// finished. A pause keeps its counts.
    pub fn holds_progress(self) -> bool {
        matches!(self, MigrationStatus::InProgress | MigrationStatus::Paused)
    }

    pub fn can_transition_to(self, next: MigrationStatus) -> bool {
        use MigrationStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, Paused)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (Paused, InProgress)
        )
    }

    /// Checks `self -> next` against the transition table. Staying in the
    /// same status is not a transition and always succeeds.
    pub fn transition_to(self, next: MigrationStatus) -> Result<MigrationStatus, TransitionError> {
        if self == next || self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MigrationStatus::Pending => "pending",
            MigrationStatus::InProgress => "in_progress",
            MigrationStatus::Completed => "completed",
            MigrationStatus::Failed => "failed",
            MigrationStatus::Paused => "paused",
        }
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MigrationStatus {
    type Err = ParseStatusError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseStatusError(raw.to_string()))
    }
}
