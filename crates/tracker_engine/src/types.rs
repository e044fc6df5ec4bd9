use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type MigrationId = u64;

/// Migration as served by `GET /api/v1/migrations/{id}` and list reads.
/// Status is kept as the raw wire string; interpreting it is the caller's job.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MigrationDto {
    pub id: MigrationId,
    #[serde(default)]
    pub user_id: Option<u64>,
    pub status: String,
    #[serde(default)]
    pub total_photos: u64,
    #[serde(default)]
    pub migrated_photos: u64,
    #[serde(default)]
    pub failed_photos: u64,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MigrationPage {
    pub migrations: Vec<MigrationDto>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// Progress reading, shared by the progress endpoint and push payloads.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProgressDto {
    pub migration_id: MigrationId,
    pub status: String,
    #[serde(default)]
    pub total_photos: u64,
    #[serde(default)]
    pub migrated_photos: u64,
    #[serde(default)]
    pub failed_photos: u64,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub current_photo: Option<String>,
    #[serde(default)]
    pub speed_mbps: Option<f64>,
    #[serde(default)]
    pub estimated_time_remaining_minutes: Option<f64>,
}

/// Body of a successful pause/resume/delete.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandAck {
    #[serde(default = "default_success")]
    pub success: bool,
    /// Status the server left the migration in, when it says.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl CommandAck {
    /// Success without a body, as for `204 No Content`.
    pub fn accepted() -> Self {
        Self {
            success: true,
            status: None,
            message: None,
        }
    }
}

fn default_success() -> bool {
    true
}

/// Options sent when creating a migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationOptions {
    pub preserve_structure: bool,
    pub skip_duplicates: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            preserve_structure: true,
            skip_duplicates: true,
        }
    }
}

/// Linked account as listed by `GET /api/v1/credentials`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CredentialDto {
    pub id: u64,
    pub service_type: String,
    #[serde(default = "default_credential_status")]
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

fn default_credential_status() -> String {
    "configured".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CredentialList {
    pub credentials: Vec<CredentialDto>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub status: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            status: None,
            page: 1,
            limit: 20,
        }
    }
}

impl ListQuery {
    pub const MAX_LIMIT: u32 = 100;

    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
    }

    /// Page and limit clamped to what the service accepts.
    pub fn normalized(&self) -> Self {
        Self {
            status: self.status.clone(),
            page: self.page.max(1),
            limit: self.limit.clamp(1, Self::MAX_LIMIT),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    Start,
    Pause,
    Resume,
    Delete,
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteCommand::Start => write!(f, "start"),
            RemoteCommand::Pause => write!(f, "pause"),
            RemoteCommand::Resume => write!(f, "resume"),
            RemoteCommand::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressSource {
    Poll,
    Push,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Listed(Result<MigrationPage, ApiError>),
    Fetched {
        migration_id: MigrationId,
        result: Result<MigrationDto, ApiError>,
    },
    Progress {
        source: ProgressSource,
        progress: ProgressDto,
    },
    PollFailed {
        migration_id: MigrationId,
        error: ApiError,
    },
    PushConnection {
        migration_id: MigrationId,
        connected: bool,
    },
    /// A push frame for this subscription could not be decoded.
    PushMalformed {
        migration_id: MigrationId,
        reason: String,
    },
    CommandCompleted {
        migration_id: MigrationId,
        command: RemoteCommand,
        result: Result<CommandAck, ApiError>,
    },
    Created(Result<MigrationDto, ApiError>),
    CredentialsListed(Result<Vec<CredentialDto>, ApiError>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Text suitable for a user-facing notification.
    pub fn reason(&self) -> String {
        match &self.kind {
            FailureKind::Rejected { detail } => detail.clone(),
            kind => kind.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    /// The service refused the request and said why.
    Rejected { detail: String },
    Timeout,
    Network,
    Decode,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Rejected { detail } => write!(f, "rejected: {detail}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "malformed response"),
        }
    }
}
