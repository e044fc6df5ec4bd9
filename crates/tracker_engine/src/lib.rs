//! Tracker engine: snapshot reads, polling, push subscriptions and command
//! requests against the migration service.
mod api;
mod engine;
mod poll;
mod push;
mod settings;
mod types;

pub use api::{MigrationApi, ReqwestMigrationApi};
pub use engine::EngineHandle;
pub use poll::PollScheduler;
pub use push::{decode_push_frame, encode_push_frame, PushChannel, PushError, SubscriptionHandle};
pub use settings::{ClientSettings, DEFAULT_POLL_INTERVAL};
pub use types::{
    ApiError, CommandAck, CredentialDto, CredentialList, EngineEvent, FailureKind, ListQuery,
    MigrationDto, MigrationId, MigrationOptions, MigrationPage, ProgressDto, ProgressSource,
    RemoteCommand,
};
