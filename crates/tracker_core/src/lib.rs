//! Migration tracker core: pure state machine and view-model helpers.
//!
//! Nothing here performs IO. Collaborator work (reads, polling, push
//! subscriptions, commands, location rewrites) is requested through
//! [`Effect`] values returned by [`update`].
mod accounts;
mod dispatch;
mod effect;
mod model;
mod msg;
mod reconcile;
mod redirect;
mod schedule;
mod state;
mod status;
mod update;
mod view_model;

pub use accounts::{
    AccountRow, Accounts, Credential, CredentialStatus, ParseCredentialStatusError,
    REQUIRED_SERVICES,
};
pub use dispatch::{Command, CommandDispatcher, CommandError, Dispatch};
pub use effect::{Effect, Notification, NotificationLevel};
pub use model::{MigrationId, MigrationRecord, ProgressSnapshot, UpdateSource, UserId, View};
pub use msg::Msg;
pub use reconcile::{ApplyOutcome, Reconciler, TrackedMigration};
pub use redirect::{
    service_label, strip_redirect_params, AuthRedirect, ConsumedRedirect, RedirectGuard,
    RedirectOutcome, TransientLocation, UrlLocation,
};
pub use schedule::{PollPlan, ScheduleChange};
pub use state::AppState;
pub use status::{MigrationStatus, ParseStatusError, TransitionError};
pub use update::update;
pub use view_model::{progress_percent, AppViewModel, MigrationRowView};
