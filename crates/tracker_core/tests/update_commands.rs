use std::sync::Once;

use pretty_assertions::assert_eq;
use tracker_core::{
    update, AppState, Command, Effect, MigrationRecord, MigrationStatus, Msg, Notification,
    ProgressSnapshot, UpdateSource, View,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(tracker_logging::initialize_for_tests);
}

fn record(id: u64, status: MigrationStatus, migrated: u64) -> MigrationRecord {
    MigrationRecord {
        id,
        user_id: Some(1),
        status,
        total_count: 100,
        migrated_count: migrated,
        failed_count: 0,
        started_at: Some("2024-05-01T09:00:00".to_string()),
        completed_at: None,
        error_message: None,
        created_at: Some("2024-05-01T08:59:00".to_string()),
    }
}

/// Detail view open on `id`, holding `status`.
fn watching(id: u64, status: MigrationStatus) -> AppState {
    let (state, _) = update(
        AppState::new(),
        Msg::ViewEntered {
            view: View::Detail(id),
            location_query: None,
        },
    );
    let (state, _) = update(state, Msg::MigrationFetched(record(id, status, 40)));
    state
}

fn request(state: AppState, id: u64, command: Command) -> (AppState, Vec<Effect>) {
    update(
        state,
        Msg::CommandRequested {
            migration_id: id,
            command,
        },
    )
}

fn succeeded(
    state: AppState,
    id: u64,
    command: Command,
    reported: Option<MigrationStatus>,
) -> (AppState, Vec<Effect>) {
    update(
        state,
        Msg::CommandSucceeded {
            migration_id: id,
            command,
            reported_status: reported,
        },
    )
}

#[test]
fn pause_on_paused_migration_is_refused_locally() {
    init_logging();
    let state = watching(3, MigrationStatus::Paused);

    let (state, effects) = request(state, 3, Command::Pause);

    assert_eq!(
        effects,
        vec![Effect::Notify(Notification::error(
            "cannot pause a migration that is paused"
        ))]
    );
    assert_eq!(state.status(3), Some(MigrationStatus::Paused));
    assert_eq!(state.view().migration(3).unwrap().command_in_flight, None);
}

#[test]
fn command_on_unknown_migration_is_refused() {
    init_logging();
    let (_state, effects) = request(AppState::new(), 11, Command::Resume);

    assert_eq!(
        effects,
        vec![Effect::Notify(Notification::error("migration 11 is not loaded"))]
    );
}

#[test]
fn pause_waits_for_confirmation_before_changing_status() {
    init_logging();
    let state = watching(3, MigrationStatus::InProgress);
    assert!(state.is_polling(3));

    let (state, effects) = request(state, 3, Command::Pause);
    assert_eq!(
        effects,
        vec![Effect::SendCommand {
            migration_id: 3,
            command: Command::Pause,
        }]
    );
    let row = state.view().migration(3).unwrap().clone();
    assert_eq!(row.status, MigrationStatus::InProgress);
    assert_eq!(row.command_in_flight, Some(Command::Pause));

    let (state, effects) = succeeded(state, 3, Command::Pause, Some(MigrationStatus::Paused));
    assert_eq!(
        effects,
        vec![
            Effect::StopPolling { migration_id: 3 },
            Effect::Notify(Notification::success("Migration 3 paused")),
        ]
    );
    let row = state.view().migration(3).unwrap().clone();
    assert_eq!(row.status, MigrationStatus::Paused);
    assert_eq!(row.command_in_flight, None);
    assert_eq!(row.actions, vec![Command::Resume, Command::Cancel]);
}

#[test]
fn second_command_while_unresolved_is_rejected() {
    init_logging();
    let state = watching(3, MigrationStatus::InProgress);
    let (state, _) = request(state, 3, Command::Pause);

    let (state, effects) = request(state, 3, Command::Cancel);

    assert_eq!(
        effects,
        vec![Effect::Notify(Notification::error(
            "a pause request for migration 3 is still unresolved"
        ))]
    );
    assert_eq!(
        state.view().migration(3).unwrap().command_in_flight,
        Some(Command::Pause)
    );
}

#[test]
fn server_reported_status_wins_over_command_target() {
    init_logging();
    let state = watching(3, MigrationStatus::InProgress);
    let (state, _) = request(state, 3, Command::Pause);

    // The migration finished while the pause was in flight.
    let (state, effects) = succeeded(state, 3, Command::Pause, Some(MigrationStatus::Completed));

    assert_eq!(
        effects,
        vec![
            Effect::StopPolling { migration_id: 3 },
            Effect::Notify(Notification::success("Migration 3 is completed")),
        ]
    );
    assert_eq!(state.status(3), Some(MigrationStatus::Completed));
}

#[test]
fn success_without_reported_status_rereads_the_migration() {
    init_logging();
    let state = watching(3, MigrationStatus::Paused);
    let (state, _) = request(state, 3, Command::Resume);

    let (state, effects) = succeeded(state, 3, Command::Resume, None);

    assert_eq!(effects, vec![Effect::FetchMigration { migration_id: 3 }]);
    assert_eq!(state.status(3), Some(MigrationStatus::Paused));
    assert_eq!(state.view().migration(3).unwrap().command_in_flight, None);
}

#[test]
fn resume_restarts_polling() {
    init_logging();
    let state = watching(3, MigrationStatus::Paused);
    assert!(!state.is_polling(3));
    let (state, _) = request(state, 3, Command::Resume);

    let (state, effects) = succeeded(state, 3, Command::Resume, Some(MigrationStatus::InProgress));

    assert_eq!(
        effects,
        vec![
            Effect::StartPolling { migration_id: 3 },
            Effect::Notify(Notification::success("Migration 3 resumed")),
        ]
    );
    assert!(state.is_polling(3));
}

#[test]
fn rejection_leaves_status_unchanged() {
    init_logging();
    let state = watching(3, MigrationStatus::InProgress);
    let (state, _) = request(state, 3, Command::Pause);

    let (state, effects) = update(
        state,
        Msg::CommandRejected {
            migration_id: 3,
            command: Command::Pause,
            reason: "Can only pause running migrations".to_string(),
        },
    );

    assert_eq!(
        effects,
        vec![Effect::Notify(Notification::error(
            "Could not pause migration 3: Can only pause running migrations"
        ))]
    );
    let row = state.view().migration(3).unwrap().clone();
    assert_eq!(row.status, MigrationStatus::InProgress);
    assert_eq!(row.command_in_flight, None);
    assert!(row.polling);

    // A fresh command is accepted once the first resolved.
    let (_state, effects) = request(state, 3, Command::Pause);
    assert_eq!(
        effects,
        vec![Effect::SendCommand {
            migration_id: 3,
            command: Command::Pause,
        }]
    );
}

#[test]
fn cancel_requires_confirmation() {
    init_logging();
    let state = watching(5, MigrationStatus::InProgress);

    let (state, effects) = request(state, 5, Command::Cancel);
    assert_eq!(effects, vec![Effect::ConfirmCancel { migration_id: 5 }]);
    assert!(state.view().migration(5).unwrap().awaiting_cancel_confirmation);

    let (state, effects) = update(state, Msg::CancelConfirmed { migration_id: 5 });
    assert_eq!(
        effects,
        vec![Effect::SendCommand {
            migration_id: 5,
            command: Command::Cancel,
        }]
    );
    let row = state.view().migration(5).unwrap().clone();
    assert!(!row.awaiting_cancel_confirmation);
    assert_eq!(row.command_in_flight, Some(Command::Cancel));
}

#[test]
fn dismissed_cancel_sends_nothing() {
    init_logging();
    let state = watching(5, MigrationStatus::Paused);
    let (state, _) = request(state, 5, Command::Cancel);

    let (state, effects) = update(state, Msg::CancelDismissed { migration_id: 5 });
    assert!(effects.is_empty());
    assert!(!state.view().migration(5).unwrap().awaiting_cancel_confirmation);

    let (_state, effects) = update(state, Msg::CancelConfirmed { migration_id: 5 });
    assert_eq!(
        effects,
        vec![Effect::Notify(Notification::error(
            "no cancel is awaiting confirmation for migration 5"
        ))]
    );
}

#[test]
fn confirmation_rechecks_status() {
    init_logging();
    let state = watching(5, MigrationStatus::InProgress);
    let (state, _) = request(state, 5, Command::Cancel);
    let (state, _) = update(
        state,
        Msg::SnapshotReceived {
            snapshot: ProgressSnapshot {
                migration_id: 5,
                status: MigrationStatus::Completed,
                total_count: 100,
                migrated_count: 100,
                failed_count: 0,
                current_item_name: None,
                speed: None,
                estimated_remaining_minutes: None,
            },
            source: UpdateSource::Push,
        },
    );

    let (_state, effects) = update(state, Msg::CancelConfirmed { migration_id: 5 });

    assert_eq!(
        effects,
        vec![Effect::Notify(Notification::error(
            "cannot cancel a migration that is completed"
        ))]
    );
}

#[test]
fn cancelled_migration_is_removed_and_stays_removed() {
    init_logging();
    let state = watching(5, MigrationStatus::InProgress);
    let (state, _) = update(state, Msg::MigrationsListed(vec![record(5, MigrationStatus::InProgress, 40)]));
    let (state, _) = request(state, 5, Command::Cancel);
    let (state, _) = update(state, Msg::CancelConfirmed { migration_id: 5 });

    let (state, effects) = succeeded(state, 5, Command::Cancel, None);
    assert_eq!(
        effects,
        vec![
            Effect::StopPolling { migration_id: 5 },
            Effect::Notify(Notification::success("Migration 5 cancelled")),
        ]
    );
    assert!(state.view().migration(5).is_none());
    assert_eq!(state.view().active_migration, None);

    // Late list rows and push events do not bring it back.
    let (state, _) = update(
        state,
        Msg::MigrationsListed(vec![
            record(5, MigrationStatus::Failed, 40),
            record(6, MigrationStatus::Completed, 100),
        ]),
    );
    let (state, effects) = update(
        state,
        Msg::SnapshotReceived {
            snapshot: ProgressSnapshot::from(&record(5, MigrationStatus::InProgress, 45)),
            source: UpdateSource::Push,
        },
    );
    assert!(effects.is_empty());
    let ids: Vec<_> = state.view().migrations.iter().map(|row| row.id).collect();
    assert_eq!(ids, vec![6]);

    // The detail view still releases its subscription on exit.
    let (_state, effects) = update(state, Msg::ViewExited { view: View::Detail(5) });
    assert_eq!(effects, vec![Effect::Unsubscribe { migration_id: 5 }]);
}
