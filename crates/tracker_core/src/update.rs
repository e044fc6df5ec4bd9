use tracker_logging::{tracker_error, tracker_info, tracker_warn};

use crate::dispatch::Dispatch;
use crate::reconcile::ApplyOutcome;
use crate::redirect::RedirectOutcome;
use crate::schedule::ScheduleChange;
use crate::{
    service_label, AppState, Command, Effect, MigrationId, MigrationRecord, MigrationStatus, Msg,
    Notification, UpdateSource, View,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::ViewEntered {
            view,
            location_query,
        } => enter_view(&mut state, view, location_query.as_deref()),
        Msg::ViewExited { view } => exit_view(&mut state, view),
        Msg::ListRequested { filter } => vec![Effect::ListMigrations { filter }],
        Msg::MigrationsListed(records) => {
            state.listing = records
                .iter()
                .map(|record| record.id)
                .filter(|id| !state.reconciler.is_removed(*id))
                .collect();
            state.mark_dirty();
            let mut effects = Vec::new();
            for record in records {
                let id = record.id;
                let outcome = state.reconciler.apply_record(record, UpdateSource::Poll);
                effects.extend(after_apply(&mut state, id, outcome));
            }
            effects
        }
        Msg::MigrationFetched(record) => {
            let id = record.id;
            let outcome = state.reconciler.apply_record(record, UpdateSource::Poll);
            after_apply(&mut state, id, outcome)
        }
        Msg::SnapshotReceived { snapshot, source } => {
            let id = snapshot.migration_id;
            let outcome = state.reconciler.apply(snapshot, source);
            after_apply(&mut state, id, outcome)
        }
        Msg::FetchFailed {
            migration_id,
            reason,
        } => {
            // The next scheduled tick retries; nothing to change here.
            tracker_warn!("fetch failed for migration {:?}: {}", migration_id, reason);
            Vec::new()
        }
        Msg::ProtocolViolation {
            migration_id,
            reason,
        } => {
            tracker_error!(
                "protocol violation for migration {:?}: {}",
                migration_id,
                reason
            );
            vec![Effect::Notify(Notification::error(format!(
                "Ignored an invalid update: {reason}"
            )))]
        }
        Msg::PushConnectionChanged {
            migration_id,
            connected,
        } => {
            let changed = if connected {
                state.live.insert(migration_id)
            } else {
                state.live.remove(&migration_id)
            };
            if changed {
                tracker_info!(
                    "push channel for migration {} {}",
                    migration_id,
                    if connected { "connected" } else { "lost; polling only" }
                );
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::CommandRequested {
            migration_id,
            command,
        } => request_command(&mut state, migration_id, command),
        Msg::CancelConfirmed { migration_id } => {
            let status = state.reconciler.status(migration_id);
            match state.dispatcher.confirm_cancel(migration_id, status) {
                Ok(command) => {
                    tracker_info!("sending {} for migration {}", command, migration_id);
                    state.mark_dirty();
                    vec![Effect::SendCommand {
                        migration_id,
                        command,
                    }]
                }
                Err(err) => {
                    tracker_warn!("cancel confirmation dropped: {}", err);
                    state.mark_dirty();
                    vec![Effect::Notify(Notification::error(err.to_string()))]
                }
            }
        }
        Msg::CancelDismissed { migration_id } => {
            if state.dispatcher.dismiss_cancel(migration_id) {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::CommandSucceeded {
            migration_id,
            command,
            reported_status,
        } => command_succeeded(&mut state, migration_id, command, reported_status),
        Msg::CommandRejected {
            migration_id,
            command,
            reason,
        } => {
            if state.dispatcher.resolve(migration_id, command) {
                state.mark_dirty();
            }
            tracker_warn!(
                "{} rejected for migration {}: {}",
                command,
                migration_id,
                reason
            );
            vec![Effect::Notify(Notification::error(format!(
                "Could not {command} migration {migration_id}: {reason}"
            )))]
        }
        Msg::CreateRequested => request_create(&mut state),
        Msg::MigrationCreated(record) => migration_created(&mut state, record),
        Msg::CreateRejected { reason } => {
            if state.dispatcher.resolve_create() {
                state.mark_dirty();
            }
            tracker_warn!("migration create rejected: {}", reason);
            vec![Effect::Notify(Notification::error(format!(
                "Could not start a migration: {reason}"
            )))]
        }
        Msg::CredentialsLoaded(credentials) => {
            tracker_info!("{} linked account(s) loaded", credentials.len());
            state.accounts.replace(credentials);
            state.mark_dirty();
            Vec::new()
        }
        Msg::CredentialsFailed { reason } => {
            tracker_warn!("account read failed: {}", reason);
            vec![Effect::Notify(Notification::error(format!(
                "Could not load linked accounts: {reason}"
            )))]
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn enter_view(state: &mut AppState, view: View, location_query: Option<&str>) -> Vec<Effect> {
    let mut effects = Vec::new();
    let mut accounts_requested = false;

    if view.completes_authorization() {
        if let Some(consumed) = state.redirects.inspect(location_query) {
            let redirect = consumed.redirect;
            tracker_info!(
                "authorization redirect for {}: {:?}",
                redirect.service,
                redirect.outcome
            );
            effects.push(Effect::ReplaceLocationQuery {
                query: consumed.remaining_query,
            });
            if redirect.outcome == RedirectOutcome::Success {
                effects.push(Effect::RefreshCredentials {
                    service: redirect.service.clone(),
                });
                accounts_requested = true;
            }
            effects.push(Effect::Notify(redirect.notification()));
        }
    }

    if view.shows_accounts() && !accounts_requested {
        effects.push(Effect::LoadCredentials);
    }

    match view {
        View::Dashboard => effects.push(Effect::ListMigrations { filter: None }),
        View::History { filter } => effects.push(Effect::ListMigrations { filter }),
        View::Settings => {}
        View::Detail(id) => {
            if state.polls.watch(id) {
                effects.push(Effect::FetchMigration { migration_id: id });
                effects.push(Effect::Subscribe { migration_id: id });
            }
            effects.extend(sync_schedule(state, id));
        }
    }
    effects
}

fn exit_view(state: &mut AppState, view: View) -> Vec<Effect> {
    let View::Detail(id) = view else {
        return Vec::new();
    };
    if !state.polls.unwatch(id) {
        return Vec::new();
    }

    let mut effects: Vec<Effect> = sync_schedule(state, id).into_iter().collect();
    state.dispatcher.dismiss_cancel(id);
    state.live.remove(&id);
    state.mark_dirty();
    effects.push(Effect::Unsubscribe { migration_id: id });
    effects
}

fn request_command(state: &mut AppState, migration_id: MigrationId, command: Command) -> Vec<Effect> {
    let status = state.reconciler.status(migration_id);
    match state.dispatcher.request(migration_id, command, status) {
        Ok(Dispatch::Send(command)) => {
            tracker_info!("sending {} for migration {}", command, migration_id);
            state.mark_dirty();
            vec![Effect::SendCommand {
                migration_id,
                command,
            }]
        }
        Ok(Dispatch::ConfirmFirst) => {
            state.mark_dirty();
            vec![Effect::ConfirmCancel { migration_id }]
        }
        Err(err) => {
            tracker_warn!("{} refused locally: {}", command, err);
            vec![Effect::Notify(Notification::error(err.to_string()))]
        }
    }
}

fn request_create(state: &mut AppState) -> Vec<Effect> {
    let active = state.active_migration();
    let missing = state.accounts.missing_for_migration().map(service_label);
    match state.dispatcher.request_create(active, missing) {
        Ok(()) => {
            tracker_info!("creating a migration");
            state.mark_dirty();
            vec![Effect::CreateMigration]
        }
        Err(err) => {
            tracker_warn!("create refused locally: {}", err);
            vec![Effect::Notify(Notification::error(err.to_string()))]
        }
    }
}

fn migration_created(state: &mut AppState, record: MigrationRecord) -> Vec<Effect> {
    if !state.dispatcher.resolve_create() {
        tracker_warn!("migration {} created without a pending request", record.id);
    }
    let id = record.id;
    tracker_info!("migration {} created ({})", id, record.status);
    if !state.listing.contains(&id) {
        state.listing.insert(0, id);
    }
    state.mark_dirty();
    let outcome = state.reconciler.apply_record(record, UpdateSource::Command);
    let mut effects = after_apply(state, id, outcome);
    effects.push(Effect::Notify(Notification::success(format!(
        "Migration {id} created"
    ))));
    effects
}

fn command_succeeded(
    state: &mut AppState,
    migration_id: MigrationId,
    command: Command,
    reported_status: Option<MigrationStatus>,
) -> Vec<Effect> {
    if !state.dispatcher.resolve(migration_id, command) {
        tracker_warn!(
            "confirmation for {} on migration {} had no matching request",
            command,
            migration_id
        );
    }
    tracker_info!(
        "{} confirmed for migration {} (server status {:?})",
        command,
        migration_id,
        reported_status
    );
    state.mark_dirty();

    if command == Command::Cancel {
        state.reconciler.remove(migration_id);
        state.listing.retain(|id| *id != migration_id);
        // The detail view still owns the push subscription until it exits.
        let mut effects: Vec<Effect> = sync_schedule(state, migration_id).into_iter().collect();
        effects.push(Effect::Notify(Notification::command_confirmed(
            command,
            migration_id,
        )));
        return effects;
    }

    // Without a reported status the outcome is unknown; re-read instead of
    // assuming the command's target state.
    let (Some(status), Some(tracked)) = (reported_status, state.reconciler.get(migration_id))
    else {
        return vec![Effect::FetchMigration { migration_id }];
    };

    let mut candidate = tracked.snapshot();
    candidate.status = status;
    let outcome = state.reconciler.apply(candidate, UpdateSource::Command);
    let accepted = outcome.is_accepted();
    let mut effects = after_apply(state, migration_id, outcome);
    if accepted {
        let notification = if command.target_status() == Some(status) {
            Notification::command_confirmed(command, migration_id)
        } else {
            Notification::success(format!("Migration {migration_id} is {status}"))
        };
        effects.push(Effect::Notify(notification));
    }
    effects
}

fn after_apply(state: &mut AppState, id: MigrationId, outcome: ApplyOutcome) -> Vec<Effect> {
    let mut effects = Vec::new();
    match &outcome {
        ApplyOutcome::Adopted { .. } | ApplyOutcome::Accepted { .. } => {
            if let Some((from, to)) = outcome.status_change() {
                tracker_info!("migration {} {} -> {}", id, from, to);
            }
            state.mark_dirty();
        }
        ApplyOutcome::Violation(err) => {
            effects.push(Effect::Notify(Notification::error(format!(
                "Ignored an invalid update for migration {id}: {err}"
            ))));
        }
        ApplyOutcome::TerminalRegression { .. }
        | ApplyOutcome::Stale { .. }
        | ApplyOutcome::Removed => {}
    }
    effects.extend(sync_schedule(state, id));
    effects
}

fn sync_schedule(state: &mut AppState, id: MigrationId) -> Option<Effect> {
    let status = state.reconciler.status(id);
    let change = state.polls.sync(id, status)?;
    state.mark_dirty();
    Some(match change {
        ScheduleChange::Start => {
            tracker_info!("polling migration {}", id);
            Effect::StartPolling { migration_id: id }
        }
        ScheduleChange::Stop => {
            tracker_info!("stopped polling migration {} ({:?})", id, status);
            Effect::StopPolling { migration_id: id }
        }
    })
}
