use tracker_core::{
    Command, Credential, CredentialStatus, Effect, MigrationId, MigrationRecord, MigrationStatus,
    Msg, Notification, ProgressSnapshot, TransientLocation, UpdateSource, UrlLocation,
};
use tracker_engine::{
    CredentialDto, EngineEvent, EngineHandle, ListQuery, MigrationDto, MigrationOptions,
    ProgressDto, ProgressSource, RemoteCommand,
};
use tracker_logging::{tracker_info, tracker_warn};

/// Executes core effects against the engine and the session's location.
pub struct EffectRunner {
    engine: EngineHandle,
    location: Option<UrlLocation>,
    notifications: Vec<Notification>,
    confirm_prompt: Option<MigrationId>,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle, location: Option<UrlLocation>) -> Self {
        Self {
            engine,
            location,
            notifications: Vec::new(),
            confirm_prompt: None,
        }
    }

    pub fn location_query(&self) -> Option<String> {
        self.location.as_ref().and_then(TransientLocation::query)
    }

    pub fn enqueue(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::ListMigrations { filter } => {
                    let query = match filter {
                        Some(status) => ListQuery::with_status(status.as_str()),
                        None => ListQuery::default(),
                    };
                    self.engine.list(query);
                }
                Effect::FetchMigration { migration_id } => self.engine.fetch(migration_id),
                Effect::StartPolling { migration_id } => {
                    self.engine.start_polling(migration_id);
                }
                Effect::StopPolling { migration_id } => {
                    self.engine.stop_polling(migration_id);
                }
                Effect::Subscribe { migration_id } => {
                    self.engine.subscribe(migration_id);
                }
                Effect::Unsubscribe { migration_id } => {
                    self.engine.unsubscribe(migration_id);
                }
                Effect::ConfirmCancel { migration_id } => {
                    self.confirm_prompt = Some(migration_id);
                }
                Effect::SendCommand {
                    migration_id,
                    command,
                } => {
                    tracker_info!("SendCommand migration_id={} command={}", migration_id, command);
                    self.engine
                        .send_command(migration_id, remote_command(command));
                }
                Effect::CreateMigration => self.engine.create(MigrationOptions::default()),
                Effect::LoadCredentials => self.engine.list_credentials(),
                Effect::RefreshCredentials { service } => {
                    tracker_info!("{} was linked; re-reading accounts", service);
                    self.engine.list_credentials();
                }
                Effect::ReplaceLocationQuery { query } => {
                    if let Some(location) = self.location.as_mut() {
                        location.replace_query(query.as_deref());
                        tracker_info!("location is now {}", location.url());
                    }
                }
                Effect::Notify(notification) => self.notifications.push(notification),
            }
        }
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Migration whose cancel is waiting for a yes/no, once.
    pub fn take_confirm_prompt(&mut self) -> Option<MigrationId> {
        self.confirm_prompt.take()
    }

    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        self.engine.next_event().await
    }

    pub async fn shutdown(self) {
        self.engine.shutdown().await;
    }
}

fn remote_command(command: Command) -> RemoteCommand {
    match command {
        Command::Start => RemoteCommand::Start,
        Command::Pause => RemoteCommand::Pause,
        Command::Resume => RemoteCommand::Resume,
        Command::Cancel => RemoteCommand::Delete,
    }
}

fn local_command(command: RemoteCommand) -> Command {
    match command {
        RemoteCommand::Start => Command::Start,
        RemoteCommand::Pause => Command::Pause,
        RemoteCommand::Resume => Command::Resume,
        RemoteCommand::Delete => Command::Cancel,
    }
}

/// Translates one engine event into the messages `update` understands.
/// Wire data that does not describe a valid migration becomes a
/// protocol violation instead of a state change.
pub fn map_event(event: EngineEvent) -> Vec<Msg> {
    match event {
        EngineEvent::Listed(Ok(page)) => {
            let mut msgs = Vec::new();
            let mut records = Vec::with_capacity(page.migrations.len());
            for dto in page.migrations {
                let id = dto.id;
                match record_from_dto(dto) {
                    Ok(record) => records.push(record),
                    Err(reason) => msgs.push(Msg::ProtocolViolation {
                        migration_id: Some(id),
                        reason,
                    }),
                }
            }
            msgs.push(Msg::MigrationsListed(records));
            msgs
        }
        EngineEvent::Listed(Err(error)) => vec![Msg::FetchFailed {
            migration_id: None,
            reason: error.to_string(),
        }],
        EngineEvent::Fetched {
            migration_id,
            result,
        } => vec![match result {
            Ok(dto) => match record_from_dto(dto) {
                Ok(record) => Msg::MigrationFetched(record),
                Err(reason) => Msg::ProtocolViolation {
                    migration_id: Some(migration_id),
                    reason,
                },
            },
            Err(error) => Msg::FetchFailed {
                migration_id: Some(migration_id),
                reason: error.to_string(),
            },
        }],
        EngineEvent::Progress { source, progress } => {
            let migration_id = progress.migration_id;
            vec![match snapshot_from_dto(progress) {
                Ok(snapshot) => Msg::SnapshotReceived {
                    snapshot,
                    source: match source {
                        ProgressSource::Poll => UpdateSource::Poll,
                        ProgressSource::Push => UpdateSource::Push,
                    },
                },
                Err(reason) => Msg::ProtocolViolation {
                    migration_id: Some(migration_id),
                    reason,
                },
            }]
        }
        EngineEvent::PollFailed {
            migration_id,
            error,
        } => vec![Msg::FetchFailed {
            migration_id: Some(migration_id),
            reason: error.to_string(),
        }],
        EngineEvent::PushConnection {
            migration_id,
            connected,
        } => vec![Msg::PushConnectionChanged {
            migration_id,
            connected,
        }],
        EngineEvent::PushMalformed {
            migration_id,
            reason,
        } => vec![Msg::ProtocolViolation {
            migration_id: Some(migration_id),
            reason,
        }],
        EngineEvent::CommandCompleted {
            migration_id,
            command,
            result,
        } => {
            let command = local_command(command);
            vec![match result {
                Ok(ack) => Msg::CommandSucceeded {
                    migration_id,
                    command,
                    reported_status: ack.status.as_deref().and_then(|raw| {
                        raw.parse::<MigrationStatus>()
                            .map_err(|err| {
                                tracker_warn!("{} ack for {}: {}", command, migration_id, err)
                            })
                            .ok()
                    }),
                },
                Err(error) => Msg::CommandRejected {
                    migration_id,
                    command,
                    reason: error.reason(),
                },
            }]
        }
        EngineEvent::Created(Ok(dto)) => {
            let id = dto.id;
            vec![match record_from_dto(dto) {
                Ok(record) => Msg::MigrationCreated(record),
                Err(reason) => Msg::ProtocolViolation {
                    migration_id: Some(id),
                    reason,
                },
            }]
        }
        EngineEvent::Created(Err(error)) => vec![Msg::CreateRejected {
            reason: error.reason(),
        }],
        EngineEvent::CredentialsListed(Ok(list)) => {
            let mut msgs = Vec::new();
            let mut credentials = Vec::with_capacity(list.len());
            for dto in list {
                match credential_from_dto(dto) {
                    Ok(credential) => credentials.push(credential),
                    Err(reason) => msgs.push(Msg::ProtocolViolation {
                        migration_id: None,
                        reason,
                    }),
                }
            }
            msgs.push(Msg::CredentialsLoaded(credentials));
            msgs
        }
        EngineEvent::CredentialsListed(Err(error)) => vec![Msg::CredentialsFailed {
            reason: error.to_string(),
        }],
    }
}

fn credential_from_dto(dto: CredentialDto) -> Result<Credential, String> {
    let status = dto
        .status
        .parse::<CredentialStatus>()
        .map_err(|err| format!("{} account: {err}", dto.service_type))?;
    Ok(Credential {
        service: dto.service_type,
        status,
    })
}

fn record_from_dto(dto: MigrationDto) -> Result<MigrationRecord, String> {
    let status = dto.status.parse::<MigrationStatus>().map_err(|err| err.to_string())?;
    Ok(MigrationRecord {
        id: dto.id,
        user_id: dto.user_id,
        status,
        total_count: dto.total_photos,
        migrated_count: dto.migrated_photos,
        failed_count: dto.failed_photos,
        started_at: dto.started_at,
        completed_at: dto.completed_at,
        error_message: dto.error_message,
        created_at: dto.created_at,
    })
}

fn snapshot_from_dto(dto: ProgressDto) -> Result<ProgressSnapshot, String> {
    let status = dto.status.parse::<MigrationStatus>().map_err(|err| err.to_string())?;
    Ok(ProgressSnapshot {
        migration_id: dto.migration_id,
        status,
        total_count: dto.total_photos,
        migrated_count: dto.migrated_photos,
        failed_count: dto.failed_photos,
        current_item_name: dto.current_photo,
        speed: dto.speed_mbps,
        estimated_remaining_minutes: dto.estimated_time_remaining_minutes,
    })
}
