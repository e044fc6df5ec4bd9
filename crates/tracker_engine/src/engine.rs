use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use tracker_logging::tracker_debug;

use crate::api::{MigrationApi, ReqwestMigrationApi};
use crate::poll::PollScheduler;
use crate::push::{PushChannel, SubscriptionHandle};
use crate::{
    ApiError, ClientSettings, EngineEvent, ListQuery, MigrationId, MigrationOptions,
    ProgressSource, RemoteCommand,
};

/// Owns every IO resource and funnels their results into one event stream.
///
/// Must be created and driven from within a tokio runtime. Reads and
/// commands run as spawned tasks; polling and push subscriptions are keyed
/// by migration id.
pub struct EngineHandle {
    api: Arc<dyn MigrationApi>,
    polls: PollScheduler,
    push: PushChannel,
    subscriptions: HashMap<MigrationId, SubscriptionHandle>,
    event_tx: UnboundedSender<EngineEvent>,
    event_rx: UnboundedReceiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(settings: ClientSettings) -> Result<Self, ApiError> {
        let api = Arc::new(ReqwestMigrationApi::new(&settings)?);
        Ok(Self::with_api(settings, api))
    }

    pub fn with_api(settings: ClientSettings, api: Arc<dyn MigrationApi>) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let polls = PollScheduler::new(api.clone(), settings.poll_interval, event_tx.clone());
        let push = PushChannel::new(settings, event_tx.clone());
        Self {
            api,
            polls,
            push,
            subscriptions: HashMap::new(),
            event_tx,
            event_rx,
        }
    }

    pub fn list(&self, query: ListQuery) {
        let api = self.api.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = api.list(&query).await;
            let _ = event_tx.send(EngineEvent::Listed(result));
        });
    }

    pub fn create(&self, options: MigrationOptions) {
        let api = self.api.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = api.create(&options).await;
            let _ = event_tx.send(EngineEvent::Created(result));
        });
    }

    pub fn list_credentials(&self) {
        let api = self.api.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = api.credentials().await;
            let _ = event_tx.send(EngineEvent::CredentialsListed(result));
        });
    }

    pub fn fetch(&self, migration_id: MigrationId) {
        let api = self.api.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = api.get(migration_id).await;
            let _ = event_tx.send(EngineEvent::Fetched {
                migration_id,
                result,
            });
        });
    }

    pub fn send_command(&self, migration_id: MigrationId, command: RemoteCommand) {
        let api = self.api.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = api.command(migration_id, command).await;
            let _ = event_tx.send(EngineEvent::CommandCompleted {
                migration_id,
                command,
                result,
            });
        });
    }

    pub fn start_polling(&mut self, migration_id: MigrationId) -> bool {
        self.polls.start(migration_id)
    }

    pub fn stop_polling(&mut self, migration_id: MigrationId) -> bool {
        self.polls.stop(migration_id)
    }

    pub fn is_polling(&self, migration_id: MigrationId) -> bool {
        self.polls.is_running(migration_id)
    }

    /// Returns false if a subscription for `migration_id` is already open.
    pub fn subscribe(&mut self, migration_id: MigrationId) -> bool {
        if self.subscriptions.contains_key(&migration_id) {
            return false;
        }
        let handle = self.push.subscribe(migration_id);
        self.subscriptions.insert(migration_id, handle);
        true
    }

    /// Releases the subscription; no further push event for it is delivered.
    pub fn unsubscribe(&mut self, migration_id: MigrationId) -> bool {
        self.subscriptions.remove(&migration_id).is_some()
    }

    pub fn is_subscribed(&self, migration_id: MigrationId) -> bool {
        self.subscriptions.contains_key(&migration_id)
    }

    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        loop {
            let event = self.event_rx.recv().await?;
            if self.is_current(&event) {
                return Some(event);
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        while let Ok(event) = self.event_rx.try_recv() {
            if self.is_current(&event) {
                return Some(event);
            }
        }
        None
    }

    /// Stops every schedule and waits for every push socket to close.
    pub async fn shutdown(mut self) {
        self.polls.stop_all();
        for (_, handle) in self.subscriptions.drain() {
            handle.close().await;
        }
    }

    // Events queued before a schedule or subscription was released are
    // dropped here, so nothing from a torn-down resource reaches the caller.
    fn is_current(&self, event: &EngineEvent) -> bool {
        let current = match event {
            EngineEvent::Progress {
                source: ProgressSource::Poll,
                progress,
            } => self.polls.is_running(progress.migration_id),
            EngineEvent::PollFailed { migration_id, .. } => self.polls.is_running(*migration_id),
            EngineEvent::Progress {
                source: ProgressSource::Push,
                progress,
            } => self.is_subscribed(progress.migration_id),
            EngineEvent::PushConnection { migration_id, .. }
            | EngineEvent::PushMalformed { migration_id, .. } => self.is_subscribed(*migration_id),
            EngineEvent::Listed(_)
            | EngineEvent::Fetched { .. }
            | EngineEvent::CommandCompleted { .. }
            | EngineEvent::Created(_)
            | EngineEvent::CredentialsListed(_) => true,
        };
        if !current {
            tracker_debug!("dropping event from released resource: {:?}", event);
        }
        current
    }
}
