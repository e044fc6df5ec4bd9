//! Websocket push channel, one subscription per migration.
//!
//! Frames are JSON text `{"event": <name>, "data": <payload>}`. The client
//! sends `subscribe` / `unsubscribe` with `{"migration_id": <id>}`; the
//! service answers with `migration_progress`, `migration_complete` and
//! `migration_error`, each carrying a progress payload.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use tracker_logging::{tracker_debug, tracker_info, tracker_warn};

use crate::{ClientSettings, EngineEvent, MigrationId, ProgressDto, ProgressSource};

const PROGRESS_EVENTS: [&str; 3] = ["migration_progress", "migration_complete", "migration_error"];

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("websocket: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("malformed push frame: {0}")]
    Frame(#[from] serde_json::Error),
    #[error("{event} payload is for migration {actual}, not {expected}")]
    WrongMigration {
        event: String,
        expected: MigrationId,
        actual: MigrationId,
    },
}

#[derive(Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Builds a client frame such as `subscribe` for one migration.
pub fn encode_push_frame(event: &str, migration_id: MigrationId) -> String {
    serde_json::json!({
        "event": event,
        "data": { "migration_id": migration_id },
    })
    .to_string()
}

/// Decodes a server frame for the subscription on `migration_id`.
///
/// `Ok(None)` means the frame is not a progress event and can be ignored.
pub fn decode_push_frame(text: &str, migration_id: MigrationId) -> Result<Option<ProgressDto>, PushError> {
    let frame: Frame = serde_json::from_str(text)?;
    if !PROGRESS_EVENTS.contains(&frame.event.as_str()) {
        tracker_debug!("ignoring push event {:?}", frame.event);
        return Ok(None);
    }
    let progress: ProgressDto = serde_json::from_value(frame.data)?;
    if progress.migration_id != migration_id {
        return Err(PushError::WrongMigration {
            event: frame.event,
            expected: migration_id,
            actual: progress.migration_id,
        });
    }
    Ok(Some(progress))
}

/// Opens subscriptions against the configured websocket endpoint.
#[derive(Debug, Clone)]
pub struct PushChannel {
    settings: ClientSettings,
    events: UnboundedSender<EngineEvent>,
}

impl PushChannel {
    pub fn new(settings: ClientSettings, events: UnboundedSender<EngineEvent>) -> Self {
        Self { settings, events }
    }

    /// Connects in the background and keeps reconnecting until the handle
    /// is closed or dropped.
    pub fn subscribe(&self, migration_id: MigrationId) -> SubscriptionHandle {
        let live = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_subscription(
            self.settings.clone(),
            migration_id,
            Emitter {
                migration_id,
                live: live.clone(),
                events: self.events.clone(),
            },
            cancel.clone(),
        ));
        tracker_info!("push subscription opened for migration {}", migration_id);
        SubscriptionHandle {
            migration_id,
            live,
            cancel,
            task: Some(task),
        }
    }
}

/// Exclusive ownership of one push subscription.
///
/// Once the handle is dropped or closed, no further event for it reaches
/// the engine channel.
pub struct SubscriptionHandle {
    migration_id: MigrationId,
    live: Arc<AtomicBool>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub fn migration_id(&self) -> MigrationId {
        self.migration_id
    }

    pub fn is_active(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Releases the subscription and waits until the socket is closed.
    pub async fn close(mut self) {
        self.release();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn release(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            self.cancel.cancel();
            tracker_info!("push subscription closed for migration {}", self.migration_id);
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.release();
    }
}

struct Emitter {
    migration_id: MigrationId,
    live: Arc<AtomicBool>,
    events: UnboundedSender<EngineEvent>,
}

impl Emitter {
    fn emit(&self, event: EngineEvent) {
        if self.live.load(Ordering::SeqCst) {
            let _ = self.events.send(event);
        }
    }

    fn connection(&self, connected: bool) {
        self.emit(EngineEvent::PushConnection {
            migration_id: self.migration_id,
            connected,
        });
    }
}

async fn run_subscription(
    settings: ClientSettings,
    migration_id: MigrationId,
    emitter: Emitter,
    cancel: CancellationToken,
) {
    let mut backoff = settings.reconnect_backoff;
    loop {
        let connect = tokio::select! {
            _ = cancel.cancelled() => return,
            connect = connect_async(settings.ws_url.as_str()) => connect,
        };
        match connect {
            Ok((socket, _)) => {
                backoff = settings.reconnect_backoff;
                match serve(socket, migration_id, &emitter, &cancel).await {
                    Ok(()) => return,
                    Err(err) => {
                        tracker_warn!("push channel for migration {} lost: {}", migration_id, err);
                    }
                }
            }
            Err(err) => {
                tracker_warn!(
                    "push connect for migration {} failed: {}; retrying in {:?}",
                    migration_id,
                    err,
                    backoff
                );
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = settings.next_backoff(backoff);
    }
}

/// Runs one connection. `Ok` means the subscription was released and the
/// socket closed cleanly; `Err` means the connection dropped.
async fn serve(
    mut socket: Socket,
    migration_id: MigrationId,
    emitter: &Emitter,
    cancel: &CancellationToken,
) -> Result<(), PushError> {
    socket
        .send(Message::Text(encode_push_frame("subscribe", migration_id).into()))
        .await?;
    emitter.connection(true);

    let outcome = loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break Ok(()),
            message = socket.next() => message,
        };
        match message {
            Some(Ok(Message::Text(text))) => match decode_push_frame(text.as_str(), migration_id) {
                Ok(Some(progress)) => emitter.emit(EngineEvent::Progress {
                    source: ProgressSource::Push,
                    progress,
                }),
                Ok(None) => {}
                Err(err) => emitter.emit(EngineEvent::PushMalformed {
                    migration_id,
                    reason: err.to_string(),
                }),
            },
            Some(Ok(Message::Close(_))) | None => {
                break Err(PushError::Socket(
                    tokio_tungstenite::tungstenite::Error::ConnectionClosed,
                ))
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => break Err(PushError::Socket(err)),
        }
    };

    match outcome {
        Ok(()) => {
            let _ = socket
                .send(Message::Text(encode_push_frame("unsubscribe", migration_id).into()))
                .await;
            let _ = socket.close(None).await;
            tracker_debug!("push socket for migration {} closed", migration_id);
            Ok(())
        }
        Err(err) => {
            emitter.connection(false);
            Err(err)
        }
    }
}
