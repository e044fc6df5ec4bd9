use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracker_engine::{
    ApiError, ClientSettings, CommandAck, CredentialDto, EngineEvent, EngineHandle, FailureKind,
    ListQuery, MigrationApi, MigrationDto, MigrationOptions, MigrationPage, PollScheduler,
    ProgressDto, ProgressSource, RemoteCommand, DEFAULT_POLL_INTERVAL,
};

const INTERVAL: Duration = Duration::from_millis(2000);

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(tracker_logging::initialize_for_tests);
}

fn progress(migration_id: u64, migrated: u64) -> ProgressDto {
    ProgressDto {
        migration_id,
        status: "in_progress".to_string(),
        total_photos: 100,
        migrated_photos: migrated,
        failed_photos: 0,
        progress: None,
        current_photo: None,
        speed_mbps: None,
        estimated_time_remaining_minutes: None,
    }
}

/// Scripted progress source that records when it was read.
struct ScriptedApi {
    replies: Mutex<VecDeque<Result<u64, ApiError>>>,
    reads: Mutex<Vec<Instant>>,
}

impl ScriptedApi {
    fn new(replies: Vec<Result<u64, ApiError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            reads: Mutex::new(Vec::new()),
        })
    }

    fn reads(&self) -> Vec<Instant> {
        self.reads.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MigrationApi for ScriptedApi {
    async fn list(&self, _query: &ListQuery) -> Result<MigrationPage, ApiError> {
        Err(not_scripted())
    }

    async fn create(&self, _options: &MigrationOptions) -> Result<MigrationDto, ApiError> {
        Err(not_scripted())
    }

    async fn get(&self, _migration_id: u64) -> Result<MigrationDto, ApiError> {
        Err(not_scripted())
    }

    async fn progress(&self, migration_id: u64) -> Result<ProgressDto, ApiError> {
        self.reads.lock().unwrap().push(Instant::now());
        let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Ok(0));
        reply.map(|migrated| progress(migration_id, migrated))
    }

    async fn command(
        &self,
        _migration_id: u64,
        _command: RemoteCommand,
    ) -> Result<CommandAck, ApiError> {
        Ok(CommandAck::accepted())
    }

    async fn credentials(&self) -> Result<Vec<CredentialDto>, ApiError> {
        Err(not_scripted())
    }
}

fn not_scripted() -> ApiError {
    ApiError {
        kind: FailureKind::Network,
        message: "not scripted".to_string(),
    }
}

fn migrated(event: EngineEvent) -> Option<u64> {
    match event {
        EngineEvent::Progress {
            source: ProgressSource::Poll,
            progress,
        } => Some(progress.migrated_photos),
        _ => None,
    }
}

#[tokio::test(start_paused = true)]
async fn first_read_is_immediate_then_every_interval() {
    init_logging();
    let api = ScriptedApi::new(vec![Ok(1), Ok(2), Ok(3)]);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut scheduler = PollScheduler::new(api.clone(), INTERVAL, tx);
    let started = Instant::now();

    assert!(scheduler.start(7));
    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(migrated(rx.recv().await.unwrap()));
    }

    assert_eq!(seen, vec![Some(1), Some(2), Some(3)]);
    let offsets: Vec<Duration> = api.reads().iter().map(|at| *at - started).collect();
    assert_eq!(offsets, vec![Duration::ZERO, INTERVAL, INTERVAL * 2]);
}

#[tokio::test(start_paused = true)]
async fn second_start_for_same_id_is_refused() {
    init_logging();
    let api = ScriptedApi::new(Vec::new());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut scheduler = PollScheduler::new(api.clone(), INTERVAL, tx);

    assert!(scheduler.start(7));
    assert!(!scheduler.start(7));
    let _ = rx.recv().await;
    tokio::time::sleep(INTERVAL / 2).await;

    assert_eq!(api.reads().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_read_is_reported_and_polling_continues() {
    init_logging();
    let failure = ApiError {
        kind: FailureKind::Timeout,
        message: "slow".to_string(),
    };
    let api = ScriptedApi::new(vec![Err(failure.clone()), Ok(4)]);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut scheduler = PollScheduler::new(api, INTERVAL, tx);
    scheduler.start(7);

    assert_eq!(
        rx.recv().await,
        Some(EngineEvent::PollFailed {
            migration_id: 7,
            error: failure,
        })
    );
    assert_eq!(migrated(rx.recv().await.unwrap()), Some(4));
}

#[tokio::test(start_paused = true)]
async fn stop_prevents_further_reads_and_events() {
    init_logging();
    let api = ScriptedApi::new(Vec::new());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut scheduler = PollScheduler::new(api.clone(), INTERVAL, tx);
    scheduler.start(7);
    let _ = rx.recv().await;

    assert!(scheduler.stop(7));
    assert!(!scheduler.stop(7));
    tokio::time::sleep(INTERVAL * 5).await;

    assert_eq!(api.reads().len(), 1);
    assert!(rx.try_recv().is_err());
    assert!(!scheduler.is_running(7));
}

#[tokio::test(start_paused = true)]
async fn engine_drops_reads_queued_before_stop() {
    init_logging();
    let api = ScriptedApi::new(vec![Ok(5)]);
    let mut engine = EngineHandle::with_api(
        ClientSettings {
            poll_interval: INTERVAL,
            ..ClientSettings::default()
        },
        api.clone(),
    );

    assert!(engine.start_polling(3));
    // Let the immediate read land in the queue without consuming it.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(api.reads().len(), 1);

    assert!(engine.stop_polling(3));
    assert_eq!(engine.try_recv(), None);
}

#[tokio::test(start_paused = true)]
async fn zero_interval_falls_back_to_default() {
    init_logging();
    let api = ScriptedApi::new(vec![Ok(1), Ok(2)]);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut scheduler = PollScheduler::new(api.clone(), Duration::ZERO, tx);
    let started = Instant::now();

    assert!(scheduler.start(7));
    assert_eq!(migrated(rx.recv().await.unwrap()), Some(1));
    assert_eq!(migrated(rx.recv().await.unwrap()), Some(2));

    let offsets: Vec<Duration> = api.reads().iter().map(|at| *at - started).collect();
    assert_eq!(offsets, vec![Duration::ZERO, DEFAULT_POLL_INTERVAL]);
    assert!(scheduler.is_running(7));
}
