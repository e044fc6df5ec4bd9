use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use tracker_logging::{tracker_debug, tracker_info, tracker_warn};

use crate::settings::DEFAULT_POLL_INTERVAL;
use crate::{EngineEvent, MigrationApi, MigrationId, ProgressSource};

struct Schedule {
    live: Arc<AtomicBool>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Schedule {
    fn halt(self) {
        self.live.store(false, Ordering::SeqCst);
        self.cancel.cancel();
        self.task.abort();
    }
}

/// Periodic progress reads, at most one schedule per migration.
///
/// The first read happens immediately. A failed read is reported and the
/// schedule keeps going. `stop` takes effect before it returns: the task is
/// told to quit and any read still in flight is discarded.
pub struct PollScheduler {
    api: Arc<dyn MigrationApi>,
    interval: Duration,
    events: UnboundedSender<EngineEvent>,
    schedules: HashMap<MigrationId, Schedule>,
}

impl PollScheduler {
    pub fn new(
        api: Arc<dyn MigrationApi>,
        interval: Duration,
        events: UnboundedSender<EngineEvent>,
    ) -> Self {
        let interval = if interval.is_zero() {
            tracker_warn!(
                "poll interval must be non-zero; using {:?}",
                DEFAULT_POLL_INTERVAL
            );
            DEFAULT_POLL_INTERVAL
        } else {
            interval
        };
        Self {
            api,
            interval,
            events,
            schedules: HashMap::new(),
        }
    }

    /// Returns false if a schedule for `migration_id` already runs.
    pub fn start(&mut self, migration_id: MigrationId) -> bool {
        if self.schedules.contains_key(&migration_id) {
            tracker_debug!("poll for migration {} already scheduled", migration_id);
            return false;
        }

        let live = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_schedule(
            self.api.clone(),
            migration_id,
            self.interval,
            live.clone(),
            cancel.clone(),
            self.events.clone(),
        ));
        tracker_info!(
            "poll schedule started for migration {} every {:?}",
            migration_id,
            self.interval
        );
        self.schedules.insert(
            migration_id,
            Schedule { live, cancel, task },
        );
        true
    }

    pub fn stop(&mut self, migration_id: MigrationId) -> bool {
        match self.schedules.remove(&migration_id) {
            Some(schedule) => {
                schedule.halt();
                tracker_info!("poll schedule stopped for migration {}", migration_id);
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, migration_id: MigrationId) -> bool {
        self.schedules.contains_key(&migration_id)
    }

    pub fn stop_all(&mut self) {
        for (_, schedule) in self.schedules.drain() {
            schedule.halt();
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.stop_all();
    }
}

async fn run_schedule(
    api: Arc<dyn MigrationApi>,
    migration_id: MigrationId,
    interval: Duration,
    live: Arc<AtomicBool>,
    cancel: CancellationToken,
    events: UnboundedSender<EngineEvent>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = api.progress(migration_id) => result,
        };
        if !live.load(Ordering::SeqCst) {
            break;
        }

        let event = match result {
            Ok(progress) => EngineEvent::Progress {
                source: ProgressSource::Poll,
                progress,
            },
            Err(error) => {
                tracker_warn!("progress read for migration {} failed: {}", migration_id, error);
                EngineEvent::PollFailed {
                    migration_id,
                    error,
                }
            }
        };
        if events.send(event).is_err() {
            break;
        }
    }
    tracker_debug!("poll task for migration {} exited", migration_id);
}
