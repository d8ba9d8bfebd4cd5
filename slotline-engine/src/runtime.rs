use std::time::Duration;

use chrono::{DateTime, Utc};
use slotline_core::SlotlineConfig;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::error::{EngineError, Result};
use crate::tracker::{SharedTracker, TickEvent};

const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Polls the tracker on a fixed interval until `shutdown` flips to `true`.
pub async fn run(
    tracker: SharedTracker,
    period: Duration,
    events: mpsc::Sender<TickEvent>,
    shutdown: watch::Receiver<bool>,
) {
    run_with_clock(tracker, period, events, shutdown, Utc::now).await
}

/// Same as [`run`] with an injectable wall clock.
pub async fn run_with_clock<C>(
    tracker: SharedTracker,
    period: Duration,
    events: mpsc::Sender<TickEvent>,
    mut shutdown: watch::Receiver<bool>,
    clock: C,
) where
    C: Fn() -> DateTime<Utc> + Send,
{
    let mut interval = tokio::time::interval(period.max(MIN_PERIOD));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(period_secs = period.as_secs(), "tick loop started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = clock();
                let outcome = tracker.lock().tick(now);
                match outcome {
                    Ok(batch) => {
                        for event in batch {
                            debug!(?event, "tick event");
                            if events.send(event).await.is_err() {
                                info!("event receiver dropped, stopping tick loop");
                                return;
                            }
                        }
                    }
                    Err(err) => error!(%err, "tick failed"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("tick loop stopped");
}

/// Owns a spawned tick loop.
pub struct TickRuntime {
    shutdown: watch::Sender<bool>,
    worker: Option<JoinHandle<()>>,
}

impl TickRuntime {
    pub fn start(
        tracker: SharedTracker,
        config: &SlotlineConfig,
        events: mpsc::Sender<TickEvent>,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let period = config.tick_interval;
        let worker = tokio::spawn(run(tracker, period, events, shutdown_rx));
        Self {
            shutdown,
            worker: Some(worker),
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    pub async fn shutdown(mut self) -> Result<()> {
        self.shutdown.send_replace(true);
        match self.worker.take() {
            Some(worker) => worker.await.map_err(|err| {
                error!("tick loop crashed: {:?}", err);
                EngineError::ShuttingDown
            }),
            None => Ok(()),
        }
    }
}
