use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use slotline_engine::SharedTracker;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::coordinator::{PullOutcome, SyncCoordinator};

/// Why a sync round is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncTrigger {
    /// A connection to the mirror was established.
    Connected,
    /// The operator came back to the app.
    Foreground,
    /// The mirror announced a row change.
    RemoteChange,
    /// Local state changed; pushes after the debounce delay.
    LocalModification,
}

/// Runs pulls and debounced pushes for one device.
pub struct SyncDriver {
    coordinator: Arc<SyncCoordinator>,
    tracker: SharedTracker,
    debounce: Duration,
}

impl SyncDriver {
    pub fn new(coordinator: Arc<SyncCoordinator>, tracker: SharedTracker, debounce: Duration) -> Self {
        Self {
            coordinator,
            tracker,
            debounce,
        }
    }

    pub async fn run(
        self,
        triggers: mpsc::Receiver<SyncTrigger>,
        modifications: watch::Receiver<Option<DateTime<Utc>>>,
        shutdown: watch::Receiver<bool>,
    ) {
        self.run_with_clock(triggers, modifications, shutdown, Utc::now)
            .await
    }

    pub async fn run_with_clock<C>(
        self,
        mut triggers: mpsc::Receiver<SyncTrigger>,
        mut modifications: watch::Receiver<Option<DateTime<Utc>>>,
        mut shutdown: watch::Receiver<bool>,
        clock: C,
    ) where
        C: Fn() -> DateTime<Utc> + Send,
    {
        let mut push_at: Option<Instant> = None;
        let mut modifications_open = true;
        info!(debounce_ms = self.debounce.as_millis() as u64, "sync driver started");

        loop {
            tokio::select! {
                trigger = triggers.recv() => match trigger {
                    Some(SyncTrigger::LocalModification) => {
                        push_at = Some(Instant::now() + self.debounce);
                    }
                    Some(trigger) => self.pull(trigger, clock()).await,
                    None => break,
                },
                changed = modifications.changed(), if modifications_open => {
                    if changed.is_err() {
                        modifications_open = false;
                    } else if modifications.borrow_and_update().is_some() {
                        push_at = Some(Instant::now() + self.debounce);
                    }
                }
                _ = sleep_until(push_at.unwrap_or_else(Instant::now)), if push_at.is_some() => {
                    push_at = None;
                    match self.coordinator.push(clock()).await {
                        // the push raised the store stamp itself
                        Ok(_) => self.tracker.lock().acknowledge_store(),
                        Err(err) => warn!(%err, "debounced push failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("sync driver stopped");
    }

    async fn pull(&self, trigger: SyncTrigger, now: DateTime<Utc>) {
        debug!(?trigger, "pull requested");
        match self.coordinator.pull(now).await {
            Ok(PullOutcome::Applied { remote }) => {
                let reloaded = self.tracker.lock().reload(now);
                match reloaded {
                    Ok(()) => info!(?trigger, %remote, "adopted remote snapshot"),
                    Err(err) => warn!(%err, "reload after pull failed"),
                }
            }
            Ok(outcome) => debug!(?trigger, ?outcome, "pull left local state untouched"),
            Err(err) => warn!(?trigger, %err, "pull failed"),
        }
    }
}
