use std::{sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::reconciler::{Reconciler, RefreshOutcome};

pub const POLL_PERIOD: Duration = Duration::from_millis(5000);

/// Recurring driver for [`Reconciler::refresh_if_idle`].
///
/// The first refresh runs immediately on start. A tick that lands while a
/// refresh is still outstanding is skipped instead of stacking another fetch.
/// Stopping only cancels the schedule: a refresh already on the wire is left
/// to finish.
pub struct Poller {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Poller {
    pub fn start(reconciler: Arc<Reconciler>, period: Duration) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                        continue;
                    }
                    _ = ticker.tick() => {}
                }
                if reconciler.refresh_if_idle().await == RefreshOutcome::Skipped {
                    debug!("poll tick skipped");
                }
            }
            debug!("store poller exited");
        });

        info!(period_ms = period.as_millis() as u64, "store poller started");
        Self { stop_tx, task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Cancels the schedule. Safe to call more than once.
    pub fn stop(&self) {
        let was_stopped = self.stop_tx.send_replace(true);
        if !was_stopped {
            info!("store poller stopped");
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "tests/poller_tests.rs"]
mod tests;
