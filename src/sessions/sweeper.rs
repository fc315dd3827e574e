//! Cleanup sweeper
//!
//! Periodically expires terminal sessions past their time-to-live and
//! deletes their artifacts. Runs as an independent task and only ever
//! touches terminal sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::sessions::manager::SessionManager;

pub struct CleanupSweeper {
    manager: Arc<SessionManager>,
    interval: Duration,
}

impl CleanupSweeper {
    /// Sweeper using the interval from the manager's configuration
    pub fn new(manager: Arc<SessionManager>) -> Self {
        let interval = Duration::from_secs(manager.config().sweep_interval_secs);
        Self::with_interval(manager, interval)
    }

    pub fn with_interval(manager: Arc<SessionManager>, interval: Duration) -> Self {
        Self { manager, interval }
    }

    /// Spawn the periodic sweep task. The task runs until the process
    /// exits.
    pub fn run(self: Arc<Self>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "starting cleanup sweeper"
        );
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(self.interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // the first tick fires immediately; skip it so a freshly
            // started sweeper waits a full interval
            timer.tick().await;
            loop {
                timer.tick().await;
                let expired = self.sweep_once().await;
                if expired > 0 {
                    debug!(expired, "sweep pass expired sessions");
                }
            }
        });
    }

    /// One sweep pass; returns how many sessions were expired
    pub async fn sweep_once(&self) -> usize {
        self.manager.expire_due_sessions().await
    }
}
