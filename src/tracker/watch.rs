use std::time::Duration;

use anyhow::Result;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{storage::day_store::DayStore, utils::clock::Clock};

use super::Tracker;

/// Cadence of the day-boundary check. The boundary timestamp never depends on when a tick
/// actually fires, so a delayed tick only delays detection, not the attributed durations.
pub const ROLLOVER_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Cadence of the periodic sync pull while watching.
pub const PULL_INTERVAL: Duration = Duration::from_secs(300);

/// Foreground loop driving rollover checks and periodic pulls until cancelled. The tracker
/// already pulled on open, so the first pull here happens one interval in.
pub struct WatchLoop<S: DayStore> {
    tracker: Tracker<S>,
    shutdown: CancellationToken,
    clock: Box<dyn Clock>,
}

impl<S: DayStore> WatchLoop<S> {
    pub fn new(tracker: Tracker<S>, shutdown: CancellationToken, clock: Box<dyn Clock>) -> Self {
        Self {
            tracker,
            shutdown,
            clock,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        info!("Watching for day rollover and remote changes");
        let mut tick_point = self.clock.instant();
        let mut next_pull = tick_point + PULL_INTERVAL;

        loop {
            tick_point += ROLLOVER_CHECK_INTERVAL;

            select! {
                // Cancellation means we stop the loop; the last state is already persisted
                // since every mutation saves eagerly.
                _ = self.shutdown.cancelled() => {
                    return Ok(());
                }
                _ = self.clock.sleep_until(tick_point) => ()
            }

            match self.tracker.check_rollover().await {
                Ok(true) => info!("Archived previous day, now on {}", self.tracker.state().date_key),
                Ok(false) => debug!("No rollover"),
                Err(e) => error!("Rollover check failed {e:?}"),
            }

            if self.clock.instant() >= next_pull {
                next_pull += PULL_INTERVAL;
                if let Err(e) = self.tracker.pull().await {
                    error!("Periodic pull failed {e:?}");
                }
            }
        }
    }
}

/// Detects signals sent to the process and cancels the watch loop.
pub async fn detect_shutdown(cancellation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            cancellation.cancel();
        },
    };
}
