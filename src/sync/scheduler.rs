//! Poll loop.
//!
//! Each tick hands the refresh off to its own task, so a slow fetch never
//! delays the timer.  Overlapping ticks resolve through the build flag like
//! any other trigger.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::coordinator::{Coordinator, Trigger};

/// Run until `shutdown` fires.  The first tick is immediate and counts as
/// the startup refresh.
pub async fn run_poll_loop(
    coordinator: Arc<Coordinator>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut trigger = Trigger::Startup;

    info!(interval_secs = interval.as_secs(), "poll scheduler started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        spawn_refresh(&coordinator, trigger);
        trigger = Trigger::Poll;

        let next = chrono::Duration::from_std(interval)
            .ok()
            .map(|step| Utc::now() + step);
        coordinator.session().update_status(|s| s.next_check = next);
    }

    info!("poll scheduler stopped");
}

/// Start a refresh in the background and log its outcome.
pub fn spawn_refresh(coordinator: &Arc<Coordinator>, trigger: Trigger) {
    let coordinator = Arc::clone(coordinator);
    tokio::spawn(async move {
        let outcome = coordinator.refresh(trigger, false).await;
        debug!(%trigger, ?outcome, "background refresh finished");
    });
}
