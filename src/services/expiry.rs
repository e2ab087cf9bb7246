//! Subscription expiry sweep.
//!
//! DESIGN
//! ======
//! A background task wakes on a fixed interval and moves every `trial` or
//! `active` subscription whose end date has passed to `expired`. Reads
//! always check the end date too, so the sweep only keeps stored status
//! honest for listings and reports.

use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::services::subscription::expire_due;
use crate::state::AppState;

/// Spawn the background expiry task. Returns a handle for shutdown.
pub fn spawn_expiry_task(state: AppState) -> JoinHandle<()> {
    let period = Duration::from_secs(state.config.subscription_sweep_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            sweep_once(&state).await;
        }
    })
}

pub(crate) async fn sweep_once(state: &AppState) -> usize {
    match expire_due(state, OffsetDateTime::now_utc()).await {
        Ok(0) => 0,
        Ok(count) => {
            info!(count, "subscriptions expired");
            count
        }
        Err(e) => {
            error!(error = %e, "subscription expiry sweep failed");
            0
        }
    }
}

#[cfg(test)]
#[path = "expiry_test.rs"]
mod tests;
