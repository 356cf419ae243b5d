use chrono::{DateTime, Days, NaiveTime, Utc};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::sweep::{SweepContext, run_sweep};

#[derive(Debug, Error)]
#[error("Invalid sweep time '{0}', expected HH:MM (UTC)")]
pub struct InvalidDailyTime(pub String);

/// Parse a `HH:MM` wall-clock time.
pub fn parse_daily_at(value: &str) -> Result<NaiveTime, InvalidDailyTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| InvalidDailyTime(value.into()))
}

/// First instant strictly after `now` whose UTC time of day is `at`.
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        return today;
    }
    match now.date_naive().checked_add_days(Days::new(1)) {
        Some(tomorrow) => tomorrow.and_time(at).and_utc(),
        None => today,
    }
}

/// Daily sweep timer.
pub struct SweepScheduler;

impl SweepScheduler {
    /// Spawn the timer task. The first sweep runs at the next occurrence of `at`.
    pub fn start(ctx: SweepContext, at: NaiveTime) -> SchedulerHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(run_daily(ctx, at, token.clone()));
        info!(daily_at = %at.format("%H:%M"), "Sweep scheduler started");
        SchedulerHandle { token, task }
    }
}

/// Owner of a running scheduler task.
pub struct SchedulerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Cancel the timer and wait for the task to stop. An in-flight sweep
    /// finishes its current plots first.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "Sweep scheduler task ended abnormally");
        }
        info!("Sweep scheduler stopped");
    }
}

async fn run_daily(ctx: SweepContext, at: NaiveTime, token: CancellationToken) {
    loop {
        let now = Utc::now();
        let next = next_run_after(now, at);
        let wait = (next - now).to_std().unwrap_or_default();
        info!(next_run = %next, "Next detection sweep scheduled");

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        run_sweep(&ctx, &token).await;
    }
}
