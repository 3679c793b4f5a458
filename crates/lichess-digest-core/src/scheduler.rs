use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Days, Utc};
use tokio::{
    sync::Mutex,
    task::{AbortHandle, JoinHandle},
};
use tracing::{debug, error, info};

use crate::{time_utils::resolve_local, types::ScheduleConfig};

/// Wall-clock source for fire-time computation.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[async_trait]
pub trait ScheduledJob: Send + Sync {
    async fn run(&self);
}

struct ActiveJob {
    config: ScheduleConfig,
    handle: JoinHandle<()>,
}

/// Owns the single recurring daily job.
///
/// Arming replaces the previous job: the old task is aborted and awaited
/// before the new one is spawned, all under one lock, so two jobs never run
/// side by side.
pub struct DailyScheduler {
    active: Mutex<Option<ActiveJob>>,
    clock: Clock,
}

impl Default for DailyScheduler {
    fn default() -> Self {
        Self::with_clock(Arc::new(Utc::now))
    }
}

impl DailyScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            active: Mutex::default(),
            clock,
        }
    }

    pub async fn arm(&self, config: ScheduleConfig, job: Arc<dyn ScheduledJob>) {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            cancel(previous).await;
        }

        let handle = tokio::spawn(run_daily(config.clone(), job, self.clock.clone()));
        info!(schedule = %config, "daily job armed");
        *active = Some(ActiveJob { config, handle });
    }

    /// Returns whether a job was active.
    pub async fn disarm(&self) -> bool {
        let previous = self.active.lock().await.take();
        match previous {
            Some(previous) => {
                cancel(previous).await;
                true
            }
            None => false,
        }
    }

    pub async fn active_config(&self) -> Option<ScheduleConfig> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|active| active.config.clone())
    }
}

impl Drop for DailyScheduler {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            active.handle.abort();
        }
    }
}

async fn cancel(job: ActiveJob) {
    job.handle.abort();
    // Either cancelled or finished by a panic inside the job; both leave no
    // task behind.
    let _ = job.handle.await;
    info!(schedule = %job.config, "daily job cancelled");
}

/// Aborts the in-flight fire when the loop itself is cancelled.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn run_daily(config: ScheduleConfig, job: Arc<dyn ScheduledJob>, clock: Clock) {
    let mut after = clock();
    loop {
        let next = next_fire_after(&config, after);
        let wait = (next - clock()).to_std().unwrap_or(Duration::ZERO);
        debug!(schedule = %config, %next, wait_secs = wait.as_secs(), "waiting for next fire");
        tokio::time::sleep(wait).await;

        info!(schedule = %config, "running scheduled job");
        // Each fire runs in its own task so a panic cannot end the loop.
        let job = job.clone();
        let fire = tokio::spawn(async move { job.run().await });
        let _guard = AbortOnDrop(fire.abort_handle());
        if let Err(error) = fire.await {
            error!(schedule = %config, ?error, "scheduled job panicked");
        }
        after = next;
    }
}

/// First instant strictly after `after` at which the local clock in the
/// configured zone shows the configured time.
pub fn next_fire_after(config: &ScheduleConfig, after: DateTime<Utc>) -> DateTime<Utc> {
    let tz = config.timezone;
    let local_date = after.with_timezone(&tz).date_naive();

    (0..=2)
        .filter_map(|offset| local_date.checked_add_days(Days::new(offset)))
        .map(|date| resolve_local(tz, date.and_time(config.time_of_day)).with_timezone(&Utc))
        .find(|candidate| *candidate > after)
        .unwrap_or_else(|| after + chrono::Duration::days(1))
}
