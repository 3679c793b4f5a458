use std::sync::Arc;

use async_trait::async_trait;
use chrono_tz::Tz;
use tracing::{error, info, warn};

use crate::{
    delivery::{DeliveryChannel, DeliveryReport, broadcast},
    format::ReportFormatter,
    roster::RosterStore,
    scheduler::{DailyScheduler, ScheduledJob},
    stats::StatsAggregator,
    types::{DailySummary, FormattingMode, ScheduleConfig, TrackedUser, parse_time_of_day},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DailyReport {
    Ready(String),
    NoUsers,
    NoData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserReport {
    Ready(String),
    UnknownUser,
    Unavailable,
}

/// The stats pipeline: roster lookup, aggregation, rendering and, for the
/// scheduled run, fan-out to every registered destination.
pub struct DigestService {
    roster: Arc<dyn RosterStore>,
    aggregator: StatsAggregator,
    formatter: ReportFormatter,
    channel: Arc<dyn DeliveryChannel>,
}

impl DigestService {
    pub fn new(
        roster: Arc<dyn RosterStore>,
        aggregator: StatsAggregator,
        formatter: ReportFormatter,
        channel: Arc<dyn DeliveryChannel>,
    ) -> Self {
        Self {
            roster,
            aggregator,
            formatter,
            channel,
        }
    }

    pub fn roster(&self) -> &Arc<dyn RosterStore> {
        &self.roster
    }

    pub fn aggregator(&self) -> &StatsAggregator {
        &self.aggregator
    }

    pub fn formatter(&self) -> &ReportFormatter {
        &self.formatter
    }

    /// Summaries for every tracked user with available data, in roster order.
    pub async fn daily_summaries(&self) -> anyhow::Result<Vec<DailySummary>> {
        let users = self.roster.list_users().await?;
        Ok(self.aggregator.daily_summaries(&users).await)
    }

    /// Markdown digest for every tracked user with available data.
    pub async fn daily_report_all(&self) -> anyhow::Result<DailyReport> {
        let users = self.roster.list_users().await?;
        Ok(self.daily_report_for_users(&users).await)
    }

    /// Markdown digest for a single tracked user.
    pub async fn daily_report_for(&self, handle: &str) -> anyhow::Result<UserReport> {
        let Some(user) = self.roster.find_user(handle).await? else {
            return Ok(UserReport::UnknownUser);
        };

        let report = match self.aggregator.daily_summary(&user).await {
            Some(summary) => UserReport::Ready(self.formatter.format_summaries(&[summary])),
            None => UserReport::Unavailable,
        };
        Ok(report)
    }

    /// Plain-text lifetime profile report for a tracked user.
    pub async fn full_profile_report(&self, handle: &str) -> anyhow::Result<UserReport> {
        let Some(user) = self.roster.find_user(handle).await? else {
            return Ok(UserReport::UnknownUser);
        };

        let report = match self.aggregator.fetch_profile(&user.handle).await {
            Some(profile) => UserReport::Ready(self.formatter.format_full_profile(&profile, &user)),
            None => UserReport::Unavailable,
        };
        Ok(report)
    }

    async fn daily_report_for_users(&self, users: &[TrackedUser]) -> DailyReport {
        if users.is_empty() {
            return DailyReport::NoUsers;
        }

        let summaries = self.aggregator.daily_summaries(users).await;
        if summaries.is_empty() {
            return DailyReport::NoData;
        }

        DailyReport::Ready(self.formatter.format_summaries(&summaries))
    }

    /// One scheduled run. Returns `None` when there was nothing to send.
    pub async fn run_scheduled(&self) -> anyhow::Result<Option<DeliveryReport>> {
        let text = match self.daily_report_all().await? {
            DailyReport::Ready(text) => text,
            DailyReport::NoUsers => {
                info!("scheduled digest skipped: no tracked users");
                return Ok(None);
            }
            DailyReport::NoData => {
                warn!("scheduled digest skipped: no stats available for any user");
                return Ok(None);
            }
        };

        let destinations = self.roster.list_destinations().await?;
        info!(
            destinations = destinations.len(),
            "sending scheduled digest"
        );

        let report = broadcast(
            self.channel.as_ref(),
            &text,
            FormattingMode::Markdown,
            &destinations,
        )
        .await;
        Ok(Some(report))
    }
}

#[async_trait]
impl ScheduledJob for DigestService {
    async fn run(&self) {
        match self.run_scheduled().await {
            Ok(Some(report)) if report.is_partial() => {
                warn!(
                    delivered = report.delivered.len(),
                    failed = report.failed.len(),
                    "scheduled digest partially delivered"
                );
            }
            Ok(_) => {}
            Err(error) => {
                error!(?error, "scheduled digest failed");
            }
        }
    }
}

/// Keeps the scheduler armed with the time stored in the roster.
pub struct ScheduleController {
    scheduler: DailyScheduler,
    digest: Arc<DigestService>,
    timezone: Tz,
    default_time: String,
}

impl ScheduleController {
    pub fn new(digest: Arc<DigestService>, timezone: Tz, default_time: impl Into<String>) -> Self {
        Self {
            scheduler: DailyScheduler::new(),
            digest,
            timezone,
            default_time: default_time.into(),
        }
    }

    /// Stored time, falling back to the configured default when none is
    /// stored or the stored value is unreadable.
    pub async fn current_config(&self) -> anyhow::Result<ScheduleConfig> {
        let stored = self.digest.roster().schedule_time().await?;
        let time = match stored.as_deref().map(parse_time_of_day) {
            Some(Ok(time)) => time,
            Some(Err(error)) => {
                warn!(%error, "stored schedule time is invalid; using default");
                parse_time_of_day(&self.default_time)?
            }
            None => parse_time_of_day(&self.default_time)?,
        };

        Ok(ScheduleConfig {
            time_of_day: time,
            timezone: self.timezone,
        })
    }

    /// Arms (or re-arms) the daily job from the stored configuration.
    pub async fn apply(&self) -> anyhow::Result<ScheduleConfig> {
        let config = self.current_config().await?;
        let job: Arc<dyn ScheduledJob> = self.digest.clone();
        self.scheduler.arm(config.clone(), job).await;
        Ok(config)
    }

    /// Persists a new time and re-arms. `None` when the time is invalid.
    pub async fn set_time(&self, time: &str) -> anyhow::Result<Option<ScheduleConfig>> {
        if !self.digest.roster().set_schedule_time(time).await? {
            return Ok(None);
        }
        self.apply().await.map(Some)
    }

    pub async fn active_config(&self) -> Option<ScheduleConfig> {
        self.scheduler.active_config().await
    }

    pub async fn shutdown(&self) {
        self.scheduler.disarm().await;
    }
}
