use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use futures_util::future::join_all;
use tracing::{debug, info};

use crate::{
    lichess::{ActivityRecord, Profile, StatsSource},
    time_utils::start_of_day_ms,
    types::{
        DailySummary, GamesPlayed, PuzzlesSolved, RatingDeltas, RatingPoints, SummaryPeriod,
        TrackedUser,
    },
};

/// Disciplines whose ratings make up the average; puzzles are excluded.
const RATED_DISCIPLINES: [&str; 3] = ["bullet", "blitz", "rapid"];

pub struct StatsAggregator {
    source: Arc<dyn StatsSource>,
    timezone: Tz,
}

impl StatsAggregator {
    pub fn new(source: Arc<dyn StatsSource>, timezone: Tz) -> Self {
        Self { source, timezone }
    }

    pub async fn fetch_profile(&self, handle: &str) -> Option<Profile> {
        self.source.fetch_profile(handle).await
    }

    /// Summary of the activity bucket covering today, or of the most recent
    /// bucket when none does. `None` when either document is unavailable or
    /// the user has no activity history at all.
    pub async fn daily_summary(&self, user: &TrackedUser) -> Option<DailySummary> {
        let (profile, activity) = tokio::join!(
            self.source.fetch_profile(&user.handle),
            self.source.fetch_activity(&user.handle)
        );

        let (Some(profile), Some(activity)) = (profile, activity) else {
            debug!(handle = %user.handle, "daily summary skipped: source data unavailable");
            return None;
        };

        let today = start_of_day_ms(self.timezone, Utc::now());
        let summary = summarize(user, &profile, &activity, today);
        if summary.is_none() {
            debug!(handle = %user.handle, "daily summary skipped: empty activity history");
        }
        summary
    }

    /// Summaries for every user whose data could be fetched, in roster order.
    pub async fn daily_summaries(&self, users: &[TrackedUser]) -> Vec<DailySummary> {
        let summaries = join_all(users.iter().map(|user| self.daily_summary(user)))
            .await
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();

        info!(
            requested = users.len(),
            summarized = summaries.len(),
            "daily summaries computed"
        );
        summaries
    }
}

/// Picks the first bucket whose closed interval contains `today_ms`, falling
/// back to the first (newest) bucket. The flag is true for an exact match.
pub fn select_bucket(activity: &[ActivityRecord], today_ms: i64) -> Option<(&ActivityRecord, bool)> {
    activity
        .iter()
        .find(|record| record.contains(today_ms))
        .map(|record| (record, true))
        .or_else(|| activity.first().map(|record| (record, false)))
}

pub fn summarize(
    user: &TrackedUser,
    profile: &Profile,
    activity: &[ActivityRecord],
    today_ms: i64,
) -> Option<DailySummary> {
    let (bucket, current) = select_bucket(activity, today_ms)?;

    let played = |discipline: &str| bucket.tally(discipline).map_or(0, |tally| tally.played());
    let delta = |discipline: &str| {
        bucket
            .tally(discipline)
            .and_then(|tally| tally.rating_points)
            .map_or(0, |points| RatingPoints::from(points).delta())
    };

    let bullet = played("bullet");
    let blitz = played("blitz");
    let rapid = played("rapid");

    let puzzles_solved = bucket
        .puzzles
        .map(|puzzles| PuzzlesSolved {
            win: puzzles.win,
            loss: puzzles.loss,
            draw: puzzles.draw,
            rating_points: puzzles.rating_points.into(),
        })
        .unwrap_or_default();

    Some(DailySummary {
        handle: user.handle.clone(),
        display_name: user.display_name.clone(),
        games_played: GamesPlayed {
            total: bullet.saturating_add(blitz).saturating_add(rapid),
            bullet,
            blitz,
            rapid,
            classical: played("classical"),
        },
        puzzles_solved,
        rating_deltas: RatingDeltas {
            bullet: delta("bullet"),
            blitz: delta("blitz"),
            rapid: delta("rapid"),
        },
        average_rating: average_rating(profile),
        total_rated_games: profile.count.rated,
        period: SummaryPeriod {
            start: bucket.start,
            end: bucket.end,
            current,
        },
    })
}

/// Rounded mean of the bullet, blitz and rapid ratings that are present.
pub fn average_rating(profile: &Profile) -> u32 {
    let ratings = RATED_DISCIPLINES
        .iter()
        .filter_map(|discipline| profile.perf(discipline))
        .map(|perf| perf.rating)
        .filter(|rating| *rating > 0)
        .collect::<Vec<_>>();

    if ratings.is_empty() {
        return 0;
    }

    let sum = ratings.iter().map(|rating| f64::from(*rating)).sum::<f64>();
    (sum / ratings.len() as f64).round() as u32
}
