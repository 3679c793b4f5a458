use std::fmt;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedUser {
    pub handle: String,
    pub display_name: String,
}

impl TrackedUser {
    pub fn new(handle: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            display_name: display_name.into(),
        }
    }

    /// Handles are unique without regard to case.
    pub fn matches_handle(&self, handle: &str) -> bool {
        self.handle.eq_ignore_ascii_case(handle.trim())
    }
}

/// Opaque delivery target; for Discord this is a channel id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationId(pub String);

impl DestinationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DestinationId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for DestinationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FormattingMode {
    Plain,
    Markdown,
}

/// Parses a strict `HH:MM` (24h, zero padded) time of day.
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime, ScheduleError> {
    let raw = raw.trim();
    let bytes = raw.as_bytes();
    let well_formed = bytes.len() == 5
        && bytes[2] == b':'
        && bytes
            .iter()
            .enumerate()
            .all(|(index, byte)| index == 2 || byte.is_ascii_digit());
    if !well_formed {
        return Err(ScheduleError::InvalidTime(raw.to_owned()));
    }

    NaiveTime::parse_from_str(raw, "%H:%M").map_err(|_| ScheduleError::InvalidTime(raw.to_owned()))
}

pub fn parse_timezone(raw: &str) -> Result<Tz, ScheduleError> {
    raw.trim()
        .parse::<Tz>()
        .map_err(|_| ScheduleError::InvalidTimezone(raw.to_owned()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub time_of_day: NaiveTime,
    pub timezone: Tz,
}

impl ScheduleConfig {
    pub fn new(time_of_day: &str, timezone: &str) -> Result<Self, ScheduleError> {
        Ok(Self {
            time_of_day: parse_time_of_day(time_of_day)?,
            timezone: parse_timezone(timezone)?,
        })
    }

    pub fn time_label(&self) -> String {
        self.time_of_day.format("%H:%M").to_string()
    }
}

impl fmt::Display for ScheduleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.time_label(), self.timezone.name())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamesPlayed {
    pub total: u32,
    pub bullet: u32,
    pub blitz: u32,
    pub rapid: u32,
    pub classical: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingPoints {
    pub before: u32,
    pub after: u32,
}

impl RatingPoints {
    pub fn delta(&self) -> i64 {
        i64::from(self.after) - i64::from(self.before)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzlesSolved {
    pub win: u32,
    pub loss: u32,
    pub draw: u32,
    pub rating_points: RatingPoints,
}

impl PuzzlesSolved {
    pub fn attempted(&self) -> u32 {
        self.win.saturating_add(self.loss)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingDeltas {
    pub bullet: i64,
    pub blitz: i64,
    pub rapid: i64,
}

/// The activity interval a summary was computed from. `current` is false when
/// no interval covered today and the most recent one was used instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryPeriod {
    pub start: i64,
    pub end: i64,
    pub current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    pub handle: String,
    pub display_name: String,
    pub games_played: GamesPlayed,
    pub puzzles_solved: PuzzlesSolved,
    pub rating_deltas: RatingDeltas,
    pub average_rating: u32,
    pub total_rated_games: u64,
    pub period: SummaryPeriod,
}
