//! Snapshots of the Lichess user and activity documents.
//!
//! The API payloads are loosely structured: any discipline can be missing and
//! older accounts lack some counters. Parsing works on `serde_json::Value` and
//! coalesces every missing or mistyped field to zero instead of rejecting the
//! whole document.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::types::RatingPoints;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Perf {
    pub rating: u32,
    pub games: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GameCounts {
    pub all: u64,
    pub rated: u64,
    pub win: u64,
    pub draw: u64,
    pub loss: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub username: String,
    pub perfs: BTreeMap<String, Perf>,
    pub count: GameCounts,
    pub created_at: i64,
    pub seen_at: i64,
}

impl Profile {
    /// Returns `None` only when the document is not an object at all.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        let perfs = object
            .get("perfs")
            .and_then(Value::as_object)
            .map(|perfs| {
                perfs
                    .iter()
                    .filter(|(_, perf)| perf.is_object())
                    .map(|(name, perf)| {
                        (
                            name.clone(),
                            Perf {
                                rating: uint32(perf.get("rating")),
                                games: uint32(perf.get("games")),
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        let count = object.get("count");
        let counter = |key: &str| uint(count.and_then(|count| count.get(key)));

        Some(Self {
            username: string(object.get("username")),
            perfs,
            count: GameCounts {
                all: counter("all"),
                rated: counter("rated"),
                win: counter("win"),
                draw: counter("draw"),
                loss: counter("loss"),
            },
            created_at: int(object.get("createdAt")),
            seen_at: int(object.get("seenAt")),
        })
    }

    pub fn perf(&self, discipline: &str) -> Option<Perf> {
        self.perfs.get(discipline).copied()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Points {
    pub before: u32,
    pub after: u32,
}

impl Points {
    fn from_value(value: Option<&Value>) -> Option<Self> {
        let value = value.filter(|value| value.is_object())?;
        Some(Self {
            before: uint32(value.get("before")),
            after: uint32(value.get("after")),
        })
    }
}

impl From<Points> for RatingPoints {
    fn from(points: Points) -> Self {
        Self {
            before: points.before,
            after: points.after,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GameTally {
    pub win: u32,
    pub loss: u32,
    pub draw: u32,
    pub rating_points: Option<Points>,
}

impl GameTally {
    /// Saturates instead of wrapping on absurd counters.
    pub fn played(&self) -> u32 {
        self.win.saturating_add(self.loss).saturating_add(self.draw)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PuzzleTally {
    pub win: u32,
    pub loss: u32,
    pub draw: u32,
    pub rating_points: Points,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivityRecord {
    pub start: i64,
    pub end: i64,
    pub games: BTreeMap<String, GameTally>,
    pub puzzles: Option<PuzzleTally>,
}

impl ActivityRecord {
    /// A record without a readable interval cannot be placed in time and is
    /// dropped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let interval = value.get("interval")?;
        let start = interval.get("start").and_then(Value::as_i64)?;
        let end = interval.get("end").and_then(Value::as_i64)?;
        if start >= end {
            return None;
        }

        let games = value
            .get("games")
            .and_then(Value::as_object)
            .map(|games| {
                games
                    .iter()
                    .filter(|(_, tally)| tally.is_object())
                    .map(|(name, tally)| {
                        (
                            name.clone(),
                            GameTally {
                                win: uint32(tally.get("win")),
                                loss: uint32(tally.get("loss")),
                                draw: uint32(tally.get("draw")),
                                rating_points: Points::from_value(tally.get("rp")),
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        let puzzles = value
            .get("puzzles")
            .and_then(|puzzles| puzzles.get("score"))
            .filter(|score| score.is_object())
            .map(|score| PuzzleTally {
                win: uint32(score.get("win")),
                loss: uint32(score.get("loss")),
                draw: uint32(score.get("draw")),
                rating_points: Points::from_value(score.get("rp")).unwrap_or_default(),
            });

        Some(Self {
            start,
            end,
            games,
            puzzles,
        })
    }

    pub fn contains(&self, timestamp_ms: i64) -> bool {
        self.start <= timestamp_ms && timestamp_ms <= self.end
    }

    pub fn tally(&self, discipline: &str) -> Option<&GameTally> {
        self.games.get(discipline)
    }
}

/// Parses the activity array, skipping entries that cannot be placed in time.
/// Returns `None` when the document is not an array.
pub fn parse_activity(value: &Value) -> Option<Vec<ActivityRecord>> {
    let entries = value.as_array()?;
    Some(
        entries
            .iter()
            .filter_map(ActivityRecord::from_value)
            .collect(),
    )
}

fn uint(value: Option<&Value>) -> u64 {
    value
        .and_then(|value| {
            value
                .as_u64()
                .or_else(|| value.as_f64().filter(|n| *n >= 0.0).map(|n| n.round() as u64))
        })
        .unwrap_or(0)
}

fn uint32(value: Option<&Value>) -> u32 {
    u32::try_from(uint(value)).unwrap_or(u32::MAX)
}

fn int(value: Option<&Value>) -> i64 {
    value.and_then(Value::as_i64).unwrap_or(0)
}

fn string(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_default()
}
