//! Text rendering for daily digests and full profile reports.
//!
//! Daily digests are sent with Markdown formatting: every piece of variable
//! text goes through [`escape_markdown`] before interpolation, while the
//! punctuation in the templates is written pre-escaped.

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;

use crate::{
    lichess::Profile,
    time_utils::local_datetime,
    types::{DailySummary, RatingDeltas, TrackedUser},
};

pub const MARKDOWN_RESERVED: [char; 17] = [
    '_', '*', '[', '`', '>', '(', ')', '~', '-', '#', '+', '=', '|', '{', '}', '.', '!',
];

const PROFILE_URL_BASE: &str = "https://lichess.org/@/";

/// Disciplines shown in the full report, in display order.
const PROFILE_DISCIPLINES: [(&str, &str, &str); 6] = [
    ("bullet", "Bullet", "games"),
    ("blitz", "Blitz", "games"),
    ("rapid", "Rapid", "games"),
    ("classical", "Classical", "games"),
    ("correspondence", "Correspondence", "games"),
    ("puzzle", "Puzzles", "puzzles"),
];

pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for character in text.chars() {
        if MARKDOWN_RESERVED.contains(&character) {
            escaped.push('\\');
        }
        escaped.push(character);
    }
    escaped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mood {
    Idle,
    Partial,
    Active,
}

impl Mood {
    pub fn of(summary: &DailySummary) -> Self {
        let games = summary.games_played.total;
        let puzzles = summary.puzzles_solved.attempted();
        match (games == 0, puzzles == 0) {
            (true, true) => Mood::Idle,
            (true, false) | (false, true) => Mood::Partial,
            (false, false) => Mood::Active,
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            Mood::Idle => "😡",
            Mood::Partial => "🤔",
            Mood::Active => "😃",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReportFormatter {
    timezone: Tz,
}

impl ReportFormatter {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    pub fn format_summaries(&self, summaries: &[DailySummary]) -> String {
        render_daily_report(summaries, self.today(), self.timezone)
    }

    pub fn format_full_profile(&self, profile: &Profile, user: &TrackedUser) -> String {
        render_full_profile(profile, user, self.timezone)
    }
}

pub fn render_daily_report(summaries: &[DailySummary], today: NaiveDate, tz: Tz) -> String {
    let date = today.format("%d.%m.%Y").to_string();
    let mut message = format!("Stats for {}\n\n", escape_markdown(&date));

    for summary in summaries {
        message.push_str(&render_summary_block(summary, tz));
    }

    message.trim().to_owned()
}

fn render_summary_block(summary: &DailySummary, tz: Tz) -> String {
    let games = &summary.games_played;
    let puzzles = &summary.puzzles_solved;

    let mut block = format!(
        "👤 {} \\({}\\) {}\n",
        escape_markdown(&summary.handle),
        escape_markdown(&summary.display_name),
        Mood::of(summary).glyph()
    );
    block.push_str("```\n");

    if games.total == 0 {
        block.push_str("🎮 → No games 🤷‍♂️\n");
    } else {
        block.push_str(&format!(
            "🎮 → 🔫 {} ⚡️{} 🐇{} 🐢 {}\n",
            games.bullet, games.blitz, games.rapid, games.classical
        ));
        if let Some(line) = rating_delta_line(&summary.rating_deltas) {
            block.push_str(&line);
        }
    }

    if puzzles.attempted() == 0 {
        block.push_str("\n🧩 → No puzzles 🤷‍♂️\n");
    } else {
        block.push_str(&format!("\n🧩 → ✅ {} 🚫 {}\n", puzzles.win, puzzles.loss));
    }

    block.push_str(&format!(
        "\n📈 ≈{} ELO   🧮 {} games\n",
        summary.average_rating, summary.total_rated_games
    ));

    if !summary.period.current {
        if let Some(start) = local_datetime(tz, summary.period.start) {
            block.push_str(&format!(
                "\n🕰 → last activity {}\n",
                start.format("%d.%m.%Y")
            ));
        }
    }

    block.push_str("```\n\n");
    block
}

fn rating_delta_line(deltas: &RatingDeltas) -> Option<String> {
    if deltas.bullet == 0 && deltas.blitz == 0 && deltas.rapid == 0 {
        return None;
    }
    Some(format!(
        "📊 → 🔫 {} ⚡️{} 🐇{}\n",
        format_rating_change(deltas.bullet),
        format_rating_change(deltas.blitz),
        format_rating_change(deltas.rapid)
    ))
}

pub fn format_rating_change(change: i64) -> String {
    if change > 0 {
        format!("+{change}")
    } else {
        change.to_string()
    }
}

/// `round(100 * count / all)`, or 0 when nothing was played.
pub fn percentage(count: u64, all: u64) -> u64 {
    if all == 0 {
        return 0;
    }
    (count as f64 * 100.0 / all as f64).round() as u64
}

/// Zero means the field was missing from the profile.
fn known_instant(tz: Tz, epoch_ms: i64) -> Option<chrono::DateTime<Tz>> {
    (epoch_ms > 0).then(|| local_datetime(tz, epoch_ms)).flatten()
}

pub fn render_full_profile(profile: &Profile, user: &TrackedUser, tz: Tz) -> String {
    let username = if profile.username.is_empty() {
        user.handle.as_str()
    } else {
        profile.username.as_str()
    };

    let mut lines = vec![
        format!("Full stats for {} ({}):", user.handle, user.display_name),
        String::new(),
        format!("Profile: {PROFILE_URL_BASE}{username}"),
    ];

    if let Some(created) = known_instant(tz, profile.created_at) {
        lines.push(format!("Created: {}", created.format("%d.%m.%Y")));
    }
    if let Some(seen) = known_instant(tz, profile.seen_at) {
        lines.push(format!("Last seen: {}", seen.format("%d.%m.%Y %H:%M")));
    }

    lines.push(String::new());
    lines.push("Ratings:".to_owned());
    let mut any_rating = false;
    for (key, label, unit) in PROFILE_DISCIPLINES {
        if let Some(perf) = profile.perf(key) {
            any_rating = true;
            lines.push(format!("{label}: {} ({} {unit})", perf.rating, perf.games));
        }
    }
    if !any_rating {
        lines.push("No ratings yet".to_owned());
    }

    let count = &profile.count;
    lines.push(String::new());
    lines.push("Games:".to_owned());
    lines.push(format!("Total games: {}", count.all));
    lines.push(format!("Rated games: {}", count.rated));
    lines.push(format!(
        "Wins: {} ({}%)",
        count.win,
        percentage(count.win, count.all)
    ));
    lines.push(format!(
        "Draws: {} ({}%)",
        count.draw,
        percentage(count.draw, count.all)
    ));
    lines.push(format!(
        "Losses: {} ({}%)",
        count.loss,
        percentage(count.loss, count.all)
    ));

    lines.join("\n")
}
