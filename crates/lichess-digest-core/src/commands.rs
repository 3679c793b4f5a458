//! Text commands understood by the chat bot.

use crate::types::TrackedUser;

pub const START_TEXT: &str = "Hi! I post daily Lichess stats for the players tracked in this chat. \
Use /help to see every command.";

pub const ADD_USAGE: &str = "Usage: /add {handle} {display name}";
pub const EDIT_USAGE: &str = "Usage: /edit {handle}";
pub const EDIT_REPLY_USAGE: &str = "Usage: {handle} {display name}";
pub const REMOVE_USAGE: &str = "Usage: /remove {handle}";
pub const FULL_STATS_USAGE: &str = "Usage: /full_stats {handle}";
pub const SET_TIME_USAGE: &str = "Usage: /set_time {HH:MM}";

const HELP_LINES: [&str; 9] = [
    "/start - Start talking to the bot",
    "/help - Show this help",
    "/add {handle} {display name} - Track a Lichess player",
    "/list - Show tracked players",
    "/edit {handle} - Change a tracked player's handle or name",
    "/remove {handle} - Stop tracking a player",
    "/daily_stats [handle] - Today's stats for everyone, or for one player",
    "/full_stats {handle} - Lifetime stats for a player",
    "/set_time {HH:MM} - Time of the automatic daily digest",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Add { handle: String, display_name: String },
    List,
    Edit { handle: String },
    Remove { handle: String },
    DailyStats { handle: Option<String> },
    FullStats { handle: String },
    SetTime { time: String },
    /// A known command with missing arguments; carries the usage line.
    Usage(&'static str),
    Unknown(String),
}

/// Parses a message starting with `/`. Plain text yields `None`.
pub fn parse_command(text: &str) -> Option<Command> {
    let text = text.trim();
    let body = text.strip_prefix('/')?;

    let (word, rest) = match body.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (body, ""),
    };
    // `/cmd@botname` addresses one bot in a shared chat.
    let name = word.split_once('@').map_or(word, |(name, _)| name);
    let first_arg = rest.split_whitespace().next().map(str::to_owned);

    let command = match name.to_ascii_lowercase().as_str() {
        "start" => Command::Start,
        "help" => Command::Help,
        "list" => Command::List,
        "add" => match parse_user_line(rest) {
            Some(user) => Command::Add {
                handle: user.handle,
                display_name: user.display_name,
            },
            None => Command::Usage(ADD_USAGE),
        },
        "edit" => first_arg.map_or(Command::Usage(EDIT_USAGE), |handle| Command::Edit { handle }),
        "remove" => first_arg.map_or(Command::Usage(REMOVE_USAGE), |handle| Command::Remove {
            handle,
        }),
        "daily_stats" => Command::DailyStats { handle: first_arg },
        "full_stats" => first_arg.map_or(Command::Usage(FULL_STATS_USAGE), |handle| {
            Command::FullStats { handle }
        }),
        "set_time" => first_arg.map_or(Command::Usage(SET_TIME_USAGE), |time| Command::SetTime {
            time,
        }),
        _ => Command::Unknown(name.to_owned()),
    };
    Some(command)
}

/// `{handle} {display name}`; the name may contain spaces.
pub fn parse_user_line(text: &str) -> Option<TrackedUser> {
    let mut words = text.split_whitespace();
    let handle = words.next()?;
    let display_name = words.collect::<Vec<_>>().join(" ");
    if display_name.is_empty() {
        return None;
    }
    Some(TrackedUser::new(handle, display_name))
}

pub fn help_text() -> String {
    format!("Available commands:\n\n{}", HELP_LINES.join("\n"))
}

pub fn format_user_list(users: &[TrackedUser]) -> String {
    if users.is_empty() {
        return "No players are tracked yet.".to_owned();
    }

    let lines = users
        .iter()
        .map(|user| format!("{} ({})", user.handle, user.display_name))
        .collect::<Vec<_>>();
    format!("Tracked players:\n{}", lines.join("\n"))
}
