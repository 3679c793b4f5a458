pub mod chat;
pub mod commands;
pub mod config;
pub mod delivery;
pub mod digest;
pub mod discord_bot;
pub mod error;
pub mod format;
pub mod http;
pub mod lichess;
pub mod roster;
pub mod scheduler;
pub mod sessions;
pub mod stats;
pub mod time_utils;
pub mod types;
