use thiserror::Error;

/// Failure talking to the Lichess API. Callers never see this directly: the
/// client logs it and reports the data as absent.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("{url} returned an unreadable body: {message}")]
    Decode { url: String, message: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("invalid time of day `{0}`, expected HH:MM")]
    InvalidTime(String),

    #[error("unknown timezone `{0}`")]
    InvalidTimezone(String),
}
