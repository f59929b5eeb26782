use std::time::Duration;

use thiserror::Error;

/// Failures of a [SessionSink](crate::daemon::storage::session_storage::SessionSink). Writes
/// and queries are kept apart since the daemon drops failed writes while reports surface
/// failed queries.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to store session: {0}")]
    Write(#[source] StoreFailure),
    #[error("failed to query sessions: {0}")]
    Query(#[source] StoreFailure),
    #[error("store did not answer within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum StoreFailure {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("store answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// A stored `HH:MM:SS` duration that can't be read back.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationParseError {
    #[error("duration is empty")]
    Empty,
    #[error("duration {0:?} has too many components")]
    TooManyComponents(String),
    #[error("duration {0:?} contains a component that isn't a non-negative integer")]
    InvalidComponent(String),
    #[error("duration {0:?} has minutes or seconds out of range")]
    OutOfRange(String),
}
