//! Error types for score fetching.

use std::time::Duration;
use thiserror::Error;

/// Reasons a fetch can fail to produce a score.
///
/// `Clone` so outcomes can travel inside [`crate::model::FetchEvent`]s; I/O
/// errors are therefore carried as their rendered message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The script could not be spawned.
    #[error("failed to start `{program}`: {reason}")]
    ProcessStartFailure { program: String, reason: String },

    /// Stdout closed (or the first line was blank) before a record arrived.
    #[error("script produced no output")]
    NoOutputProduced,

    /// The record has no `score` key.
    #[error("no `score` key in output: {line}")]
    KeyNotFound { line: String },

    /// The `score` value is not a finite number.
    #[error("invalid score value `{raw}`")]
    ValueParseFailure { raw: String },

    /// JSON format was requested but the line is not a JSON object.
    #[error("malformed output: {0}")]
    MalformedOutput(String),

    /// Reading the script's stdout or waiting for it failed.
    #[error("failed to read script output: {0}")]
    Read(String),

    /// The script ran past the configured timeout and was killed.
    #[error("script timed out after {}", format_timeout(.0))]
    Timeout(Duration),

    /// The fetch was cancelled before the script finished.
    #[error("fetch cancelled")]
    Cancelled,
}

fn format_timeout(d: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*d)
}
