use serde::Serialize;
use thiserror::Error;

use crate::common::types::{GuildId, now_ms};

/// Failure taxonomy of the playback core.
///
/// `DuplicateRequest`, `CapabilityUnavailable` and `TimeoutFired` are expected control
/// signals. The hot paths model them as outcome values and only lift them into this enum
/// when a caller needs a uniform error.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("a request is already in progress for guild {0}")]
    DuplicateRequest(GuildId),

    #[error("failed to resolve track: {0}")]
    Resolution(String),

    #[error("failed to spawn resolver process: {0}")]
    ProcessSpawn(#[source] std::io::Error),

    #[error("audio sink for guild {0} has no volume control")]
    CapabilityUnavailable(GuildId),

    #[error("inactivity timeout fired for guild {0}")]
    TimeoutFired(GuildId),

    #[error("no active session for guild {0}")]
    SessionNotFound(GuildId),

    #[error("invalid UI transition from {from} on {event}")]
    InvalidTransition { from: &'static str, event: &'static str },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Short, user-facing wording. Full detail belongs in the logs only.
    pub fn user_message(&self) -> String {
        match self {
            Self::DuplicateRequest(_) => "Already processing a request, please wait.".into(),
            Self::Resolution(_) => "Could not load that track.".into(),
            Self::ProcessSpawn(_) => "The track resolver is unavailable right now.".into(),
            Self::CapabilityUnavailable(_) => "Volume control is not supported here.".into(),
            Self::TimeoutFired(_) => "Left the channel after inactivity.".into(),
            Self::SessionNotFound(_) => "Nothing is playing.".into(),
            Self::InvalidTransition { .. } | Self::Io(_) => "Something went wrong.".into(),
        }
    }
}

/// JSON error body returned by the HTTP surface.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
    /// HTTP status code.
    pub status: u16,
    /// HTTP status reason phrase (e.g. "Bad Request").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    /// The request path that caused the error.
    pub path: String,
}

impl ApiError {
    fn with_status(
        status: u16,
        error: &str,
        message: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: now_ms(),
            status,
            error: error.into(),
            message: message.into(),
            path: path.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::with_status(400, "Bad Request", message, path)
    }

    pub fn not_found(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::with_status(404, "Not Found", message, path)
    }

    pub fn internal(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::with_status(500, "Internal Server Error", message, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hides_detail() {
        let err = CoreError::Resolution("yt-dlp: ERROR: Video unavailable (code 403)".into());
        assert_eq!(err.user_message(), "Could not load that track.");
        assert!(err.to_string().contains("code 403"));
    }

    #[test]
    fn test_api_error_serializes_camel_case() {
        let body = serde_json::to_value(ApiError::not_found("nope", "/v1/guilds/1")).unwrap();
        assert_eq!(body["status"], 404);
        assert_eq!(body["error"], "Not Found");
        assert_eq!(body["path"], "/v1/guilds/1");
        assert!(body["timestamp"].as_u64().unwrap() > 0);
    }
}
