//! Error types for quakeboard.
//!
//! Uses `thiserror` for library-style error definitions.

use thiserror::Error;

/// Errors that can occur while fetching the record window.
#[derive(Error, Debug)]
pub enum FeedError {
    /// HTTP request failed (connect, TLS, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Feed returned a non-success status
    #[error("feed error (HTTP {status}): {message}")]
    Status { status: u16, message: String },

    /// Body was not a JSON array of records
    #[error("Failed to parse JSON: {0}")]
    Decode(#[from] serde_json::Error),

    /// A record decoded but its values are unusable
    #[error("invalid record at index {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    /// Endpoint URL could not be parsed
    #[error("invalid feed endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// Fetch task panicked or was cancelled
    #[error("fetch task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Coarse failure taxonomy surfaced to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network unreachable or non-2xx status
    Transport,
    /// Malformed or missing fields in the response body
    Decode,
    /// Bad local configuration
    Config,
}

impl FailureKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Decode => "decode",
            Self::Config => "config",
        }
    }
}

impl FeedError {
    /// Classify this error for diagnostics.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transport(e) if e.is_decode() => FailureKind::Decode,
            Self::Transport(_) | Self::Status { .. } | Self::Task(_) => FailureKind::Transport,
            Self::Decode(_) | Self::InvalidRecord { .. } => FailureKind::Decode,
            Self::InvalidEndpoint(_) => FailureKind::Config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let status = FeedError::Status {
            status: 503,
            message: "unavailable".into(),
        };
        assert_eq!(status.kind(), FailureKind::Transport);

        let decode: FeedError = serde_json::from_str::<Vec<u8>>("{").unwrap_err().into();
        assert_eq!(decode.kind(), FailureKind::Decode);

        let invalid = FeedError::InvalidRecord {
            index: 3,
            reason: "latitude 91 out of range".into(),
        };
        assert_eq!(invalid.kind(), FailureKind::Decode);
        assert_eq!(
            invalid.to_string(),
            "invalid record at index 3: latitude 91 out of range"
        );

        let endpoint: FeedError = url::Url::parse("not a url").unwrap_err().into();
        assert_eq!(endpoint.kind(), FailureKind::Config);
    }
}
