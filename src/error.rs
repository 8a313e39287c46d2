//! Error types for the voice assistant core

use thiserror::Error;

/// Result type alias for voice assistant operations
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies a failed backend exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    /// Backend answered with a non-2xx HTTP status
    Http(u16),
    /// Request produced no response at all
    Network,
    /// Client-side timeout elapsed before a response arrived
    Timeout,
    /// 2xx response whose payload carried `success: false`
    Rejected,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(code) => write!(f, "{code}"),
            Self::Network => write!(f, "network"),
            Self::Timeout => write!(f, "timeout"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Errors that can occur in the voice assistant core
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Microphone permission refused by the user or OS
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    /// No usable capture device
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Recording requested before the microphone was acquired
    #[error("microphone not acquired")]
    NotAcquired,

    /// Recording requested while one is already in progress
    #[error("a recording is already in progress")]
    AlreadyRecording,

    /// Backend request failed
    #[error("service error ({status}): {detail}")]
    Service {
        /// What kind of failure this was
        status: ServiceStatus,
        /// Backend-provided or transport-level detail, for logs only
        detail: String,
    },

    /// Audio decode or output failure
    #[error("playback error: {0}")]
    Playback(String),

    /// Audio device or encoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Operation requires an open session
    #[error("session is closed")]
    SessionClosed,

    /// A voice or text turn is already in flight
    #[error("a turn is already in flight")]
    TurnInFlight,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Build a [`Error::Service`] from a reqwest transport failure,
    /// distinguishing client-side timeouts from plain network errors
    pub(crate) fn from_transport(e: &reqwest::Error) -> Self {
        let status = if e.is_timeout() {
            ServiceStatus::Timeout
        } else {
            ServiceStatus::Network
        };
        Self::Service {
            status,
            detail: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_status_display() {
        assert_eq!(ServiceStatus::Http(500).to_string(), "500");
        assert_eq!(ServiceStatus::Network.to_string(), "network");
        assert_eq!(ServiceStatus::Timeout.to_string(), "timeout");
        assert_eq!(ServiceStatus::Rejected.to_string(), "rejected");
    }

    #[test]
    fn service_error_message_includes_status_and_detail() {
        let err = Error::Service {
            status: ServiceStatus::Http(401),
            detail: "unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "service error (401): unauthorized");
    }
}
