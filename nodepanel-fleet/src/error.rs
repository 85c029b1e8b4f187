//! Error types for the fleet control plane

use thiserror::Error;

/// Fleet error types
///
/// Transport failures are recovered locally by the monitors (status flip to
/// offline) and never escape a control loop; host-key mismatches carry the
/// offending fingerprint for an explicit user trust decision.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("SSH host key mismatch: presented fingerprint {fingerprint}")]
    HostKeyMismatch { fingerprint: String },

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] nodepanel_core::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl Error {
    /// Transport and timeout failures are expected during partial failure
    /// and handled by status flips rather than propagation.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

/// Result type for fleet operations
pub type Result<T> = std::result::Result<T, Error>;
