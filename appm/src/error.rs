//! APPM error types

use thiserror::Error;

/// Errors raised while launching or driving the APPM tool
#[derive(Debug, Error)]
pub enum AppmError {
    #[error("APPM control API did not respond within {waited_secs}s")]
    Unavailable { waited_secs: u64 },

    #[error("APPM {command} command failed: {detail}")]
    CommandFailed { command: String, detail: String },

    #[error("APPM rejected the measurement configuration: {detail}")]
    Rejected { detail: String },

    #[error("invalid measurement configuration: {0}")]
    InvalidConfiguration(String),

    #[error("failed to launch APPM: {detail}")]
    Launch { detail: String },

    #[error("APPM version {found} is older than the minimum supported {minimum}")]
    UnsupportedVersion { found: String, minimum: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed APPM response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl AppmError {
    /// Create a command failure with operation context
    pub fn command_failed(command: impl Into<String>, detail: impl Into<String>) -> Self {
        AppmError::CommandFailed {
            command: command.into(),
            detail: detail.into(),
        }
    }

    pub fn launch(detail: impl Into<String>) -> Self {
        AppmError::Launch {
            detail: detail.into(),
        }
    }
}
