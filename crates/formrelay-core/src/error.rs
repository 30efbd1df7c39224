//! Error types for the relay pipeline.

use crate::pipeline::Stage;
use crate::response::NormalizedResult;
use thiserror::Error;

/// Errors that can occur while relaying a submission.
#[derive(Debug, Error)]
pub enum Error {
    /// A required setting is missing or blank.
    #[error("Missing required configuration: {0}")]
    Configuration(String),

    /// The inbound body could not be parsed.
    #[error("Failed to parse form data: {0}")]
    Parse(String),

    /// One file part failed mid-stream. Recovered locally by dropping the file.
    #[error("File stream error in field {field}: {reason}")]
    FileStream {
        /// Form field the file was attached to.
        field: String,
        /// What went wrong.
        reason: String,
    },

    /// The decoded inbound body exceeds the configured limit.
    #[error("Payload of {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge {
        /// Actual size in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// The mailer API answered with something other than JSON.
    #[error("Expected JSON but received {received} (status {status})")]
    UpstreamProtocol {
        /// Upstream HTTP status.
        status: u16,
        /// Short description of what was received instead.
        received: String,
    },

    /// The mailer API answered with JSON and a failing status.
    #[error("Mail service rejected the submission with status {status}")]
    UpstreamApplication {
        /// Upstream HTTP status.
        status: u16,
        /// Upstream JSON body, passed through verbatim.
        body: serde_json::Value,
    },

    /// The mailer API could not be reached.
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Encoding or decoding error from the MIME layer.
    #[error("MIME error: {0}")]
    Mime(#[from] formrelay_mime::Error),

    /// The pipeline was asked to skip a stage.
    #[error("Invalid pipeline transition from {from} to {to}")]
    InvalidTransition {
        /// Current stage.
        from: Stage,
        /// Requested stage.
        to: Stage,
    },
}

impl Error {
    /// HTTP status reported to the original caller.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::PayloadTooLarge { .. } => 413,
            Self::UpstreamProtocol { status, .. } => {
                if *status >= 400 {
                    *status
                } else {
                    502
                }
            }
            Self::UpstreamApplication { status, .. } => *status,
            Self::Configuration(_)
            | Self::Parse(_)
            | Self::FileStream { .. }
            | Self::Transport(_)
            | Self::Json(_)
            | Self::Mime(_)
            | Self::InvalidTransition { .. } => 500,
        }
    }

    /// Renders this error as the envelope returned to the caller.
    ///
    /// Upstream JSON failures pass through verbatim; everything else gets a
    /// short `error` plus optional `details`.
    #[must_use]
    pub fn into_result(self) -> NormalizedResult {
        let status = self.status_code();
        match self {
            Self::UpstreamApplication { status, body } => {
                NormalizedResult::passthrough(status, body)
            }
            Self::UpstreamProtocol { .. } => NormalizedResult::failure(
                status,
                "Invalid response from mail service",
                Some(self.to_string()),
            ),
            Self::Transport(ref e) => NormalizedResult::failure(
                status,
                "Failed to reach mail service",
                Some(e.to_string()),
            ),
            Self::Json(ref e) => {
                NormalizedResult::failure(status, "Invalid JSON payload", Some(e.to_string()))
            }
            Self::PayloadTooLarge { .. } => {
                NormalizedResult::failure(status, "Payload too large", Some(self.to_string()))
            }
            Self::InvalidTransition { .. } => {
                NormalizedResult::failure(status, "Internal error", Some(self.to_string()))
            }
            Self::Configuration(_) | Self::Parse(_) | Self::FileStream { .. } | Self::Mime(_) => {
                NormalizedResult::failure(status, self.to_string(), None)
            }
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
