//! Per-request pipeline stages.
//!
//! ```text
//! Idle → Parsing → Accumulating → Encoding → Forwarding → Succeeded
//!   └───────┴───────────┴────────────┴───────────┴──────→ Failed
//! ```

use crate::error::{Error, Result};
use std::fmt;

/// Stage of one relayed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Request received, nothing done yet.
    Idle,
    /// Decoding and validating the inbound body.
    Parsing,
    /// Collecting fields and file payloads.
    Accumulating,
    /// Building the outbound envelope.
    Encoding,
    /// Waiting on the mailer API.
    Forwarding,
    /// Upstream accepted the submission.
    Succeeded,
    /// Any failure.
    Failed,
}

impl Stage {
    /// Stage that must follow this one on the success path.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Parsing),
            Self::Parsing => Some(Self::Accumulating),
            Self::Accumulating => Some(Self::Encoding),
            Self::Encoding => Some(Self::Forwarding),
            Self::Forwarding => Some(Self::Succeeded),
            Self::Succeeded | Self::Failed => None,
        }
    }

    /// Returns `true` for `Succeeded` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Parsing => "parsing",
            Self::Accumulating => "accumulating",
            Self::Encoding => "encoding",
            Self::Forwarding => "forwarding",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks the stage of a single request and rejects skipped transitions.
#[derive(Debug)]
pub struct Pipeline {
    stage: Stage,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Starts a pipeline in [`Stage::Idle`].
    #[must_use]
    pub const fn new() -> Self {
        Self { stage: Stage::Idle }
    }

    /// Current stage.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Moves to `to`, which must be the next stage in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] if `to` is not the next stage.
    pub fn advance(&mut self, to: Stage) -> Result<()> {
        if self.stage.next() != Some(to) {
            return Err(Error::InvalidTransition {
                from: self.stage,
                to,
            });
        }
        tracing::debug!(from = %self.stage, to = %to, "pipeline transition");
        self.stage = to;
        Ok(())
    }

    /// Moves to [`Stage::Failed`] from any non-terminal stage.
    pub fn fail(&mut self) {
        if !self.stage.is_terminal() {
            tracing::debug!(from = %self.stage, "pipeline failed");
            self.stage = Stage::Failed;
        }
    }
}
