//! Relay configuration and validation.

use crate::error::{Error, Result};

/// Default cap on a decoded inbound body (10 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Default cap on a single buffered attachment (8 MiB).
pub const DEFAULT_MAX_FILE_BYTES: usize = 8 * 1024 * 1024;

/// Default name of the form identity marker field.
pub const DEFAULT_FORM_NAME_FIELD: &str = "form-name";

/// Default name of the anti-spam honeypot field.
pub const DEFAULT_HONEYPOT_FIELD: &str = "bot-field";

/// Size limits applied while ingesting a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Largest decoded request body accepted, in bytes.
    pub max_body_bytes: usize,
    /// Largest single attachment buffered, in bytes.
    pub max_file_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

/// Control field names that are stripped from every submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedFields {
    /// Form identity marker (e.g. `form-name`).
    pub form_name: String,
    /// Honeypot marker (e.g. `bot-field`).
    pub honeypot: String,
}

impl Default for ReservedFields {
    fn default() -> Self {
        Self {
            form_name: DEFAULT_FORM_NAME_FIELD.to_string(),
            honeypot: DEFAULT_HONEYPOT_FIELD.to_string(),
        }
    }
}

impl ReservedFields {
    /// Checks whether a field name is a control signal.
    #[must_use]
    pub fn is_reserved(&self, name: &str) -> bool {
        name == self.form_name || name == self.honeypot
    }

    /// Checks whether a field name is the honeypot.
    #[must_use]
    pub fn is_honeypot(&self, name: &str) -> bool {
        name == self.honeypot
    }

    /// Checks whether a field fills the honeypot with a non-blank value.
    #[must_use]
    pub fn trips_honeypot(&self, name: &str, value: &str) -> bool {
        self.is_honeypot(name) && !value.trim().is_empty()
    }
}

/// A required setting that is missing or blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigIssue {
    /// Downstream base URL is empty.
    MissingBaseUrl,
    /// Form identifier is empty.
    MissingFormId,
    /// API credential is empty.
    MissingApiKey,
}

impl ConfigIssue {
    /// Name of the setting, as reported to callers.
    #[must_use]
    pub const fn setting(&self) -> &'static str {
        match self {
            Self::MissingBaseUrl => "baseUrl",
            Self::MissingFormId => "formId",
            Self::MissingApiKey => "apiKey",
        }
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} is required", self.setting())
    }
}

/// Static configuration, read-only once a [`crate::Relay`] is built.
#[derive(Clone, Default)]
pub struct RelayConfig {
    /// Base URL of the downstream mailer API.
    pub base_url: String,
    /// Identifier of the target form downstream.
    pub form_id: String,
    /// Bearer credential for the downstream API.
    pub api_key: String,
    /// Enables verbose diagnostics (payload previews, byte counts).
    pub debug: bool,
    /// Ingestion size limits.
    pub limits: Limits,
    /// Control fields never forwarded.
    pub reserved: ReservedFields,
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("base_url", &self.base_url)
            .field("form_id", &self.form_id)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("debug", &self.debug)
            .field("limits", &self.limits)
            .field("reserved", &self.reserved)
            .finish()
    }
}

impl RelayConfig {
    /// Creates a configuration with default limits and reserved fields.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        form_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            form_id: form_id.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Enables or disables verbose diagnostics.
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the ingestion size limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the reserved control field names.
    #[must_use]
    pub fn with_reserved(mut self, reserved: ReservedFields) -> Self {
        self.reserved = reserved;
        self
    }

    /// Returns the base URL without trailing slashes.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }

    /// Returns the trimmed form identifier.
    #[must_use]
    pub fn form_id(&self) -> &str {
        self.form_id.trim()
    }

    /// Lists every required setting that is missing.
    ///
    /// # Errors
    ///
    /// Returns all issues found, in a stable order.
    pub fn validate(&self) -> std::result::Result<(), Vec<ConfigIssue>> {
        let mut issues = Vec::new();

        if self.base_url().is_empty() {
            issues.push(ConfigIssue::MissingBaseUrl);
        }
        if self.form_id().is_empty() {
            issues.push(ConfigIssue::MissingFormId);
        }
        if self.api_key.trim().is_empty() {
            issues.push(ConfigIssue::MissingApiKey);
        }

        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }

    /// Fails with a configuration error naming every missing setting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if any required setting is missing.
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate().map_err(|issues| {
            let names: Vec<&str> = issues.iter().map(ConfigIssue::setting).collect();
            Error::Configuration(names.join(", "))
        })
    }
}
