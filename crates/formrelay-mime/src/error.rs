//! Error types for MIME operations.

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Missing boundary in multipart content type.
    #[error("Missing boundary in multipart content type")]
    MissingBoundary,

    /// Form identifier is missing or blank.
    #[error("Form identifier must not be empty")]
    EmptyFormId,

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}
