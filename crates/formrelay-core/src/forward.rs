//! Outbound requests to the mailer API and response normalization.

use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::response::NormalizedResult;
use crate::submission::Submission;
use formrelay_mime::{ContentType, EncodedMultipart, FORM_ID_FIELD, MultipartBuilder};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

/// Endpoint for JSON submissions.
pub const JSON_PATH: &str = "/form-submissions";

/// Endpoint for multipart submissions.
pub const UPLOAD_PATH: &str = "/form-submissions-upload";

/// Bytes of a non-JSON upstream body kept for diagnostics.
const PREVIEW_BYTES: usize = 200;

/// Re-encodes a completed submission as `multipart/form-data`.
///
/// The form identifier part comes first, then fields in first-seen order,
/// then files in completion order. Client parts named like the form
/// identifier are dropped so only the configured target is sent.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if `form_id` is blank.
pub fn encode_submission(form_id: &str, submission: &Submission) -> Result<EncodedMultipart> {
    let mut builder = MultipartBuilder::new(form_id).map_err(|e| match e {
        formrelay_mime::Error::EmptyFormId => Error::Configuration("formId".to_string()),
        other => other.into(),
    })?;

    for field in submission.fields() {
        if field.name == FORM_ID_FIELD {
            warn!(field = %field.name, "dropping client field named like the form identifier");
            continue;
        }
        builder = builder.text(&field.name, &field.value);
    }
    for file in submission.files() {
        if file.field_name == FORM_ID_FIELD {
            warn!(
                field = %file.field_name,
                filename = %file.filename,
                "dropping client file named like the form identifier"
            );
            continue;
        }
        builder = builder.file(
            &file.field_name,
            &file.filename,
            &file.mime_type,
            file.payload.to_vec(),
        );
    }

    Ok(builder.finish())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonSubmission<'a> {
    form_id: &'a str,
    form_data: &'a Map<String, Value>,
}

/// Re-encoded submission, built fresh per request.
#[derive(Debug, Clone)]
pub enum OutboundEnvelope {
    /// `{formId, formData}` for submissions without files.
    Json {
        /// Target form.
        form_id: String,
        /// Sanitized fields.
        form_data: Map<String, Value>,
    },
    /// Re-encoded multipart body.
    Multipart(EncodedMultipart),
}

impl OutboundEnvelope {
    /// Endpoint path for this encoding.
    #[must_use]
    pub const fn path(&self) -> &'static str {
        match self {
            Self::Json { .. } => JSON_PATH,
            Self::Multipart(_) => UPLOAD_PATH,
        }
    }

    /// `Content-Type` header value for this encoding.
    #[must_use]
    pub fn content_type(&self) -> String {
        match self {
            Self::Json { .. } => ContentType::application_json().to_string(),
            Self::Multipart(encoded) => encoded.content_type(),
        }
    }

    /// Serializes the envelope into request body bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn into_body(self) -> Result<Vec<u8>> {
        match self {
            Self::Json { form_id, form_data } => Ok(serde_json::to_vec(&JsonSubmission {
                form_id: &form_id,
                form_data: &form_data,
            })?),
            Self::Multipart(encoded) => Ok(encoded.body),
        }
    }
}

/// Posts envelopes to the mailer API.
#[derive(Debug, Clone)]
pub struct Forwarder {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    debug: bool,
}

impl Forwarder {
    /// Creates a forwarder with its own HTTP client.
    #[must_use]
    pub fn new(config: &RelayConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Creates a forwarder around an existing HTTP client.
    #[must_use]
    pub fn with_client(http_client: reqwest::Client, config: &RelayConfig) -> Self {
        Self {
            http_client,
            base_url: config.base_url().to_string(),
            api_key: config.api_key.clone(),
            debug: config.debug,
        }
    }

    /// Full URL for an endpoint path.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Sends one envelope and normalizes the answer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the request fails,
    /// [`Error::UpstreamProtocol`] for a non-JSON answer and
    /// [`Error::UpstreamApplication`] for a JSON failure.
    pub async fn forward(&self, envelope: OutboundEnvelope) -> Result<NormalizedResult> {
        let url = self.endpoint(envelope.path());
        let content_type = envelope.content_type();
        let body = envelope.into_body()?;

        if self.debug {
            debug!(%url, %content_type, bytes = body.len(), "forwarding submission");
        }

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        let result = normalize_response(status, content_type.as_deref(), &body, self.debug)?;
        info!(status, "submission accepted");
        Ok(result)
    }
}

/// Interprets an upstream answer.
///
/// # Errors
///
/// - [`Error::UpstreamProtocol`] if the body is not JSON (by content type or
///   by content).
/// - [`Error::UpstreamApplication`] if the body is JSON and the status is a
///   failure.
pub fn normalize_response(
    status: u16,
    content_type: Option<&str>,
    body: &[u8],
    debug: bool,
) -> Result<NormalizedResult> {
    let parsed = content_type.and_then(|ct| ContentType::parse(ct).ok());

    if !parsed.as_ref().is_some_and(ContentType::is_json) {
        let received = match &parsed {
            Some(ct) if ct.is_html() => "HTML".to_string(),
            Some(ct) => ct.essence(),
            None => "an empty content type".to_string(),
        };
        error!(status, %received, "mail service returned a non-JSON response");
        if debug {
            debug!(preview = %preview(body), "non-JSON response body");
        }
        return Err(Error::UpstreamProtocol { status, received });
    }

    let payload: Value = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => {
            error!(status, "mail service returned malformed JSON: {e}");
            if debug {
                debug!(preview = %preview(body), "malformed JSON body");
            }
            return Err(Error::UpstreamProtocol {
                status,
                received: "malformed JSON".to_string(),
            });
        }
    };

    if (200..300).contains(&status) {
        Ok(NormalizedResult::ok(payload))
    } else {
        warn!(status, "mail service rejected the submission");
        Err(Error::UpstreamApplication {
            status,
            body: payload,
        })
    }
}

fn preview(body: &[u8]) -> String {
    let end = body.len().min(PREVIEW_BYTES);
    String::from_utf8_lossy(&body[..end]).into_owned()
}
