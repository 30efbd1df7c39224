//! Request routing and the end-to-end relay pipeline.

use crate::accumulator::Accumulator;
use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::forward::{Forwarder, OutboundEnvelope, encode_submission};
use crate::parse::MultipartParser;
use crate::pipeline::{Pipeline, Stage};
use crate::request::InboundRequest;
use crate::response::{NormalizedResult, OutboundResponse};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

/// Relays form submissions to the mailer API.
///
/// Holds only read-only configuration and an HTTP client; every request
/// gets its own pipeline, buffers and boundary.
#[derive(Debug, Clone)]
pub struct Relay {
    config: RelayConfig,
    forwarder: Forwarder,
}

impl Relay {
    /// Creates a relay with its own HTTP client.
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        let forwarder = Forwarder::new(&config);
        Self { config, forwarder }
    }

    /// Creates a relay around an existing HTTP client.
    #[must_use]
    pub fn with_client(config: RelayConfig, http_client: reqwest::Client) -> Self {
        let forwarder = Forwarder::with_client(http_client, &config);
        Self { config, forwarder }
    }

    /// Relay configuration.
    #[must_use]
    pub const fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Handles one inbound request. Never fails: every error becomes a
    /// JSON response.
    pub async fn handle(&self, request: InboundRequest) -> OutboundResponse {
        if !request.is_post() {
            info!(method = %request.http_method, "rejecting non-POST request");
            return NormalizedResult::method_not_allowed().into_response();
        }

        let mut pipeline = Pipeline::new();
        let result = match self.process(&mut pipeline, &request).await {
            Ok(result) => result,
            Err(e) => {
                pipeline.fail();
                match &e {
                    Error::UpstreamApplication { status, .. } => {
                        warn!(status, "submission rejected upstream");
                    }
                    _ => error!(status = e.status_code(), "submission failed: {e}"),
                }
                e.into_result()
            }
        };

        debug!(stage = %pipeline.stage(), status = result.status_code, "request finished");
        result.into_response()
    }

    async fn process(
        &self,
        pipeline: &mut Pipeline,
        request: &InboundRequest,
    ) -> Result<NormalizedResult> {
        self.config.ensure_valid()?;

        pipeline.advance(Stage::Parsing)?;
        let body = request.decoded_body()?;
        let limit = self.config.limits.max_body_bytes;
        if body.len() > limit {
            return Err(Error::PayloadTooLarge {
                size: body.len(),
                limit,
            });
        }
        if self.config.debug {
            debug!(
                bytes = body.len(),
                base64 = request.is_base64_encoded,
                multipart = request.is_multipart(),
                "decoded request body"
            );
        }

        let envelope = if request.is_multipart() {
            let content_type = request.content_type().unwrap_or_default();
            self.multipart_envelope(pipeline, body, content_type).await?
        } else {
            self.json_envelope(pipeline, &body)?
        };

        pipeline.advance(Stage::Forwarding)?;
        let result = self.forwarder.forward(envelope).await?;
        pipeline.advance(Stage::Succeeded)?;
        Ok(result)
    }

    async fn multipart_envelope(
        &self,
        pipeline: &mut Pipeline,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<OutboundEnvelope> {
        let parser = MultipartParser::new(body, content_type)?.with_debug(self.config.debug);

        pipeline.advance(Stage::Accumulating)?;
        let mut accumulator = Accumulator::from_config(&self.config);
        parser.drain_into(&mut accumulator).await?;
        let honeypot = accumulator.honeypot_tripped();
        let submission = accumulator.into_submission()?;

        pipeline.advance(Stage::Encoding)?;
        let encoded = encode_submission(self.config.form_id(), &submission)?;
        if self.config.debug {
            debug!(
                fields = submission.fields().len(),
                files = submission.files().len(),
                file_bytes = submission.file_bytes(),
                honeypot,
                boundary = %encoded.boundary,
                bytes = encoded.len(),
                "re-encoded multipart body"
            );
        }
        Ok(OutboundEnvelope::Multipart(encoded))
    }

    fn json_envelope(&self, pipeline: &mut Pipeline, body: &[u8]) -> Result<OutboundEnvelope> {
        let value: Value = if body.iter().all(u8::is_ascii_whitespace) {
            Value::Object(Map::new())
        } else {
            serde_json::from_slice(body)?
        };
        let Value::Object(fields) = value else {
            return Err(Error::Parse("JSON body must be an object".to_string()));
        };

        pipeline.advance(Stage::Accumulating)?;
        let reserved = &self.config.reserved;
        let honeypot = fields
            .get(&reserved.honeypot)
            .and_then(Value::as_str)
            .is_some_and(|v| reserved.trips_honeypot(&reserved.honeypot, v));
        if honeypot {
            info!(field = %reserved.honeypot, "honeypot field filled");
        }
        let form_data: Map<String, Value> = fields
            .into_iter()
            .filter(|(name, _)| !reserved.is_reserved(name))
            .collect();

        pipeline.advance(Stage::Encoding)?;
        if self.config.debug {
            debug!(fields = form_data.len(), honeypot, "encoded JSON submission");
        }
        Ok(OutboundEnvelope::Json {
            form_id: self.config.form_id().to_string(),
            form_data,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use serde_json::json;

    // Port 9 (discard) is never contacted: every case here fails before
    // forwarding.
    fn relay(config: RelayConfig) -> Relay {
        Relay::new(config)
    }

    fn valid_config() -> RelayConfig {
        RelayConfig::new("http://127.0.0.1:9", "contact", "key")
    }

    #[tokio::test]
    async fn test_get_is_405() {
        let response = relay(valid_config()).handle(InboundRequest::new("GET")).await;
        assert_eq!(response.status_code, 405);
        assert_eq!(response.json_body().unwrap()["error"], "Method not allowed");
    }

    #[tokio::test]
    async fn test_missing_config_is_500() {
        let config = RelayConfig::new("http://127.0.0.1:9", "contact", "");
        let response = relay(config)
            .handle(InboundRequest::new("POST").with_body("{}"))
            .await;
        assert_eq!(response.status_code, 500);
        assert_eq!(
            response.json_body().unwrap(),
            json!({"success": false, "error": "Missing required configuration: apiKey"})
        );
    }

    #[tokio::test]
    async fn test_json_array_rejected() {
        let response = relay(valid_config())
            .handle(InboundRequest::new("POST").with_body("[1,2]"))
            .await;
        assert_eq!(response.status_code, 500);
        assert_eq!(response.json_body().unwrap()["success"], false);
    }

    #[tokio::test]
    async fn test_body_limit() {
        let config = valid_config().with_limits(Limits {
            max_body_bytes: 4,
            max_file_bytes: 4,
        });
        let response = relay(config)
            .handle(InboundRequest::new("POST").with_body(r#"{"name":"Ann"}"#))
            .await;
        assert_eq!(response.status_code, 413);
    }

    #[tokio::test]
    async fn test_malformed_multipart_is_500() {
        let request = InboundRequest::new("POST")
            .with_header("Content-Type", "multipart/form-data; boundary=abc")
            .with_body("--abc\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nunterminated");
        let response = relay(valid_config()).handle(request).await;
        assert_eq!(response.status_code, 500);
        let body = response.json_body().unwrap();
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().starts_with("Failed to parse form data"));
    }

    #[test]
    fn test_json_envelope_strips_reserved() {
        let relay = relay(valid_config());
        let mut pipeline = Pipeline::new();
        pipeline.advance(Stage::Parsing).unwrap();
        let envelope = relay
            .json_envelope(
                &mut pipeline,
                br#"{"form-name":"contact","bot-field":"","name":"Ann"}"#,
            )
            .unwrap();
        assert_eq!(pipeline.stage(), Stage::Encoding);
        let body: Value = serde_json::from_slice(&envelope.into_body().unwrap()).unwrap();
        assert_eq!(body, json!({"formId": "contact", "formData": {"name": "Ann"}}));
    }

    #[test]
    fn test_filled_honeypot_stripped_from_json() {
        let relay = relay(valid_config().with_debug(true));
        let mut pipeline = Pipeline::new();
        pipeline.advance(Stage::Parsing).unwrap();
        let envelope = relay
            .json_envelope(&mut pipeline, br#"{"bot-field":"http://spam","name":"Ann"}"#)
            .unwrap();
        let body: Value = serde_json::from_slice(&envelope.into_body().unwrap()).unwrap();
        assert_eq!(body["formData"], json!({"name": "Ann"}));
    }

    #[test]
    fn test_empty_json_body_is_empty_object() {
        let relay = relay(valid_config());
        let mut pipeline = Pipeline::new();
        pipeline.advance(Stage::Parsing).unwrap();
        let envelope = relay.json_envelope(&mut pipeline, b"").unwrap();
        let body: Value = serde_json::from_slice(&envelope.into_body().unwrap()).unwrap();
        assert_eq!(body["formData"], json!({}));
    }
}
