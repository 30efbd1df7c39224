//! Inbound request as supplied by the host runtime.

use crate::error::Result;
use formrelay_mime::encoding::decode_base64;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

/// One serverless invocation event.
///
/// Deserializes from the common `{httpMethod, headers, body, isBase64Encoded}`
/// shape; `null` headers or body are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundRequest {
    /// HTTP method.
    pub http_method: String,
    /// Request headers; names may use any case.
    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: HashMap<String, String>,
    /// Raw body text, base64 when `is_base64_encoded` is set.
    #[serde(default)]
    pub body: Option<String>,
    /// Whether `body` is base64 encoded.
    #[serde(default)]
    pub is_base64_encoded: bool,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl InboundRequest {
    /// Creates a request with no headers and no body.
    #[must_use]
    pub fn new(http_method: impl Into<String>) -> Self {
        Self {
            http_method: http_method.into(),
            ..Self::default()
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets a plain text body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self.is_base64_encoded = false;
        self
    }

    /// Sets a binary body, base64 encoded as hosts deliver it.
    #[must_use]
    pub fn with_binary_body(mut self, body: &[u8]) -> Self {
        self.body = Some(formrelay_mime::encoding::encode_base64(body));
        self.is_base64_encoded = true;
        self
    }

    /// Looks up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The `Content-Type` header, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Whether the method is `POST`.
    #[must_use]
    pub fn is_post(&self) -> bool {
        self.http_method.eq_ignore_ascii_case("POST")
    }

    /// Whether the body is `multipart/form-data`.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("multipart/form-data"))
    }

    /// Decodes the body into raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is flagged as base64 but is not valid base64.
    pub fn decoded_body(&self) -> Result<Vec<u8>> {
        match &self.body {
            None => Ok(Vec::new()),
            Some(body) if self.is_base64_encoded => Ok(decode_base64(body)?),
            Some(body) => Ok(body.as_bytes().to_vec()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_header_case_insensitive() {
        let request = InboundRequest::new("POST")
            .with_header("Content-Type", "multipart/form-data; boundary=x");
        assert!(request.is_multipart());
        assert_eq!(request.header("CONTENT-TYPE"), request.content_type());
    }

    #[test]
    fn test_json_by_default() {
        let request = InboundRequest::new("post").with_body("{}");
        assert!(request.is_post());
        assert!(!request.is_multipart());
    }

    #[test]
    fn test_decode_base64_body() {
        let data = [0u8, 255, 13, 10, 128];
        let request = InboundRequest::new("POST").with_binary_body(&data);
        assert_eq!(request.decoded_body().unwrap(), data);
    }

    #[test]
    fn test_missing_body_is_empty() {
        assert!(InboundRequest::new("POST").decoded_body().unwrap().is_empty());
    }

    #[test]
    fn test_deserialize_event() {
        let event = r#"{
            "httpMethod": "POST",
            "headers": {"content-type": "application/json"},
            "body": "{\"name\":\"Ann\"}",
            "isBase64Encoded": false
        }"#;
        let request: InboundRequest = serde_json::from_str(event).unwrap();
        assert!(request.is_post());
        assert_eq!(request.content_type(), Some("application/json"));
        assert_eq!(request.decoded_body().unwrap(), br#"{"name":"Ann"}"#);
    }

    #[test]
    fn test_deserialize_null_headers() {
        let event = r#"{"httpMethod": "GET", "headers": null, "body": null}"#;
        let request: InboundRequest = serde_json::from_str(event).unwrap();
        assert!(request.headers.is_empty());
        assert!(!request.is_base64_encoded);
    }
}
