//! Normalized results and the response handed back to the host runtime.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Envelope shape returned to callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Whether the submission was accepted.
    pub success: bool,
    /// Upstream payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Short error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Additional diagnostic detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Outcome of one relayed submission, independent of the encoding path.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResult {
    /// HTTP status for the caller.
    pub status_code: u16,
    /// Whether the submission was accepted.
    pub success: bool,
    /// JSON body for the caller.
    pub payload: Value,
}

impl NormalizedResult {
    /// Wraps a successful upstream payload as `{success: true, data}`.
    #[must_use]
    pub fn ok(data: Value) -> Self {
        Self::from_envelope(
            200,
            &ResponseEnvelope {
                success: true,
                data: Some(data),
                ..ResponseEnvelope::default()
            },
        )
    }

    /// Builds a failure envelope.
    #[must_use]
    pub fn failure(status_code: u16, error: impl Into<String>, details: Option<String>) -> Self {
        Self::from_envelope(
            status_code,
            &ResponseEnvelope {
                success: false,
                error: Some(error.into()),
                details,
                ..ResponseEnvelope::default()
            },
        )
    }

    /// Passes an upstream JSON body through verbatim.
    ///
    /// `success` is taken from the body's own `success` flag when present.
    #[must_use]
    pub fn passthrough(status_code: u16, payload: Value) -> Self {
        let success = payload
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Self {
            status_code,
            success,
            payload,
        }
    }

    /// Rejects a request whose method is not `POST`.
    #[must_use]
    pub fn method_not_allowed() -> Self {
        Self::failure(405, "Method not allowed", None)
    }

    fn from_envelope(status_code: u16, envelope: &ResponseEnvelope) -> Self {
        let payload = serde_json::to_value(envelope).unwrap_or_else(|_| Value::Object(Map::new()));
        Self {
            status_code,
            success: envelope.success,
            payload,
        }
    }

    /// Renders the result as a host-runtime response.
    #[must_use]
    pub fn into_response(self) -> OutboundResponse {
        OutboundResponse::json(self.status_code, &self.payload)
    }
}

/// Response returned to the host runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundResponse {
    /// HTTP status.
    pub status_code: u16,
    /// Response headers.
    pub headers: BTreeMap<String, String>,
    /// JSON body text.
    pub body: String,
}

impl OutboundResponse {
    /// Builds a JSON response carrying the CORS allow-all header.
    #[must_use]
    pub fn json(status_code: u16, payload: &Value) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Access-Control-Allow-Origin".to_string(), "*".to_string());
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            status_code,
            headers,
            body: payload.to_string(),
        }
    }

    /// Parses the body back into JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON.
    pub fn json_body(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.body)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_wraps_data() {
        let result = NormalizedResult::ok(json!({"ok": true}));
        assert_eq!(result.status_code, 200);
        assert!(result.success);
        assert_eq!(result.payload, json!({"success": true, "data": {"ok": true}}));
    }

    #[test]
    fn test_failure_omits_empty_fields() {
        let result = NormalizedResult::failure(500, "boom", None);
        assert_eq!(result.payload, json!({"success": false, "error": "boom"}));
    }

    #[test]
    fn test_passthrough_reads_success_flag() {
        let result = NormalizedResult::passthrough(400, json!({"success": true, "x": 1}));
        assert!(result.success);
        let result = NormalizedResult::passthrough(400, json!({"error": "bad"}));
        assert!(!result.success);
        assert_eq!(result.payload, json!({"error": "bad"}));
    }

    #[test]
    fn test_response_headers() {
        let response = NormalizedResult::method_not_allowed().into_response();
        assert_eq!(response.status_code, 405);
        assert_eq!(
            response.headers.get("Access-Control-Allow-Origin"),
            Some(&"*".to_string())
        );
        assert_eq!(response.json_body().unwrap()["error"], "Method not allowed");
    }

    #[test]
    fn test_response_serializes_camel_case() {
        let response = NormalizedResult::ok(json!(1)).into_response();
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["statusCode"], 200);
        assert!(value["body"].is_string());
    }
}
