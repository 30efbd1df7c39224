//! Transport decoding for inbound bodies and header-safe escaping.

use crate::error::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data.
///
/// Whitespace is stripped first since some hosts wrap long payloads.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Escapes a `Content-Disposition` parameter value.
///
/// Double quotes, CR and LF are percent-encoded the way browsers do for
/// `multipart/form-data`, so the value can sit inside a quoted string on a
/// single header line.
#[must_use]
pub fn escape_disposition_param(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => escaped.push_str("%22"),
            '\r' => escaped.push_str("%0D"),
            '\n' => escaped.push_str("%0A"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_decode_binary() {
        let data = [0u8, 159, 146, 150, 255, 13, 10];
        let encoded = encode_base64(&data);
        assert_eq!(decode_base64(&encoded).unwrap(), data);
    }

    #[test]
    fn test_base64_decode_ignores_line_wrapping() {
        let decoded = decode_base64("SGVsbG8s\r\nIFdvcmxkIQ==").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_base64_decode_invalid() {
        assert!(decode_base64("not base64!!!").is_err());
    }

    #[test]
    fn test_escape_plain_value_unchanged() {
        assert_eq!(escape_disposition_param("résumé 2024.pdf"), "résumé 2024.pdf");
    }

    #[test]
    fn test_escape_quotes_and_newlines() {
        assert_eq!(escape_disposition_param("a\"b\r\nc"), "a%22b%0D%0Ac");
    }
}
