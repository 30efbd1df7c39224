//! `multipart/form-data` body generation (RFC 7578).
//!
//! The body is assembled as an ordered list of [`Segment`]s. Text segments
//! hold framing and field values, byte segments hold file payloads
//! untouched. Segments are only concatenated into a single buffer in
//! [`MultipartBuilder::finish`], so file bytes never pass through a string.

use crate::boundary::generate_boundary;
use crate::content_type::ContentType;
use crate::encoding::escape_disposition_param;
use crate::error::{Error, Result};

/// Name of the part that identifies the target form downstream.
pub const FORM_ID_FIELD: &str = "formId";

const CRLF: &str = "\r\n";

/// One piece of an outbound multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Framing or a text value, written as UTF-8.
    Text(String),
    /// Raw file payload.
    Bytes(Vec<u8>),
}

impl Segment {
    fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Bytes(bytes) => bytes.len(),
        }
    }
}

/// Builder for an outbound `multipart/form-data` body.
///
/// The form identifier part is always written first; other parts follow in
/// the order they are added.
#[derive(Debug, Clone)]
pub struct MultipartBuilder {
    boundary: String,
    segments: Vec<Segment>,
    parts: usize,
}

impl MultipartBuilder {
    /// Starts a body with a freshly generated boundary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyFormId`] if `form_id` is blank.
    pub fn new(form_id: &str) -> Result<Self> {
        Self::with_boundary(form_id, generate_boundary())
    }

    /// Starts a body with a caller-chosen boundary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyFormId`] if `form_id` is blank, or
    /// [`Error::MissingBoundary`] if `boundary` is empty.
    pub fn with_boundary(form_id: &str, boundary: impl Into<String>) -> Result<Self> {
        let form_id = form_id.trim();
        if form_id.is_empty() {
            return Err(Error::EmptyFormId);
        }

        let boundary = boundary.into();
        if boundary.is_empty() {
            return Err(Error::MissingBoundary);
        }

        let builder = Self {
            boundary,
            segments: Vec::new(),
            parts: 0,
        };
        Ok(builder.text(FORM_ID_FIELD, form_id))
    }

    /// Returns the boundary this body is framed with.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Returns the number of parts added so far, form identifier included.
    #[must_use]
    pub const fn part_count(&self) -> usize {
        self.parts
    }

    /// Appends a text field.
    #[must_use]
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.open_part(name, None, None);
        self.segments.push(Segment::Text(value.to_string()));
        self.close_part();
        self
    }

    /// Appends a file part.
    #[must_use]
    pub fn file(
        mut self,
        name: &str,
        filename: &str,
        content_type: &str,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        self.open_part(name, Some(filename), Some(content_type));
        self.segments.push(Segment::Bytes(payload.into()));
        self.close_part();
        self
    }

    fn open_part(&mut self, name: &str, filename: Option<&str>, content_type: Option<&str>) {
        let mut head = format!(
            "--{}{CRLF}Content-Disposition: form-data; name=\"{}\"",
            self.boundary,
            escape_disposition_param(name)
        );
        if let Some(filename) = filename {
            head.push_str("; filename=\"");
            head.push_str(&escape_disposition_param(filename));
            head.push('"');
        }
        head.push_str(CRLF);
        if let Some(content_type) = content_type {
            head.push_str("Content-Type: ");
            head.push_str(content_type);
            head.push_str(CRLF);
        }
        head.push_str(CRLF);
        self.segments.push(Segment::Text(head));
        self.parts += 1;
    }

    fn close_part(&mut self) {
        self.segments.push(Segment::Text(CRLF.to_string()));
    }

    /// Returns the segments written so far, without the closing delimiter.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Writes the closing delimiter and concatenates every segment.
    #[must_use]
    pub fn finish(mut self) -> EncodedMultipart {
        let closing = format!("--{}--{CRLF}", self.boundary);
        self.segments.push(Segment::Text(closing));

        let total = self.segments.iter().map(Segment::len).sum();
        let mut body = Vec::with_capacity(total);
        for segment in self.segments {
            match segment {
                Segment::Text(text) => body.extend_from_slice(text.as_bytes()),
                Segment::Bytes(bytes) => body.extend_from_slice(&bytes),
            }
        }

        EncodedMultipart {
            boundary: self.boundary,
            parts: self.parts,
            body,
        }
    }
}

/// A finished multipart body ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMultipart {
    /// Boundary token the body is framed with.
    pub boundary: String,
    /// Number of parts in the body.
    pub parts: usize,
    /// Complete body bytes.
    pub body: Vec<u8>,
}

impl EncodedMultipart {
    /// Returns the `Content-Type` header value for this body.
    #[must_use]
    pub fn content_type(&self) -> String {
        ContentType::multipart_form_data(self.boundary.as_str()).to_string()
    }

    /// Returns the body length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Returns `true` if the body has no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_empty_form_id_rejected() {
        assert!(matches!(
            MultipartBuilder::new("   "),
            Err(Error::EmptyFormId)
        ));
        assert!(matches!(MultipartBuilder::new(""), Err(Error::EmptyFormId)));
    }

    #[test]
    fn test_exact_framing() {
        let encoded = MultipartBuilder::with_boundary("contact", "XyZ")
            .unwrap()
            .text("email", "a@b.com")
            .file("resume", "cv.pdf", "application/pdf", b"%PDF".to_vec())
            .finish();

        let expected = concat!(
            "--XyZ\r\n",
            "Content-Disposition: form-data; name=\"formId\"\r\n",
            "\r\n",
            "contact\r\n",
            "--XyZ\r\n",
            "Content-Disposition: form-data; name=\"email\"\r\n",
            "\r\n",
            "a@b.com\r\n",
            "--XyZ\r\n",
            "Content-Disposition: form-data; name=\"resume\"; filename=\"cv.pdf\"\r\n",
            "Content-Type: application/pdf\r\n",
            "\r\n",
            "%PDF\r\n",
            "--XyZ--\r\n",
        );
        assert_eq!(String::from_utf8(encoded.body.clone()).unwrap(), expected);
        assert_eq!(encoded.parts, 3);
        assert_eq!(encoded.content_type(), "multipart/form-data; boundary=XyZ");
    }

    #[test]
    fn test_form_id_is_trimmed_and_first() {
        let builder = MultipartBuilder::with_boundary("  contact  ", "b").unwrap();
        assert_eq!(builder.part_count(), 1);
        assert_eq!(builder.segments()[1], Segment::Text("contact".to_string()));
    }

    #[test]
    fn test_binary_payload_preserved() {
        let payload: Vec<u8> = (0..=255).collect();
        let encoded = MultipartBuilder::with_boundary("f", "b")
            .unwrap()
            .file("blob", "all.bin", "application/octet-stream", payload.clone())
            .finish();
        assert!(contains(&encoded.body, &payload));
    }

    #[test]
    fn test_names_are_escaped() {
        let encoded = MultipartBuilder::with_boundary("f", "b")
            .unwrap()
            .file("up\"load", "evil\r\nX-Injected: 1.txt", "text/plain", b"x".to_vec())
            .finish();
        let text = String::from_utf8(encoded.body).unwrap();
        assert!(text.contains("name=\"up%22load\""));
        assert!(text.contains("filename=\"evil%0D%0AX-Injected: 1.txt\""));
        assert!(!text.contains("\r\nX-Injected"));
    }

    proptest! {
        #[test]
        fn prop_generated_boundary_absent_from_content(
            values in prop::collection::vec("[ -~]{0,40}", 0..6),
            payload in prop::collection::vec(any::<u8>(), 0..256),
        ) {
            let mut builder = MultipartBuilder::new("form").unwrap();
            for (i, value) in values.iter().enumerate() {
                builder = builder.text(&format!("field{i}"), value);
            }
            let boundary = builder.boundary().to_string();
            for value in &values {
                prop_assert!(!value.contains(&boundary));
            }
            prop_assert!(!contains(&payload, boundary.as_bytes()));

            let encoded = builder.file("f", "f.bin", "application/octet-stream", payload).finish();
            prop_assert_eq!(encoded.parts, values.len() + 2);
            let closing = format!("--{boundary}--\r\n");
            prop_assert!(encoded.body.ends_with(closing.as_bytes()));
        }
    }
}
