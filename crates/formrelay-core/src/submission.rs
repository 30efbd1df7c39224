//! In-memory representation of one form post.

use bytes::Bytes;

/// A text field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field name.
    pub name: String,
    /// Field value.
    pub value: String,
}

/// A fully buffered, non-empty file upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field the file was attached to.
    pub field_name: String,
    /// Client-supplied filename.
    pub filename: String,
    /// MIME type of the payload.
    pub mime_type: String,
    /// Raw bytes.
    pub payload: Bytes,
    /// Payload length in bytes.
    pub size: usize,
}

impl FilePart {
    /// Creates a file part; `size` is taken from the payload.
    #[must_use]
    pub fn new(
        field_name: impl Into<String>,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        payload: Bytes,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            filename: filename.into(),
            mime_type: mime_type.into(),
            size: payload.len(),
            payload,
        }
    }
}

/// Fields and files of one submission.
///
/// Fields keep the position where their name was first seen; a repeated name
/// overwrites the earlier value. Files keep completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    fields: Vec<Field>,
    files: Vec<FilePart>,
}

impl Submission {
    /// Creates an empty submission.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field, replacing the value of an existing one.
    pub fn upsert_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(existing) = self.fields.iter_mut().find(|f| f.name == name) {
            existing.value = value;
        } else {
            self.fields.push(Field { name, value });
        }
    }

    /// Appends a completed file.
    pub fn push_file(&mut self, file: FilePart) {
        self.files.push(file);
    }

    /// Fields in first-seen order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Files in completion order.
    #[must_use]
    pub fn files(&self) -> &[FilePart] {
        &self.files
    }

    /// Looks up a field value by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    /// Returns `true` if there are no fields and no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.files.is_empty()
    }

    /// Total bytes held in file payloads.
    #[must_use]
    pub fn file_bytes(&self) -> usize {
        self.files.iter().map(|f| f.size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins_keeps_position() {
        let mut submission = Submission::new();
        submission.upsert_field("name", "Ann");
        submission.upsert_field("email", "a@b.com");
        submission.upsert_field("name", "Bob");

        let names: Vec<&str> = submission.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["name", "email"]);
        assert_eq!(submission.field("name"), Some("Bob"));
    }

    #[test]
    fn test_file_size_from_payload() {
        let file = FilePart::new(
            "resume",
            "cv.pdf",
            "application/pdf",
            Bytes::from_static(b"0123456789"),
        );
        assert_eq!(file.size, 10);

        let mut submission = Submission::new();
        assert!(submission.is_empty());
        submission.push_file(file);
        assert_eq!(submission.file_bytes(), 10);
        assert!(!submission.is_empty());
    }
}
