//! Inbound `multipart/form-data` parsing.
//!
//! Wraps [`multer`] and turns its fields into [`PartEvent`]s for an
//! [`Accumulator`]. File parts are read chunk by chunk; parts with a blank
//! filename ("no file chosen") are drained without buffering and never
//! reach the accumulator.

use crate::accumulator::{Accumulator, FileId, PartEvent, Progress};
use crate::error::{Error, Result};
use bytes::Bytes;
use formrelay_mime::ContentType;
use std::convert::Infallible;
use tracing::{debug, warn};

/// Streaming parser over one fully received multipart body.
pub struct MultipartParser {
    multipart: multer::Multipart<'static>,
    next_file: usize,
    debug: bool,
}

impl std::fmt::Debug for MultipartParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipartParser")
            .field("next_file", &self.next_file)
            .finish_non_exhaustive()
    }
}

impl MultipartParser {
    /// Prepares a parser for `body` using the boundary in `content_type`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the content type carries no usable boundary.
    pub fn new(body: impl Into<Bytes>, content_type: &str) -> Result<Self> {
        let boundary = multer::parse_boundary(content_type)
            .map_err(|e| Error::Parse(format!("invalid boundary: {e}")))?;

        let body = body.into();
        let stream = futures_util::stream::once(async move { Ok::<Bytes, Infallible>(body) });

        Ok(Self {
            multipart: multer::Multipart::new(stream, boundary),
            next_file: 0,
            debug: false,
        })
    }

    /// Enables verbose per-part diagnostics.
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Reads every part into `accumulator`, ending with [`PartEvent::Finished`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] on a malformed or truncated body. Errors
    /// confined to a single file part are reported to the accumulator as
    /// [`PartEvent::FileFailed`] instead.
    pub async fn drain_into(mut self, accumulator: &mut Accumulator) -> Result<Progress> {
        while let Some(mut field) = self
            .multipart
            .next_field()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                warn!("skipping multipart part without a name");
                discard(&mut field).await?;
                continue;
            };

            let Some(filename) = field.file_name().map(str::to_string) else {
                let value = field.text().await.map_err(|e| Error::Parse(e.to_string()))?;
                if self.debug {
                    debug!(field = %name, len = value.len(), "text field");
                }
                accumulator.apply(PartEvent::Field { name, value });
                continue;
            };

            if filename.trim().is_empty() {
                if self.debug {
                    debug!(field = %name, "no file chosen, draining");
                }
                discard(&mut field).await?;
                continue;
            }

            let id = FileId(self.next_file);
            self.next_file += 1;
            let mime_type = field
                .content_type()
                .map_or_else(|| ContentType::octet_stream().to_string(), ToString::to_string);

            accumulator.apply(PartEvent::FileOpened {
                id,
                field_name: name,
                filename,
                mime_type,
            });

            loop {
                match field.chunk().await {
                    Ok(Some(chunk)) => {
                        accumulator.apply(PartEvent::FileChunk { id, chunk });
                    }
                    Ok(None) => {
                        accumulator.apply(PartEvent::FileEnded { id });
                        break;
                    }
                    Err(e) => {
                        let body_level = is_body_error(&e);
                        accumulator.apply(PartEvent::FileFailed {
                            id,
                            reason: e.to_string(),
                        });
                        if body_level {
                            return Err(Error::Parse(e.to_string()));
                        }
                        break;
                    }
                }
            }
        }

        Ok(accumulator.apply(PartEvent::Finished))
    }
}

/// Errors that mean the body itself is broken, not just one file.
const fn is_body_error(e: &multer::Error) -> bool {
    matches!(
        e,
        multer::Error::IncompleteFieldData { .. }
            | multer::Error::IncompleteStream
            | multer::Error::StreamReadFailed(_)
    )
}

async fn discard(field: &mut multer::Field<'static>) -> Result<()> {
    loop {
        match field.chunk().await {
            Ok(Some(_)) => {}
            Ok(None) => return Ok(()),
            Err(e) if is_body_error(&e) => return Err(Error::Parse(e.to_string())),
            Err(e) => {
                warn!("error draining unused part: {e}");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ReservedFields;

    const BOUNDARY: &str = "----TestBoundary7MA4YWxk";

    fn content_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    fn text_part(name: &str, value: &str) -> Vec<u8> {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
        .into_bytes()
    }

    fn file_part(name: &str, filename: &str, mime: &str, payload: &[u8]) -> Vec<u8> {
        let mut part = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {mime}\r\n\r\n"
        )
        .into_bytes();
        part.extend_from_slice(payload);
        part.extend_from_slice(b"\r\n");
        part
    }

    fn closing() -> Vec<u8> {
        format!("--{BOUNDARY}--\r\n").into_bytes()
    }

    async fn parse(body: Vec<u8>) -> Result<(Progress, Accumulator)> {
        let mut acc = Accumulator::new(ReservedFields::default(), 1024 * 1024);
        let parser = MultipartParser::new(body, &content_type())?;
        let progress = parser.drain_into(&mut acc).await?;
        Ok((progress, acc))
    }

    #[tokio::test]
    async fn test_fields_and_file() {
        let payload = [0u8, 1, 2, 255, b'\r', b'\n', 10, 13, 0, 7];
        let mut body = text_part("email", "a@b.com");
        body.extend(file_part("resume", "resume.pdf", "application/pdf", &payload));
        body.extend(closing());

        let (progress, acc) = parse(body).await.unwrap();
        assert_eq!(progress, Progress::Ready);
        assert_eq!(acc.opened(), 1);

        let submission = acc.into_submission().unwrap();
        assert_eq!(submission.field("email"), Some("a@b.com"));
        let file = &submission.files()[0];
        assert_eq!(file.field_name, "resume");
        assert_eq!(file.filename, "resume.pdf");
        assert_eq!(file.mime_type, "application/pdf");
        assert_eq!(&file.payload[..], payload);
        assert_eq!(file.size, 10);
    }

    #[tokio::test]
    async fn test_no_file_chosen_is_skipped() {
        let mut body = text_part("name", "Ann");
        body.extend(file_part("attachment", "", "application/octet-stream", b""));
        body.extend(closing());

        let (progress, acc) = parse(body).await.unwrap();
        assert_eq!(progress, Progress::Ready);
        assert_eq!(acc.opened(), 0);
        assert!(acc.into_submission().unwrap().files().is_empty());
    }

    #[tokio::test]
    async fn test_blank_filename_is_skipped() {
        let mut body = file_part("attachment", "   ", "text/plain", b"ignored");
        body.extend(text_part("name", "Ann"));
        body.extend(closing());

        let (progress, acc) = parse(body).await.unwrap();
        assert_eq!(progress, Progress::Ready);
        assert_eq!(acc.opened(), 0);
        let submission = acc.into_submission().unwrap();
        assert!(submission.files().is_empty());
        assert_eq!(submission.field("name"), Some("Ann"));
    }

    #[tokio::test]
    async fn test_zero_byte_file_dropped() {
        let mut body = file_part("attachment", "empty.txt", "text/plain", b"");
        body.extend(closing());

        let (_, acc) = parse(body).await.unwrap();
        assert_eq!(acc.opened(), 1);
        assert_eq!(acc.drained(), 1);
        assert!(acc.into_submission().unwrap().files().is_empty());
    }

    #[tokio::test]
    async fn test_missing_content_type_defaults() {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"doc\"; filename=\"a.bin\"\r\n\r\nxyz\r\n"
        )
        .into_bytes();
        body.extend(closing());

        let (_, acc) = parse(body).await.unwrap();
        let submission = acc.into_submission().unwrap();
        assert_eq!(submission.files()[0].mime_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn test_truncated_body_is_parse_error() {
        let mut body = text_part("name", "Ann");
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"doc\"; filename=\"a.bin\"\r\n\r\npartial")
                .as_bytes(),
        );

        let err = parse(body).await.unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_missing_boundary() {
        let err = MultipartParser::new(Vec::new(), "multipart/form-data").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
