//! Submission accumulation and completion tracking.
//!
//! The accumulator consumes [`PartEvent`]s and decides when the submission
//! is complete. Two counters drive the decision: `opened` counts file streams
//! with a usable filename and `drained` counts those that reached their end
//! (whether or not they produced a [`FilePart`]). The submission is ready
//! once the parser has finished *and* `drained == opened`.
//!
//! Readiness is re-checked after every event, so it does not matter whether
//! the parser finishes before or after the last file stream drains.

use crate::config::{RelayConfig, ReservedFields};
use crate::error::{Error, Result};
use crate::submission::{FilePart, Submission};
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Identifies one file stream within a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub usize);

/// Event produced while reading an inbound multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartEvent {
    /// A complete text field.
    Field {
        /// Field name.
        name: String,
        /// Field value.
        value: String,
    },
    /// A file stream was opened.
    FileOpened {
        /// Stream identifier.
        id: FileId,
        /// Form field the file belongs to.
        field_name: String,
        /// Client-supplied filename.
        filename: String,
        /// MIME type of the payload.
        mime_type: String,
    },
    /// Bytes read from a file stream.
    FileChunk {
        /// Stream identifier.
        id: FileId,
        /// Chunk contents.
        chunk: Bytes,
    },
    /// A file stream reached its end.
    FileEnded {
        /// Stream identifier.
        id: FileId,
    },
    /// A file stream failed; the file is dropped.
    FileFailed {
        /// Stream identifier.
        id: FileId,
        /// What went wrong.
        reason: String,
    },
    /// The parser has delivered every part.
    Finished,
}

/// Whether the submission may be forwarded yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Waiting on the parser or on open file streams.
    Pending,
    /// Parser finished and every opened file stream drained.
    Ready,
}

#[derive(Debug)]
struct OpenFile {
    field_name: String,
    filename: String,
    mime_type: String,
    buffer: BytesMut,
    discarded: bool,
}

/// Builds one [`Submission`] from a stream of [`PartEvent`]s.
#[derive(Debug)]
pub struct Accumulator {
    reserved: ReservedFields,
    max_file_bytes: usize,
    debug: bool,
    submission: Submission,
    open: HashMap<FileId, OpenFile>,
    opened: usize,
    drained: usize,
    parser_finished: bool,
    honeypot_tripped: bool,
}

impl Accumulator {
    /// Creates an accumulator.
    #[must_use]
    pub fn new(reserved: ReservedFields, max_file_bytes: usize) -> Self {
        Self {
            reserved,
            max_file_bytes,
            debug: false,
            submission: Submission::new(),
            open: HashMap::new(),
            opened: 0,
            drained: 0,
            parser_finished: false,
            honeypot_tripped: false,
        }
    }

    /// Creates an accumulator from relay settings.
    #[must_use]
    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.reserved.clone(), config.limits.max_file_bytes).with_debug(config.debug)
    }

    /// Enables verbose per-file diagnostics.
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Number of file streams opened with a usable filename.
    #[must_use]
    pub const fn opened(&self) -> usize {
        self.opened
    }

    /// Number of opened file streams that reached their end.
    #[must_use]
    pub const fn drained(&self) -> usize {
        self.drained
    }

    /// Whether the honeypot field carried a value.
    #[must_use]
    pub const fn honeypot_tripped(&self) -> bool {
        self.honeypot_tripped
    }

    /// Current readiness.
    #[must_use]
    pub const fn progress(&self) -> Progress {
        if self.parser_finished && self.drained == self.opened {
            Progress::Ready
        } else {
            Progress::Pending
        }
    }

    /// Applies one event and re-evaluates readiness.
    pub fn apply(&mut self, event: PartEvent) -> Progress {
        match event {
            PartEvent::Field { name, value } => self.on_field(name, value),
            PartEvent::FileOpened {
                id,
                field_name,
                filename,
                mime_type,
            } => self.on_file_opened(id, field_name, filename, mime_type),
            PartEvent::FileChunk { id, chunk } => self.on_chunk(id, &chunk),
            PartEvent::FileEnded { id } => self.on_file_ended(id),
            PartEvent::FileFailed { id, reason } => self.on_file_failed(id, reason),
            PartEvent::Finished => {
                self.parser_finished = true;
                if self.debug {
                    debug!(
                        opened = self.opened,
                        drained = self.drained,
                        "parser finished"
                    );
                }
            }
        }
        self.progress()
    }

    fn on_field(&mut self, name: String, value: String) {
        if self.reserved.is_reserved(&name) {
            if self.reserved.trips_honeypot(&name, &value) {
                self.honeypot_tripped = true;
                info!(field = %name, "honeypot field filled");
            }
            return;
        }
        self.submission.upsert_field(name, value);
    }

    fn on_file_opened(
        &mut self,
        id: FileId,
        field_name: String,
        filename: String,
        mime_type: String,
    ) {
        if filename.trim().is_empty() {
            return;
        }
        if self.open.contains_key(&id) {
            warn!(?id, "file stream opened twice, ignoring");
            return;
        }

        let discarded = self.reserved.is_reserved(&field_name);
        self.opened += 1;
        self.open.insert(
            id,
            OpenFile {
                field_name,
                filename,
                mime_type,
                buffer: BytesMut::new(),
                discarded,
            },
        );
    }

    fn on_chunk(&mut self, id: FileId, chunk: &[u8]) {
        let Some(file) = self.open.get_mut(&id) else {
            return;
        };
        if file.discarded {
            return;
        }

        if file.buffer.len() + chunk.len() > self.max_file_bytes {
            let err = Error::FileStream {
                field: file.field_name.clone(),
                reason: format!("file exceeds {} bytes", self.max_file_bytes),
            };
            warn!(filename = %file.filename, "{err}");
            file.discarded = true;
            file.buffer = BytesMut::new();
            return;
        }

        file.buffer.extend_from_slice(chunk);
    }

    fn on_file_ended(&mut self, id: FileId) {
        let Some(file) = self.open.remove(&id) else {
            return;
        };
        self.drained += 1;

        if file.discarded {
            return;
        }
        if file.buffer.is_empty() {
            if self.debug {
                debug!(
                    field = %file.field_name,
                    filename = %file.filename,
                    "discarding empty file"
                );
            }
            return;
        }

        let part = FilePart::new(
            file.field_name,
            file.filename,
            file.mime_type,
            file.buffer.freeze(),
        );
        if self.debug {
            debug!(
                field = %part.field_name,
                filename = %part.filename,
                size = part.size,
                "file buffered"
            );
        }
        self.submission.push_file(part);
    }

    fn on_file_failed(&mut self, id: FileId, reason: String) {
        let Some(file) = self.open.remove(&id) else {
            return;
        };
        self.drained += 1;

        let err = Error::FileStream {
            field: file.field_name,
            reason,
        };
        warn!(filename = %file.filename, "{err}");
    }

    /// Returns the completed submission.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the submission is not ready yet.
    pub fn into_submission(self) -> Result<Submission> {
        if self.progress() == Progress::Pending {
            return Err(Error::Parse(format!(
                "submission incomplete: parser finished = {}, {} of {} file streams drained",
                self.parser_finished, self.drained, self.opened
            )));
        }
        Ok(self.submission)
    }
}
