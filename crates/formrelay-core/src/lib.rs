//! # formrelay-core
//!
//! Ingests form submissions (JSON or `multipart/form-data`), strips control
//! fields, re-encodes them for the downstream mailer API and normalizes the
//! answer.
//!
//! This crate provides:
//! - Configuration and validation
//! - Multipart parsing on top of `multer`
//! - Submission accumulation with file completion tracking
//! - Multipart re-encoding and forwarding over `reqwest`
//! - Request routing and response normalization
//!
//! ## Example
//!
//! ```ignore
//! use formrelay_core::{InboundRequest, Relay, RelayConfig};
//!
//! let relay = Relay::new(RelayConfig::new("https://mailer.example.com", "contact", "key"));
//! let request = InboundRequest::new("POST")
//!     .with_header("content-type", "application/json")
//!     .with_body(r#"{"name":"Ann","message":"hi"}"#);
//! let response = relay.handle(request).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod accumulator;
pub mod config;
mod error;
pub mod forward;
pub mod parse;
pub mod pipeline;
mod relay;
pub mod request;
pub mod response;
pub mod submission;

pub use accumulator::{Accumulator, FileId, PartEvent, Progress};
pub use config::{ConfigIssue, Limits, RelayConfig, ReservedFields};
pub use error::{Error, Result};
pub use forward::{Forwarder, OutboundEnvelope, encode_submission, normalize_response};
pub use parse::MultipartParser;
pub use pipeline::{Pipeline, Stage};
pub use relay::Relay;
pub use request::InboundRequest;
pub use response::{NormalizedResult, OutboundResponse, ResponseEnvelope};
pub use submission::{Field, FilePart, Submission};
