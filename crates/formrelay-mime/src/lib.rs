//! # formrelay-mime
//!
//! Content type handling and `multipart/form-data` generation for formrelay.
//!
//! ## Features
//!
//! - **Content types**: Parse and format `type/subtype; key=value` headers
//! - **Boundaries**: Fresh boundary tokens per outbound body
//! - **Multipart encoding**: Byte-exact `multipart/form-data` bodies with
//!   binary-safe file parts
//! - **Body decoding**: Base64 transport decoding for inbound payloads
//!
//! ## Quick Start
//!
//! ### Building a Form Body
//!
//! ```ignore
//! use formrelay_mime::MultipartBuilder;
//!
//! let encoded = MultipartBuilder::new("contact-form")?
//!     .text("email", "a@b.com")
//!     .file("resume", "resume.pdf", "application/pdf", pdf_bytes)
//!     .finish();
//!
//! println!("Content-Type: {}", encoded.content_type());
//! ```
//!
//! ### Parsing Content Types
//!
//! ```ignore
//! use formrelay_mime::ContentType;
//!
//! let ct = ContentType::parse("multipart/form-data; boundary=abc")?;
//! assert!(ct.is_form_data());
//! assert_eq!(ct.boundary(), Some("abc"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod boundary;
mod content_type;
mod error;
mod multipart;

pub mod encoding;

pub use boundary::generate_boundary;
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use multipart::{EncodedMultipart, FORM_ID_FIELD, MultipartBuilder, Segment};
