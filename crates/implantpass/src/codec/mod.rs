//! QR-code procedure codec.
//!
//! This module turns procedure records into QR payloads and back:
//!
//! - **Envelope**: the versioned JSON wrapper carried by every current
//!   payload. A single-procedure envelope carries one [`Procedure`]; a
//!   collection envelope carries many, plus a count and generation timestamp.
//!
//! - **Encoding**: [`Encoder`] normalizes dates, builds the envelope and
//!   renders it as a QR image. It never fails to produce an image: when
//!   serialization or rendering fails, a fallback image carrying a short error
//!   message is returned instead, so a caller always has something to display.
//!
//! - **Decoding**: [`decode`] accepts raw scanned text and recognizes the
//!   current envelope as well as the older unversioned shapes (a bare
//!   procedure object or a bare array of procedures). Failures are reported as
//!   a [`ParseFailure`], never as a panic.
//!
//! # Example
//!
//! ```
//! use implantpass::codec::{decode, Decoded, Encoder};
//! use implantpass::{Implant, Procedure};
//!
//! let procedure = Procedure::new("p1", "2023-05-15", "Dr. A", "H", "Hip")
//!     .with_implant(Implant::new("i1", "Cup", "Zimmer", "A1", "L1", "Hip Stem"));
//!
//! let encoder = Encoder::new();
//! let image = encoder.encode_single(&procedure);
//! assert!(!image.is_fallback());
//!
//! match decode(image.payload()) {
//!     Ok(Decoded::Single { procedure, .. }) => assert_eq!(procedure.date, "15.05.2023"),
//!     other => panic!("unexpected decode result: {other:?}"),
//! }
//! ```
//!
//! [`Procedure`]: crate::Procedure

mod decode;
mod encode;
mod envelope;
mod lenient;
mod render;

pub use decode::{
    decode, procedures_from_json, Decoded, ParseFailure, ParseFailureKind, ProcedureCollection,
};
pub(crate) use encode::DEFAULT_FALLBACK_MESSAGE;
pub use encode::{normalize_procedure, Encoder};
pub use envelope::{
    EnvelopeKind, COLLECTION_TYPE, DEFAULT_APP_NAME, FORMAT_VERSION, QR_BYTE_CAPACITY,
};
pub use render::{render, BarcodeImage, ErrorCorrection, RenderOptions};
