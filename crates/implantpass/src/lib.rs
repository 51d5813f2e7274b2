//! `implantpass` - An offline QR-code exchange format for surgical implant records
//!
//! This library encodes a patient's procedures and their implants into a
//! versioned JSON payload rendered as a QR code, and decodes scanned payloads
//! back, including the unversioned shapes written by older app releases.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod codec;
pub mod config;
pub mod dates;
pub mod error;
pub mod logging;
pub mod model;
pub mod sample;
pub mod scanner;

pub use codec::{decode, BarcodeImage, Decoded, Encoder, ParseFailure};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use model::{Implant, Procedure, Side};
pub use scanner::{Key, Scan, ScanBuffer};
