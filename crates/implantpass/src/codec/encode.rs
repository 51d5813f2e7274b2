//! Procedure encoder.
//!
//! The encoder favours availability over strictness: `encode_*` always hands
//! back a displayable image. If the payload cannot be serialized or rendered,
//! the result is a fallback code carrying a short error message, rendered at a
//! lower error-correction level, and [`BarcodeImage::is_fallback`] reports it.
//! The only failure surfaced to the caller is an empty collection.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, warn};

use super::envelope::{CollectionEnvelope, SingleEnvelope, DEFAULT_APP_NAME, QR_BYTE_CAPACITY};
use super::render::{render, BarcodeImage, RenderOptions};
use crate::config::Config;
use crate::dates::normalize_date;
use crate::error::{Error, Result};
use crate::model::Procedure;

/// Message carried by the fallback code.
pub(crate) const DEFAULT_FALLBACK_MESSAGE: &str = "Error generating QR code";

/// Copy `procedure` with every date in wire form.
///
/// An empty implant date is dropped rather than written as `""`.
#[must_use]
pub fn normalize_procedure(procedure: &Procedure) -> Procedure {
    let mut normalized = procedure.clone();
    normalized.date = normalize_date(&procedure.date);
    for implant in &mut normalized.implants {
        implant.implant_date = implant
            .implant_date
            .take()
            .filter(|date| !date.is_empty())
            .map(|date| normalize_date(&date));
    }
    normalized
}

/// Builds QR codes from procedure records.
///
/// An `Encoder` is immutable once built and can be shared freely between
/// threads.
#[derive(Debug, Clone)]
pub struct Encoder {
    single: RenderOptions,
    collection: RenderOptions,
    fallback: RenderOptions,
    app_name: String,
    fallback_message: String,
    max_payload_bytes: usize,
}

impl Default for Encoder {
    fn default() -> Self {
        Self {
            single: RenderOptions::single(),
            collection: RenderOptions::collection(),
            fallback: RenderOptions::fallback(),
            app_name: DEFAULT_APP_NAME.to_string(),
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
            max_payload_bytes: QR_BYTE_CAPACITY,
        }
    }
}

impl Encoder {
    /// Create an encoder with default render options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an encoder from loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            single: config.render.single.clone(),
            collection: config.render.collection.clone(),
            fallback: config.render.fallback.clone(),
            app_name: config.codec.app_name.clone(),
            fallback_message: config.codec.fallback_message.clone(),
            max_payload_bytes: config.codec.max_payload_bytes,
        }
    }

    /// Override the application tag written into collection envelopes.
    #[must_use]
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// Serialize one procedure into a single-procedure envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn single_payload(&self, procedure: &Procedure) -> Result<String> {
        let normalized = normalize_procedure(procedure);
        Ok(serde_json::to_string(&SingleEnvelope::new(&normalized))?)
    }

    /// Serialize procedures into a collection envelope stamped with the
    /// current time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyInput`] if `procedures` is empty, or an error if
    /// JSON serialization fails.
    pub fn collection_payload(&self, procedures: &[Procedure]) -> Result<String> {
        self.collection_payload_at(procedures, Utc::now())
    }

    /// Serialize procedures into a collection envelope stamped with
    /// `generated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyInput`] if `procedures` is empty, or an error if
    /// JSON serialization fails.
    pub fn collection_payload_at(
        &self,
        procedures: &[Procedure],
        generated_at: DateTime<Utc>,
    ) -> Result<String> {
        if procedures.is_empty() {
            return Err(Error::EmptyInput);
        }
        let normalized: Vec<Procedure> = procedures.iter().map(normalize_procedure).collect();
        let envelope = CollectionEnvelope::new(
            &normalized,
            generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            &self.app_name,
        );
        Ok(serde_json::to_string(&envelope)?)
    }

    /// Encode one procedure as a QR code.
    ///
    /// Never fails: see the module docs for the fallback behaviour.
    #[must_use]
    pub fn encode_single(&self, procedure: &Procedure) -> BarcodeImage {
        debug!(id = %procedure.id, implants = procedure.implants.len(), "Encoding procedure");
        let payload = self.single_payload(procedure);
        self.render_or_fallback(payload, &self.single)
    }

    /// Encode procedures as one QR code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyInput`] if `procedures` is empty. Any other
    /// failure yields a fallback image rather than an error.
    pub fn encode_collection(&self, procedures: &[Procedure]) -> Result<BarcodeImage> {
        self.encode_collection_at(procedures, Utc::now())
    }

    /// Encode procedures as one QR code stamped with `generated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyInput`] if `procedures` is empty.
    pub fn encode_collection_at(
        &self,
        procedures: &[Procedure],
        generated_at: DateTime<Utc>,
    ) -> Result<BarcodeImage> {
        debug!(count = procedures.len(), "Encoding procedure collection");
        let payload = match self.collection_payload_at(procedures, generated_at) {
            Err(Error::EmptyInput) => return Err(Error::EmptyInput),
            other => other,
        };
        Ok(self.render_or_fallback(payload, &self.collection))
    }

    /// The image returned when encoding fails.
    #[must_use]
    pub fn fallback_image(&self) -> BarcodeImage {
        match render(&self.fallback_message, &self.fallback) {
            Ok(image) => image.into_fallback(),
            Err(e) => {
                warn!(error = %e, "Failed to render fallback QR code, returning blank image");
                BarcodeImage::blank(self.fallback.width, self.fallback_message.clone())
            }
        }
    }

    fn render_or_fallback(&self, payload: Result<String>, options: &RenderOptions) -> BarcodeImage {
        let rendered = payload
            .and_then(|payload| self.check_size(payload))
            .and_then(|payload| render(&payload, options));
        match rendered {
            Ok(image) => {
                debug!(
                    bytes = image.payload().len(),
                    width = image.width(),
                    ec_level = %image.ec_level(),
                    "Rendered QR code"
                );
                image
            }
            Err(e) => {
                warn!(error = %e, "Error generating QR code, returning fallback image");
                self.fallback_image()
            }
        }
    }

    fn check_size(&self, payload: String) -> Result<String> {
        if payload.len() > self.max_payload_bytes {
            return Err(Error::rendering(format!(
                "payload of {} bytes exceeds limit of {} bytes",
                payload.len(),
                self.max_payload_bytes
            )));
        }
        Ok(payload)
    }
}
