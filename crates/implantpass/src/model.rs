//! Core record types for implantpass.
//!
//! A [`Procedure`] is one surgical event; it owns the ordered list of
//! [`Implant`]s placed during that event. Both serialize with the camelCase
//! field names used on the wire.

use serde::{Deserialize, Serialize};

/// Number of hex characters kept from a derived id hash.
const DERIVED_ID_HEX_LEN: usize = 12;

/// Which side of the body a procedure was performed on.
///
/// Spellings other than the known ones are preserved verbatim so that a
/// decode/encode cycle never loses what the patient typed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Side {
    /// Left side.
    Left,
    /// Right side.
    Right,
    /// Laterality does not apply (e.g. spine, heart).
    NotApplicable,
    /// Any other free-text value.
    Other(String),
}

impl From<String> for Side {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Self::Left,
            "right" | "r" => Self::Right,
            "" | "n/a" | "na" | "not applicable" | "not-applicable" => Self::NotApplicable,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for Side {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Side> for String {
    fn from(side: Side) -> Self {
        match side {
            Side::Left => "Left".to_string(),
            Side::Right => "Right".to_string(),
            Side::NotApplicable => String::new(),
            Side::Other(value) => value,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Left => write!(f, "Left"),
            Self::Right => write!(f, "Right"),
            Self::NotApplicable => write!(f, "N/A"),
            Self::Other(value) => write!(f, "{value}"),
        }
    }
}

/// One implanted device or component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Implant {
    /// Identifier, unique within the owning procedure.
    pub id: String,
    /// Product name, e.g. "Acetabular Cup".
    pub name: String,
    /// Manufacturer name.
    pub manufacturer: String,
    /// Manufacturer article (catalogue) number.
    pub article_number: String,
    /// Lot number. Older payloads call this `serialNumber`.
    pub lot_number: String,
    /// Implant type or material. Serialized as `type`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Anatomical location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Free-text notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Date the implant was placed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implant_date: Option<String>,
}

impl Implant {
    /// Create an implant with its required fields.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        manufacturer: impl Into<String>,
        article_number: impl Into<String>,
        lot_number: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            manufacturer: manufacturer.into(),
            article_number: article_number.into(),
            lot_number: lot_number.into(),
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// Set the implant date.
    #[must_use]
    pub fn with_implant_date(mut self, date: impl Into<String>) -> Self {
        self.implant_date = Some(date.into());
        self
    }

    /// Set the notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Set the anatomical location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Derive a stable id for an implant that arrived without one.
    ///
    /// The id depends only on the owning procedure, the implant's position
    /// and its identifying fields, so importing the same payload twice yields
    /// the same ids.
    #[must_use]
    pub fn derive_id(&self, procedure_id: &str, index: usize) -> String {
        derived_id(
            "imp",
            &[
                procedure_id,
                &index.to_string(),
                &self.name,
                &self.manufacturer,
                &self.article_number,
                &self.lot_number,
            ],
        )
    }
}

/// One surgical event and the implants placed during it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Procedure {
    /// Identifier, unique across the patient's records.
    pub id: String,
    /// Date of the procedure (`YYYY-MM-DD` or `DD.MM.YYYY`).
    pub date: String,
    /// Operating surgeon.
    pub surgeon: String,
    /// Hospital or clinic.
    pub hospital: String,
    /// Kind of procedure, e.g. "Total Hip Replacement".
    pub procedure_type: String,
    /// Anatomical location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Side of the body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    /// Free-text notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Implants in entry order.
    pub implants: Vec<Implant>,
}

impl Procedure {
    /// Create a procedure with its required fields and no implants.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        date: impl Into<String>,
        surgeon: impl Into<String>,
        hospital: impl Into<String>,
        procedure_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            date: date.into(),
            surgeon: surgeon.into(),
            hospital: hospital.into(),
            procedure_type: procedure_type.into(),
            ..Self::default()
        }
    }

    /// Append an implant.
    #[must_use]
    pub fn with_implant(mut self, implant: Implant) -> Self {
        self.implants.push(implant);
        self
    }

    /// Set the side.
    #[must_use]
    pub fn with_side(mut self, side: Side) -> Self {
        self.side = Some(side);
        self
    }

    /// Set the anatomical location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Number of implants.
    #[must_use]
    pub fn implant_count(&self) -> usize {
        self.implants.len()
    }

    /// Derive a stable id for a procedure that arrived without one.
    #[must_use]
    pub fn derive_id(&self) -> String {
        derived_id(
            "proc",
            &[
                &self.date,
                &self.surgeon,
                &self.hospital,
                &self.procedure_type,
            ],
        )
    }

    /// Fill this procedure from a scanned one.
    ///
    /// Non-empty scanned values replace the current ones; empty scanned values
    /// leave the current ones alone. A non-empty scanned implant list replaces
    /// the current list wholesale. The id is never touched.
    pub fn merge_missing_from(&mut self, scanned: &Procedure) {
        take_non_empty(&mut self.date, &scanned.date);
        take_non_empty(&mut self.surgeon, &scanned.surgeon);
        take_non_empty(&mut self.hospital, &scanned.hospital);
        take_non_empty(&mut self.procedure_type, &scanned.procedure_type);
        take_non_empty_opt(&mut self.location, scanned.location.as_ref());
        take_non_empty_opt(&mut self.notes, scanned.notes.as_ref());
        if let Some(side) = &scanned.side {
            if *side != Side::NotApplicable {
                self.side = Some(side.clone());
            }
        }
        if !scanned.implants.is_empty() {
            self.implants.clone_from(&scanned.implants);
        }
    }
}

fn take_non_empty(target: &mut String, scanned: &str) {
    if !scanned.is_empty() {
        scanned.clone_into(target);
    }
}

fn take_non_empty_opt(target: &mut Option<String>, scanned: Option<&String>) {
    if let Some(value) = scanned.filter(|v| !v.is_empty()) {
        *target = Some(value.clone());
    }
}

fn derived_id(prefix: &str, parts: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part.as_bytes());
        // Separator so ("ab", "c") and ("a", "bc") hash differently.
        hasher.update(&[0x1f]);
    }
    let hex = hasher.finalize().to_hex();
    format!("{prefix}-{}", &hex.as_str()[..DERIVED_ID_HEX_LEN])
}
