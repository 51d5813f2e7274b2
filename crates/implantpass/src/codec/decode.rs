//! Payload decoder.
//!
//! [`decode`] accepts whatever text a scanner produced. Recognition order:
//!
//! 1. Text that is not JSON is [`ParseFailure::Malformed`].
//! 2. A versioned envelope yields its collection or its single procedure.
//! 3. Without version markers, a bare array is a legacy collection and an
//!    object with `id` and `date` is a legacy single procedure.
//! 4. Anything else is [`ParseFailure::UnknownFormat`].

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::envelope::{CollectionMeta, Envelope, EnvelopeKind, FORMAT_VERSION};
use super::lenient::{has_procedure_fields, procedure_from_value, procedures_from_values};
use crate::model::Procedure;

/// Why a payload could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    /// The text is not valid JSON.
    #[error("payload is not valid JSON: {message}")]
    Malformed {
        /// Parser diagnostic.
        message: String,
    },

    /// The JSON matches no known payload shape.
    #[error("payload matches no known format (unknown format)")]
    UnknownFormat,
}

/// The category of a [`ParseFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseFailureKind {
    /// See [`ParseFailure::Malformed`].
    Malformed,
    /// See [`ParseFailure::UnknownFormat`].
    UnknownFormat,
}

impl ParseFailure {
    /// The category of this failure.
    #[must_use]
    pub fn kind(&self) -> ParseFailureKind {
        match self {
            Self::Malformed { .. } => ParseFailureKind::Malformed,
            Self::UnknownFormat => ParseFailureKind::UnknownFormat,
        }
    }
}

/// Procedures recovered from a collection payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureCollection {
    /// Procedures in payload order.
    pub procedures: Vec<Procedure>,
    /// The `count` the encoder declared, if any.
    pub declared_count: Option<u64>,
    /// The `generatedAt` timestamp as written.
    pub generated_at: Option<String>,
    /// The `appName` tag.
    pub app_name: Option<String>,
    /// The `formatVersion`, or `None` for a legacy array.
    pub format_version: Option<String>,
}

impl ProcedureCollection {
    fn legacy(procedures: Vec<Procedure>) -> Self {
        Self {
            procedures,
            declared_count: None,
            generated_at: None,
            app_name: None,
            format_version: None,
        }
    }

    /// Number of recovered procedures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    /// Whether no procedures were recovered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }

    /// Whether the declared count agrees with what was recovered.
    ///
    /// Payloads without a declared count always agree.
    #[must_use]
    pub fn count_matches(&self) -> bool {
        match self.declared_count {
            Some(count) => usize::try_from(count).is_ok_and(|count| count == self.len()),
            None => true,
        }
    }

    /// The generation timestamp, if present and valid RFC 3339.
    #[must_use]
    pub fn generated_at_utc(&self) -> Option<DateTime<Utc>> {
        let text = self.generated_at.as_deref()?;
        DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|at| at.with_timezone(&Utc))
    }
}

/// A successfully decoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// One procedure.
    Single {
        /// The procedure.
        procedure: Procedure,
        /// The `formatVersion`, or `None` for a legacy object.
        format_version: Option<String>,
        /// Set when a legacy object matched only on `id` and `date` and has
        /// none of the other procedure fields.
        ambiguous: bool,
    },
    /// Many procedures.
    Collection(ProcedureCollection),
}

impl Decoded {
    /// The payload shape this value was decoded from.
    #[must_use]
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Self::Single {
                format_version: Some(_),
                ..
            } => EnvelopeKind::CurrentSingle,
            Self::Single { .. } => EnvelopeKind::LegacySingle,
            Self::Collection(collection) if collection.format_version.is_some() => {
                EnvelopeKind::CurrentCollection
            }
            Self::Collection(_) => EnvelopeKind::LegacyCollection,
        }
    }

    /// Whether the payload predates the versioned envelope.
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.kind().is_legacy()
    }

    /// Whether the legacy heuristic matched without corroborating fields.
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Single { ambiguous: true, .. })
    }

    /// Number of procedures carried.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Single { .. } => 1,
            Self::Collection(collection) => collection.len(),
        }
    }

    /// Whether no procedures are carried.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into procedures, in payload order.
    #[must_use]
    pub fn into_procedures(self) -> Vec<Procedure> {
        match self {
            Self::Single { procedure, .. } => vec![procedure],
            Self::Collection(collection) => collection.procedures,
        }
    }
}

/// Decode scanned or pasted payload text.
///
/// Never panics; every failure is returned as a [`ParseFailure`].
///
/// # Errors
///
/// Returns [`ParseFailure::Malformed`] if `raw` is not JSON and
/// [`ParseFailure::UnknownFormat`] if it matches no known payload shape.
pub fn decode(raw: &str) -> Result<Decoded, ParseFailure> {
    let text = raw.trim_start_matches('\u{feff}');
    let value: Value = serde_json::from_str(text).map_err(|e| {
        debug!(error = %e, "QR payload is not JSON");
        ParseFailure::Malformed {
            message: e.to_string(),
        }
    })?;

    let Some(envelope) = Envelope::discriminate(value) else {
        warn!("Unknown QR code data format");
        return Err(ParseFailure::UnknownFormat);
    };
    debug!(kind = %envelope.kind(), "Decoding QR payload");

    match envelope {
        Envelope::CurrentSingle {
            format_version,
            procedure,
        } => {
            check_version(&format_version);
            let Some(procedure) = procedure_from_value(&procedure) else {
                warn!("Envelope procedure field is not an object");
                return Err(ParseFailure::UnknownFormat);
            };
            Ok(Decoded::Single {
                procedure,
                format_version: Some(format_version),
                ambiguous: false,
            })
        }
        Envelope::CurrentCollection {
            format_version,
            meta,
            procedures,
        } => {
            check_version(&format_version);
            let CollectionMeta {
                declared_count,
                generated_at,
                app_name,
            } = meta;
            let collection = ProcedureCollection {
                procedures: procedures_from_values(&procedures),
                declared_count,
                generated_at,
                app_name,
                format_version: Some(format_version),
            };
            if !collection.count_matches() {
                warn!(
                    declared = ?collection.declared_count,
                    recovered = collection.len(),
                    "Procedure count does not match declared count"
                );
            }
            Ok(Decoded::Collection(collection))
        }
        Envelope::LegacySingle(object) => {
            let ambiguous = !has_procedure_fields(&object);
            if ambiguous {
                warn!("Legacy payload matched on id and date only, treating as procedure");
            }
            let procedure =
                procedure_from_value(&Value::Object(object)).ok_or(ParseFailure::UnknownFormat)?;
            Ok(Decoded::Single {
                procedure,
                format_version: None,
                ambiguous,
            })
        }
        Envelope::LegacyCollection(items) => Ok(Decoded::Collection(ProcedureCollection::legacy(
            procedures_from_values(&items),
        ))),
    }
}

/// Convert a procedure object or an array of them, as read from an input
/// file, with the same coercions the decoder applies.
///
/// Returns an empty list for any other JSON value.
#[must_use]
pub fn procedures_from_json(value: &Value) -> Vec<Procedure> {
    match value {
        Value::Array(items) => procedures_from_values(items),
        other => procedure_from_value(other).into_iter().collect(),
    }
}

fn check_version(format_version: &str) {
    if format_version != FORMAT_VERSION {
        warn!(
            version = %format_version,
            supported = FORMAT_VERSION,
            "Decoding payload with unsupported format version using current rules"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Encoder;
    use crate::dates::same_date;
    use crate::model::{Implant, Side};
    use proptest::prelude::*;
    use serde_json::json;

    fn scenario() -> Procedure {
        Procedure::new("p1", "2023-05-15", "Dr. A", "H", "Hip").with_implant(Implant::new(
            "i1", "Cup", "Zimmer", "A1", "L1", "Hip Stem",
        ))
    }

    fn assert_same_procedure(decoded: &Procedure, original: &Procedure) {
        assert_eq!(decoded.id, original.id);
        assert!(same_date(&decoded.date, &original.date));
        assert_eq!(decoded.surgeon, original.surgeon);
        assert_eq!(decoded.hospital, original.hospital);
        assert_eq!(decoded.procedure_type, original.procedure_type);
        assert_eq!(decoded.location, original.location);
        assert_eq!(decoded.side, original.side);
        assert_eq!(decoded.notes, original.notes);
        assert_eq!(decoded.implants.len(), original.implants.len());
        for (decoded, original) in decoded.implants.iter().zip(&original.implants) {
            let mut expected = original.clone();
            expected.implant_date = original.implant_date.as_deref().map(crate::dates::normalize_date);
            assert_eq!(decoded, &expected);
        }
    }

    #[test]
    fn test_scenario_round_trip() {
        let payload = Encoder::new().single_payload(&scenario()).unwrap();

        match decode(&payload).unwrap() {
            Decoded::Single {
                procedure,
                format_version,
                ambiguous,
            } => {
                assert_eq!(procedure.date, "15.05.2023");
                assert_eq!(procedure.implants, scenario().implants);
                assert_eq!(format_version.as_deref(), Some("1.0"));
                assert!(!ambiguous);
            }
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn test_collection_round_trip_preserves_order() {
        let procedures = vec![
            scenario(),
            Procedure::new("p2", "22.07.2023", "Dr. B", "City", "Knee").with_side(Side::Right),
            Procedure::new("p3", "2023-09-10", "Dr. C", "Uni", "Spine"),
        ];
        let payload = Encoder::new().collection_payload(&procedures).unwrap();

        let Decoded::Collection(collection) = decode(&payload).unwrap() else {
            panic!("expected a collection");
        };
        assert_eq!(collection.len(), 3);
        assert_eq!(collection.declared_count, Some(3));
        assert!(collection.count_matches());
        assert_eq!(collection.app_name.as_deref(), Some("Implant Pass"));
        assert!(collection.generated_at_utc().is_some());
        for (decoded, original) in collection.procedures.iter().zip(&procedures) {
            assert_same_procedure(decoded, original);
        }
    }

    #[test]
    fn test_decode_current_single_text() {
        let text = r#"{"formatVersion":"1.0","dateFormat":"DD.MM.YYYY","procedure":{"id":"p1","date":"15.05.2023","surgeon":"Dr. A","hospital":"H","procedureType":"Hip","implants":[]}}"#;
        let decoded = decode(text).unwrap();

        assert_eq!(decoded.kind(), EnvelopeKind::CurrentSingle);
        assert!(!decoded.is_legacy());
        assert_eq!(decoded.into_procedures()[0].id, "p1");
    }

    #[test]
    fn test_decode_legacy_array() {
        let text = r#"[{"id":"1","date":"2023-05-15","surgeon":"Dr. Jane Smith","implants":[{"id":"imp1","serialNumber":"TH-12345-A"}]},{"id":"2","date":"2023-07-22"}]"#;
        let decoded = decode(text).unwrap();

        assert_eq!(decoded.kind(), EnvelopeKind::LegacyCollection);
        assert!(decoded.is_legacy());
        let procedures = decoded.into_procedures();
        assert_eq!(procedures.len(), 2);
        assert_eq!(procedures[0].date, "15.05.2023");
        assert_eq!(procedures[0].implants[0].lot_number, "TH-12345-A");
        assert_eq!(procedures[1].id, "2");
    }

    #[test]
    fn test_decode_legacy_single() {
        let text = r#"{"id":"p1","date":"2023-05-15","surgeon":"Dr. A","implants":[]}"#;
        let decoded = decode(text).unwrap();

        assert_eq!(decoded.kind(), EnvelopeKind::LegacySingle);
        assert!(!decoded.is_ambiguous());
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn test_decode_flags_ambiguous_legacy_single() {
        let decoded = decode(r#"{"id":"order-7","date":"2024-01-01"}"#).unwrap();

        assert!(decoded.is_ambiguous());
        assert_eq!(decoded.into_procedures()[0].id, "order-7");
    }

    #[test]
    fn test_decode_malformed() {
        let failure = decode("not json at all").unwrap_err();
        assert_eq!(failure.kind(), ParseFailureKind::Malformed);

        assert_eq!(decode("").unwrap_err().kind(), ParseFailureKind::Malformed);
        assert_eq!(decode("{\"id\":").unwrap_err().kind(), ParseFailureKind::Malformed);
    }

    #[test]
    fn test_decode_unknown_format() {
        assert_eq!(decode(r#"{"foo":1}"#).unwrap_err(), ParseFailure::UnknownFormat);
        assert_eq!(decode("42").unwrap_err(), ParseFailure::UnknownFormat);
        assert_eq!(decode("null").unwrap_err(), ParseFailure::UnknownFormat);
        assert_eq!(decode(r#""text""#).unwrap_err(), ParseFailure::UnknownFormat);
    }

    #[test]
    fn test_decode_envelope_with_non_object_procedure() {
        let text = r#"{"formatVersion":"1.0","dateFormat":"DD.MM.YYYY","procedure":"p1"}"#;
        assert_eq!(decode(text).unwrap_err(), ParseFailure::UnknownFormat);
    }

    #[test]
    fn test_decode_count_mismatch_is_reported_not_fatal() {
        let text = json!({
            "formatVersion": "1.0",
            "dateFormat": "DD.MM.YYYY",
            "type": "allProcedures",
            "count": 3,
            "procedures": [{"id": "p1"}, 5]
        })
        .to_string();
        let Decoded::Collection(collection) = decode(&text).unwrap() else {
            panic!("expected a collection");
        };

        assert_eq!(collection.len(), 1);
        assert!(!collection.count_matches());
    }

    #[test]
    fn test_decode_unknown_version_uses_current_rules() {
        let text = r#"{"formatVersion":"2.0","dateFormat":"DD.MM.YYYY","procedure":{"id":"p1"}}"#;
        let Decoded::Single { format_version, .. } = decode(text).unwrap() else {
            panic!("expected a single procedure");
        };
        assert_eq!(format_version.as_deref(), Some("2.0"));
    }

    #[test]
    fn test_decode_tolerates_whitespace_and_bom() {
        let text = "\u{feff}  {\"id\":\"p1\",\"date\":\"2023-05-15\"}\n";
        assert!(decode(text).is_ok());
    }

    #[test]
    fn test_decode_folds_serial_number() {
        let text = r#"{"formatVersion":"1.0","dateFormat":"DD.MM.YYYY","procedure":{"id":"p1","implants":[{"id":"i1","serialNumber":"SN-9"}]}}"#;
        let procedure = decode(text).unwrap().into_procedures().remove(0);
        let implant = &procedure.implants[0];

        assert_eq!(implant.lot_number, "SN-9");
        let json = serde_json::to_string(implant).unwrap();
        assert!(!json.contains("serialNumber"));
    }

    #[test]
    fn test_empty_legacy_array_decodes_to_empty_collection() {
        let decoded = decode("[]").unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.kind(), EnvelopeKind::LegacyCollection);
    }

    #[test]
    fn test_procedures_from_json() {
        assert_eq!(procedures_from_json(&json!({"id": "p1"})).len(), 1);
        assert_eq!(procedures_from_json(&json!([{"id": "p1"}, {"id": "p2"}])).len(), 2);
        assert!(procedures_from_json(&json!("p1")).is_empty());
    }

    #[test]
    fn test_parse_failure_display() {
        assert!(ParseFailure::UnknownFormat.to_string().contains("unknown format"));
        let failure = ParseFailure::Malformed {
            message: "expected value".to_string(),
        };
        assert!(failure.to_string().contains("expected value"));
    }

    fn text_strategy() -> impl Strategy<Value = String> {
        "[A-Za-z0-9 .,'-]{0,16}"
    }

    fn iso_date_strategy() -> impl Strategy<Value = String> {
        (1950i32..2040, 1u32..=12, 1u32..=28)
            .prop_map(|(y, m, d)| format!("{y:04}-{m:02}-{d:02}"))
    }

    fn implant_strategy() -> impl Strategy<Value = Implant> {
        (
            "[a-z0-9]{1,8}",
            text_strategy(),
            text_strategy(),
            text_strategy(),
            text_strategy(),
            text_strategy(),
            proptest::option::of(text_strategy()),
            proptest::option::of(text_strategy()),
            proptest::option::of(iso_date_strategy()),
        )
            .prop_map(
                |(id, name, manufacturer, article, lot, kind, location, notes, date)| Implant {
                    id: format!("imp-{id}"),
                    name,
                    manufacturer,
                    article_number: article,
                    lot_number: lot,
                    kind,
                    location,
                    notes,
                    implant_date: date,
                },
            )
    }

    fn side_strategy() -> impl Strategy<Value = Side> {
        prop_oneof![
            Just(Side::Left),
            Just(Side::Right),
            Just(Side::NotApplicable),
            Just(Side::Other("Bilateral".to_string())),
            text_strategy().prop_map(Side::from),
        ]
    }

    fn procedure_strategy() -> impl Strategy<Value = Procedure> {
        (
            "[a-z0-9]{1,8}",
            iso_date_strategy(),
            text_strategy(),
            text_strategy(),
            text_strategy(),
            proptest::option::of(text_strategy()),
            proptest::option::of(side_strategy()),
            proptest::option::of(text_strategy()),
            proptest::collection::vec(implant_strategy(), 0..4),
        )
            .prop_map(
                |(id, date, surgeon, hospital, procedure_type, location, side, notes, implants)| {
                    Procedure {
                        id: format!("proc-{id}"),
                        date,
                        surgeon,
                        hospital,
                        procedure_type,
                        location,
                        side,
                        notes,
                        implants,
                    }
                },
            )
    }

    proptest! {
        #[test]
        fn prop_single_round_trip(procedure in procedure_strategy()) {
            let payload = Encoder::new().single_payload(&procedure).unwrap();
            let decoded = decode(&payload).unwrap().into_procedures();

            prop_assert_eq!(decoded.len(), 1);
            assert_same_procedure(&decoded[0], &procedure);
        }

        #[test]
        fn prop_collection_round_trip(procedures in proptest::collection::vec(procedure_strategy(), 1..5)) {
            let payload = Encoder::new().collection_payload(&procedures).unwrap();
            let Ok(Decoded::Collection(collection)) = decode(&payload) else {
                panic!("expected a collection");
            };

            prop_assert_eq!(collection.declared_count, Some(procedures.len() as u64));
            prop_assert_eq!(collection.len(), procedures.len());
            for (decoded, original) in collection.procedures.iter().zip(&procedures) {
                assert_same_procedure(decoded, original);
            }
        }

        #[test]
        fn prop_decode_never_panics(raw in ".{0,64}") {
            let _ = decode(&raw);
        }
    }
}
