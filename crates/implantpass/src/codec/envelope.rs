//! Wire envelopes and shape discrimination.
//!
//! Encoding builds one of the two current envelopes. Decoding classifies an
//! arbitrary JSON value into [`Envelope`], which also covers the two legacy
//! shapes that predate the versioned wrapper.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::lenient::is_truthy;
use crate::dates::WIRE_DATE_FORMAT;
use crate::model::Procedure;

/// The `formatVersion` written by this encoder.
pub const FORMAT_VERSION: &str = "1.0";

/// The `type` tag of a collection envelope.
pub const COLLECTION_TYPE: &str = "allProcedures";

/// The default `appName` of a collection envelope.
pub const DEFAULT_APP_NAME: &str = "Implant Pass";

/// Byte-mode capacity of the largest QR symbol (version 40, level L).
pub const QR_BYTE_CAPACITY: usize = 2953;

/// Single-procedure envelope as written on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SingleEnvelope<'a> {
    pub format_version: &'a str,
    pub date_format: &'a str,
    pub procedure: &'a Procedure,
}

impl<'a> SingleEnvelope<'a> {
    pub(crate) fn new(procedure: &'a Procedure) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            date_format: WIRE_DATE_FORMAT,
            procedure,
        }
    }
}

/// Collection envelope as written on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CollectionEnvelope<'a> {
    pub format_version: &'a str,
    pub date_format: &'a str,
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub count: usize,
    pub procedures: &'a [Procedure],
    pub generated_at: String,
    pub app_name: &'a str,
}

impl<'a> CollectionEnvelope<'a> {
    pub(crate) fn new(procedures: &'a [Procedure], generated_at: String, app_name: &'a str) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            date_format: WIRE_DATE_FORMAT,
            kind: COLLECTION_TYPE,
            count: procedures.len(),
            procedures,
            generated_at,
            app_name,
        }
    }
}

/// Which payload shape was recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    /// Versioned envelope carrying one procedure.
    CurrentSingle,
    /// Versioned envelope carrying many procedures.
    CurrentCollection,
    /// Bare procedure object without version metadata.
    LegacySingle,
    /// Bare array of procedures without version metadata.
    LegacyCollection,
}

impl EnvelopeKind {
    /// Whether this shape predates the versioned envelope.
    #[must_use]
    pub fn is_legacy(self) -> bool {
        matches!(self, Self::LegacySingle | Self::LegacyCollection)
    }
}

impl std::fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CurrentSingle => write!(f, "current_single"),
            Self::CurrentCollection => write!(f, "current_collection"),
            Self::LegacySingle => write!(f, "legacy_single"),
            Self::LegacyCollection => write!(f, "legacy_collection"),
        }
    }
}

/// Metadata of a current collection envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CollectionMeta {
    pub declared_count: Option<u64>,
    pub generated_at: Option<String>,
    pub app_name: Option<String>,
}

/// A payload classified by shape, with its procedure data still raw.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Envelope {
    /// Versioned envelope with one procedure.
    CurrentSingle { format_version: String, procedure: Value },
    /// Versioned envelope with many procedures.
    CurrentCollection {
        format_version: String,
        meta: CollectionMeta,
        procedures: Vec<Value>,
    },
    /// Bare procedure object.
    LegacySingle(Map<String, Value>),
    /// Bare array of procedures.
    LegacyCollection(Vec<Value>),
}

impl Envelope {
    /// Classify a parsed payload.
    ///
    /// Current envelopes are tried first. If the version markers are present
    /// but neither content field is usable, classification falls through to
    /// the legacy rules exactly as if the markers were absent. Returns `None`
    /// when no shape matches.
    pub(crate) fn discriminate(value: Value) -> Option<Self> {
        let value = match value {
            Value::Object(object) => match Self::current(object) {
                Ok(envelope) => return Some(envelope),
                Err(object) => Value::Object(object),
            },
            other => other,
        };

        match value {
            Value::Array(items) => {
                debug!(entries = items.len(), "Recognized legacy procedure array");
                Some(Self::LegacyCollection(items))
            }
            Value::Object(object)
                if is_truthy(object.get("id")) && is_truthy(object.get("date")) =>
            {
                debug!("Recognized legacy procedure object");
                Some(Self::LegacySingle(object))
            }
            _ => None,
        }
    }

    /// Try the current envelope rules, handing the object back on mismatch.
    fn current(mut object: Map<String, Value>) -> Result<Self, Map<String, Value>> {
        if !is_truthy(object.get("formatVersion")) || !is_truthy(object.get("dateFormat")) {
            return Err(object);
        }
        let format_version = version_text(object.get("formatVersion"));

        let is_collection = object.get("type").and_then(Value::as_str) == Some(COLLECTION_TYPE)
            && object.get("procedures").is_some_and(Value::is_array);
        if is_collection {
            let meta = CollectionMeta {
                declared_count: object.get("count").and_then(Value::as_u64),
                generated_at: object
                    .get("generatedAt")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                app_name: object
                    .get("appName")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            };
            let procedures = match object.remove("procedures") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            debug!(
                version = %format_version,
                entries = procedures.len(),
                "Recognized current collection envelope"
            );
            return Ok(Self::CurrentCollection {
                format_version,
                meta,
                procedures,
            });
        }

        if is_truthy(object.get("procedure")) {
            let procedure = object.remove("procedure").unwrap_or(Value::Null);
            debug!(version = %format_version, "Recognized current single envelope");
            return Ok(Self::CurrentSingle {
                format_version,
                procedure,
            });
        }

        debug!("Version markers present without usable content, trying legacy shapes");
        Err(object)
    }

    /// The shape this envelope was recognized as.
    pub(crate) fn kind(&self) -> EnvelopeKind {
        match self {
            Self::CurrentSingle { .. } => EnvelopeKind::CurrentSingle,
            Self::CurrentCollection { .. } => EnvelopeKind::CurrentCollection,
            Self::LegacySingle(_) => EnvelopeKind::LegacySingle,
            Self::LegacyCollection(_) => EnvelopeKind::LegacyCollection,
        }
    }
}

fn version_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_envelope_serializes_markers_first() {
        let procedure = Procedure::new("p1", "15.05.2023", "Dr. A", "H", "Hip");
        let json = serde_json::to_string(&SingleEnvelope::new(&procedure)).unwrap();

        assert!(json.starts_with(r#"{"formatVersion":"1.0","dateFormat":"DD.MM.YYYY","procedure":"#));
    }

    #[test]
    fn test_collection_envelope_fields() {
        let procedures = vec![
            Procedure::new("p1", "15.05.2023", "Dr. A", "H", "Hip"),
            Procedure::new("p2", "22.07.2023", "Dr. B", "H", "Knee"),
        ];
        let envelope =
            CollectionEnvelope::new(&procedures, "2024-01-01T00:00:00.000Z".to_string(), "App");
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["type"], "allProcedures");
        assert_eq!(value["count"], 2);
        assert_eq!(value["appName"], "App");
        assert_eq!(value["generatedAt"], "2024-01-01T00:00:00.000Z");
        assert_eq!(value["procedures"][1]["id"], "p2");
    }

    #[test]
    fn test_discriminate_current_single() {
        let value = json!({"formatVersion": "1.0", "dateFormat": "DD.MM.YYYY", "procedure": {"id": "p1"}});
        let envelope = Envelope::discriminate(value).unwrap();

        assert_eq!(envelope.kind(), EnvelopeKind::CurrentSingle);
        assert!(matches!(envelope, Envelope::CurrentSingle { ref format_version, .. } if format_version == "1.0"));
    }

    #[test]
    fn test_discriminate_current_collection() {
        let value = json!({
            "formatVersion": "1.0",
            "dateFormat": "DD.MM.YYYY",
            "type": "allProcedures",
            "count": 1,
            "procedures": [{"id": "p1"}],
            "appName": "Implant Pass"
        });
        let envelope = Envelope::discriminate(value).unwrap();

        match envelope {
            Envelope::CurrentCollection {
                meta, procedures, ..
            } => {
                assert_eq!(meta.declared_count, Some(1));
                assert_eq!(meta.app_name.as_deref(), Some("Implant Pass"));
                assert!(meta.generated_at.is_none());
                assert_eq!(procedures.len(), 1);
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn test_collection_type_without_array_uses_single_rule() {
        let value = json!({
            "formatVersion": "1.0",
            "dateFormat": "DD.MM.YYYY",
            "type": "allProcedures",
            "procedures": "oops",
            "procedure": {"id": "p1"}
        });
        let envelope = Envelope::discriminate(value).unwrap();
        assert_eq!(envelope.kind(), EnvelopeKind::CurrentSingle);
    }

    #[test]
    fn test_markers_without_content_fall_through_to_legacy() {
        let value = json!({"formatVersion": "1.0", "dateFormat": "x", "id": "p1", "date": "2023-05-15"});
        let envelope = Envelope::discriminate(value).unwrap();
        assert_eq!(envelope.kind(), EnvelopeKind::LegacySingle);

        let value = json!({"formatVersion": "1.0", "dateFormat": "x"});
        assert!(Envelope::discriminate(value).is_none());
    }

    #[test]
    fn test_discriminate_legacy_shapes() {
        let array = Envelope::discriminate(json!([{"id": "p1"}])).unwrap();
        assert_eq!(array.kind(), EnvelopeKind::LegacyCollection);

        let single = Envelope::discriminate(json!({"id": "p1", "date": "2023-05-15"})).unwrap();
        assert_eq!(single.kind(), EnvelopeKind::LegacySingle);
    }

    #[test]
    fn test_falsy_markers_are_ignored() {
        let value = json!({"formatVersion": "", "dateFormat": "DD.MM.YYYY", "procedure": {"id": "p1"}});
        assert!(Envelope::discriminate(value).is_none());

        let value = json!({"id": "", "date": "2023-05-15"});
        assert!(Envelope::discriminate(value).is_none());
    }

    #[test]
    fn test_discriminate_unknown() {
        assert!(Envelope::discriminate(json!({"foo": 1})).is_none());
        assert!(Envelope::discriminate(json!(42)).is_none());
        assert!(Envelope::discriminate(json!("text")).is_none());
        assert!(Envelope::discriminate(Value::Null).is_none());
    }

    #[test]
    fn test_envelope_kind_display_and_legacy() {
        assert_eq!(EnvelopeKind::CurrentSingle.to_string(), "current_single");
        assert_eq!(EnvelopeKind::LegacyCollection.to_string(), "legacy_collection");
        assert!(EnvelopeKind::LegacySingle.is_legacy());
        assert!(!EnvelopeKind::CurrentCollection.is_legacy());
    }
}
