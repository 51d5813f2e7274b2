//! Lenient conversion of raw JSON into records.
//!
//! Payloads come from other devices, older app versions and occasionally
//! hand-edited text. Fields of the wrong type are coerced where a sensible
//! reading exists and dropped otherwise; only a value that is not an object
//! at all is rejected.

use serde_json::{Map, Value};
use tracing::{trace, warn};

use crate::dates::normalize_date;
use crate::model::{Implant, Procedure, Side};

/// JavaScript-style truthiness, matching how older encoders tested fields.
pub(crate) fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n.abs() > 0.0),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

/// Read a field as text, stringifying scalars.
fn text(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.is_empty())
}

/// Convert a raw procedure object.
///
/// Returns `None` when `value` is not a JSON object.
pub(crate) fn procedure_from_value(value: &Value) -> Option<Procedure> {
    let object = value.as_object()?;

    let mut procedure = Procedure {
        id: text(object, "id").unwrap_or_default(),
        date: normalize_date(&text(object, "date").unwrap_or_default()),
        surgeon: text(object, "surgeon").unwrap_or_default(),
        hospital: text(object, "hospital").unwrap_or_default(),
        procedure_type: text(object, "procedureType").unwrap_or_default(),
        location: text(object, "location"),
        side: text(object, "side").map(Side::from),
        notes: text(object, "notes"),
        implants: Vec::new(),
    };
    if procedure.id.is_empty() {
        procedure.id = procedure.derive_id();
        trace!(id = %procedure.id, "Assigned id to procedure without one");
    }

    if let Some(items) = object.get("implants") {
        match items {
            Value::Array(items) => {
                procedure.implants = items
                    .iter()
                    .enumerate()
                    .filter_map(|(index, item)| {
                        let implant = implant_from_value(item, &procedure.id, index);
                        if implant.is_none() {
                            warn!(
                                procedure = %procedure.id,
                                index,
                                "Skipping implant entry that is not an object"
                            );
                        }
                        implant
                    })
                    .collect();
            }
            Value::Null => {}
            _ => warn!(procedure = %procedure.id, "Ignoring implants field that is not an array"),
        }
    }

    Some(procedure)
}

/// Convert a raw implant object owned by `procedure_id` at position `index`.
fn implant_from_value(value: &Value, procedure_id: &str, index: usize) -> Option<Implant> {
    let object = value.as_object()?;

    // Older payloads carry the lot number as `serialNumber`.
    let lot_number = non_empty(text(object, "lotNumber"))
        .or_else(|| text(object, "serialNumber"))
        .unwrap_or_default();

    let mut implant = Implant {
        id: text(object, "id").unwrap_or_default(),
        name: text(object, "name").unwrap_or_default(),
        manufacturer: text(object, "manufacturer").unwrap_or_default(),
        article_number: text(object, "articleNumber").unwrap_or_default(),
        lot_number,
        kind: text(object, "type").unwrap_or_default(),
        location: text(object, "location"),
        notes: text(object, "notes"),
        implant_date: text(object, "implantDate").map(|date| normalize_date(&date)),
    };
    if implant.id.is_empty() {
        implant.id = implant.derive_id(procedure_id, index);
        trace!(id = %implant.id, "Assigned id to implant without one");
    }
    Some(implant)
}

/// Convert a raw procedure sequence, skipping entries that are not objects.
pub(crate) fn procedures_from_values(values: &[Value]) -> Vec<Procedure> {
    values
        .iter()
        .enumerate()
        .filter_map(|(index, value)| {
            let procedure = procedure_from_value(value);
            if procedure.is_none() {
                warn!(index, "Skipping procedure entry that is not an object");
            }
            procedure
        })
        .collect()
}

/// Whether a legacy object looks like a procedure beyond `id` and `date`.
pub(crate) fn has_procedure_fields(object: &Map<String, Value>) -> bool {
    ["surgeon", "hospital", "procedureType", "implants"]
        .iter()
        .any(|key| object.contains_key(*key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_truthy() {
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some(&Value::Null)));
        assert!(!is_truthy(Some(&json!(""))));
        assert!(!is_truthy(Some(&json!(0))));
        assert!(!is_truthy(Some(&json!(false))));
        assert!(is_truthy(Some(&json!("1.0"))));
        assert!(is_truthy(Some(&json!(1))));
        assert!(is_truthy(Some(&json!([]))));
        assert!(is_truthy(Some(&json!({}))));
    }

    #[test]
    fn test_procedure_from_full_object() {
        let value = json!({
            "id": "p1",
            "date": "2023-05-15",
            "surgeon": "Dr. A",
            "hospital": "H",
            "procedureType": "Hip",
            "side": "Left",
            "notes": "fine",
            "implants": [{
                "id": "i1",
                "name": "Cup",
                "manufacturer": "Zimmer",
                "articleNumber": "A1",
                "lotNumber": "L1",
                "type": "Hip Stem",
                "implantDate": "2023-05-15"
            }]
        });
        let procedure = procedure_from_value(&value).unwrap();

        assert_eq!(procedure.id, "p1");
        assert_eq!(procedure.date, "15.05.2023");
        assert_eq!(procedure.side, Some(Side::Left));
        assert_eq!(procedure.notes.as_deref(), Some("fine"));
        assert_eq!(procedure.implants.len(), 1);
        assert_eq!(procedure.implants[0].kind, "Hip Stem");
        assert_eq!(procedure.implants[0].implant_date.as_deref(), Some("15.05.2023"));
    }

    #[test]
    fn test_procedure_defaults_missing_fields() {
        let procedure = procedure_from_value(&json!({"id": "p1", "date": "2023-05-15"})).unwrap();

        assert!(procedure.implants.is_empty());
        assert!(procedure.notes.is_none());
        assert!(procedure.side.is_none());
        assert_eq!(procedure.surgeon, "");
    }

    #[test]
    fn test_procedure_coerces_scalars() {
        let procedure = procedure_from_value(&json!({"id": 7, "date": "x", "surgeon": null, "notes": true})).unwrap();

        assert_eq!(procedure.id, "7");
        assert_eq!(procedure.surgeon, "");
        assert_eq!(procedure.notes.as_deref(), Some("true"));
    }

    #[test]
    fn test_procedure_rejects_non_objects() {
        assert!(procedure_from_value(&json!(1)).is_none());
        assert!(procedure_from_value(&json!("p1")).is_none());
        assert!(procedure_from_value(&json!([])).is_none());
    }

    #[test]
    fn test_serial_number_folds_into_lot_number() {
        let value = json!({"id": "p1", "implants": [{"id": "i1", "serialNumber": "SN-1"}]});
        let procedure = procedure_from_value(&value).unwrap();
        let implant = &procedure.implants[0];

        assert_eq!(implant.lot_number, "SN-1");
        let json = serde_json::to_value(implant).unwrap();
        assert!(json.get("serialNumber").is_none());
    }

    #[test]
    fn test_lot_number_wins_over_serial_number() {
        let value = json!({"id": "p1", "implants": [{"lotNumber": "L1", "serialNumber": "SN-1"}]});
        let procedure = procedure_from_value(&value).unwrap();
        assert_eq!(procedure.implants[0].lot_number, "L1");

        let value = json!({"id": "p1", "implants": [{"lotNumber": "", "serialNumber": "SN-1"}]});
        let procedure = procedure_from_value(&value).unwrap();
        assert_eq!(procedure.implants[0].lot_number, "SN-1");
    }

    #[test]
    fn test_missing_ids_are_derived() {
        let value = json!({"date": "2023-05-15", "implants": [{"name": "Cup"}, {"name": "Cup"}]});
        let first = procedure_from_value(&value).unwrap();
        let second = procedure_from_value(&value).unwrap();

        assert!(first.id.starts_with("proc-"));
        assert_eq!(first.id, second.id);
        assert!(first.implants[0].id.starts_with("imp-"));
        assert_ne!(first.implants[0].id, first.implants[1].id);
        assert_eq!(first.implants, second.implants);
    }

    #[test]
    fn test_non_object_implants_are_skipped() {
        let value = json!({"id": "p1", "implants": [1, {"id": "i1"}, "x"]});
        let procedure = procedure_from_value(&value).unwrap();

        assert_eq!(procedure.implants.len(), 1);
        assert_eq!(procedure.implants[0].id, "i1");
    }

    #[test]
    fn test_implants_of_wrong_type_are_ignored() {
        let procedure = procedure_from_value(&json!({"id": "p1", "implants": "none"})).unwrap();
        assert!(procedure.implants.is_empty());
    }

    #[test]
    fn test_procedures_from_values_keeps_order() {
        let values = vec![json!({"id": "b"}), json!(null), json!({"id": "a"})];
        let procedures = procedures_from_values(&values);

        let ids: Vec<_> = procedures.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_has_procedure_fields() {
        let object = json!({"id": "x", "date": "y"});
        assert!(!has_procedure_fields(object.as_object().unwrap()));

        let object = json!({"id": "x", "date": "y", "surgeon": "Dr. A"});
        assert!(has_procedure_fields(object.as_object().unwrap()));
    }
}
