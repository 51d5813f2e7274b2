//! Demonstration record.

use chrono::NaiveDate;

use crate::dates::WIRE_DATE_FORMAT;
use crate::model::{Implant, Procedure, Side};

const DATE_PATTERN: &str = "%d.%m.%Y";

/// A total hip replacement performed on `today`, with its four components.
#[must_use]
pub fn sample_procedure(today: NaiveDate) -> Procedure {
    let date = today.format(DATE_PATTERN).to_string();
    let procedure_id = format!("sample-{}", today.format("%Y%m%d"));

    // Kept small enough for a level H symbol.
    let implant = |n: usize, name: &str, article: &str, lot: &str, kind: &str| {
        Implant::new(format!("imp-{n}"), name, "Zimmer Biomet", article, lot, kind)
            .with_implant_date(date.clone())
    };

    Procedure::new(
        procedure_id,
        date.clone(),
        "Dr. Sarah Johnson",
        "University Medical Center",
        "Total Hip Replacement",
    )
    .with_side(Side::Left)
    .with_location("Hip")
    .with_notes(format!("Sample record, dates in {WIRE_DATE_FORMAT}"))
    .with_implant(implant(
        1,
        "Continuum Acetabular Cup",
        "00-8757-054-02",
        "ZB-AC-67890",
        "Acetabular Cup",
    ))
    .with_implant(implant(
        2,
        "Biolox Delta Femoral Head",
        "00-8775-036-02",
        "ZB-FH-24680",
        "Femoral Head",
    ))
    .with_implant(implant(
        3,
        "Longevity Liner",
        "00-8763-036-10",
        "ZB-LN-13579",
        "Acetabular Liner",
    ))
    .with_implant(
        implant(4, "Taperloc Hip Stem", "51-103120", "ZB-TL-12345", "Hip Stem")
            .with_notes("Size 12, Standard Offset"),
    )
}
