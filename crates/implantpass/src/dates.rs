//! Date normalization shared by the encoder and decoder.
//!
//! Every date embedded in a payload is written as `DD.MM.YYYY`. Inputs are
//! accepted in that form or as ISO `YYYY-MM-DD` (optionally with a time
//! component). Anything else is passed through untouched rather than
//! rejected, so an unexpected value typed by the patient survives a
//! round-trip.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

/// The `dateFormat` value declared in every current payload.
pub const WIRE_DATE_FORMAT: &str = "DD.MM.YYYY";

const WIRE_PATTERN: &str = "%d.%m.%Y";
const ISO_PATTERN: &str = "%Y-%m-%d";

static WIRE_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}\.\d{2}\.\d{4}$").expect("valid wire date regex"));

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})(?:[T ].*)?$").expect("valid ISO date regex")
});

/// Check whether `value` is already in the `DD.MM.YYYY` wire form.
#[must_use]
pub fn is_wire_date(value: &str) -> bool {
    WIRE_DATE.is_match(value)
}

/// Render a date in the `DD.MM.YYYY` wire form.
///
/// Values already in wire form are returned unchanged. ISO dates and
/// date-times are reformatted from their calendar-date part. Everything else,
/// including the empty string, is returned as is.
///
/// # Examples
///
/// ```
/// use implantpass::dates::normalize_date;
///
/// assert_eq!(normalize_date("2023-05-15"), "15.05.2023");
/// assert_eq!(normalize_date("15.05.2023"), "15.05.2023");
/// assert_eq!(normalize_date("next spring"), "next spring");
/// ```
#[must_use]
pub fn normalize_date(value: &str) -> String {
    if is_wire_date(value) {
        return value.to_string();
    }
    match parse_iso(value) {
        Some(date) => date.format(WIRE_PATTERN).to_string(),
        None => value.to_string(),
    }
}

/// Render a date in ISO `YYYY-MM-DD` form.
///
/// The inverse of [`normalize_date`], with the same pass-through policy.
#[must_use]
pub fn to_iso_date(value: &str) -> String {
    if ISO_DATE.is_match(value) && value.len() == 10 {
        return value.to_string();
    }
    match parse_wire(value) {
        Some(date) => date.format(ISO_PATTERN).to_string(),
        None => value.to_string(),
    }
}

/// Parse either accepted form into a calendar date.
///
/// Returns `None` for anything that is not a valid date in one of the two
/// forms.
#[must_use]
pub fn canonical_date(value: &str) -> Option<NaiveDate> {
    parse_wire(value).or_else(|| parse_iso(value))
}

/// Compare two date strings after normalizing both.
#[must_use]
pub fn same_date(a: &str, b: &str) -> bool {
    match (canonical_date(a), canonical_date(b)) {
        (Some(a), Some(b)) => a == b,
        _ => normalize_date(a) == normalize_date(b),
    }
}

fn parse_wire(value: &str) -> Option<NaiveDate> {
    if !is_wire_date(value) {
        return None;
    }
    NaiveDate::parse_from_str(value, WIRE_PATTERN).ok()
}

fn parse_iso(value: &str) -> Option<NaiveDate> {
    let captures = ISO_DATE.captures(value.trim())?;
    NaiveDate::parse_from_str(captures.get(1)?.as_str(), ISO_PATTERN).ok()
}
