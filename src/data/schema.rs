//! Dataset Schema Module
//! Field names used by the pipeline and the parsing rules shared by
//! cleaning and CSV loading.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

pub const INDICATOR_NAME: &str = "indicator_name";
pub const INDICATOR_CATEGORY: &str = "indicator_category";
pub const GROUP_CATEGORY: &str = "group_category";
pub const GROUP_NAME: &str = "group_name";
pub const GEOGRAPHY_TYPE: &str = "geography_type";
pub const TIME_YEAR: &str = "time_year";
pub const ESTIMATE: &str = "estimate";
pub const CONINF_95: &str = "coninf_95";
pub const SAMPLE_SIZE: &str = "sample_size";
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// Fields that must be numeric after cleaning.
pub const NUMERIC_FIELDS: [&str; 3] = [ESTIMATE, CONINF_95, SAMPLE_SIZE];

/// Fields normalized to timestamps.
pub const TIMESTAMP_FIELDS: [&str; 2] = [CREATED_AT, UPDATED_AT];

/// Every field the analyses address by name. Checked once at ingestion.
pub const REQUIRED_FIELDS: [&str; 11] = [
    INDICATOR_NAME,
    INDICATOR_CATEGORY,
    GROUP_CATEGORY,
    GROUP_NAME,
    GEOGRAPHY_TYPE,
    TIME_YEAR,
    ESTIMATE,
    CONINF_95,
    SAMPLE_SIZE,
    CREATED_AT,
    UPDATED_AT,
];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Strip the leading sigil Socrata puts on system columns (`:created_at`).
pub fn normalize_field_name(raw: &str) -> String {
    raw.strip_prefix(':').unwrap_or(raw).to_string()
}

/// Parse a numeric cell. Blank text and NaN are treated as missing.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Parse a timestamp cell.
///
/// Accepts integer epoch seconds (Socrata's system columns), RFC 3339,
/// ISO-like date-times with optional fractional seconds, and bare dates.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(secs) = trimmed.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Timestamp as epoch milliseconds, the unit timestamp columns are stored in.
pub fn parse_timestamp_millis(raw: &str) -> Option<i64> {
    parse_timestamp(raw).map(|dt| dt.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_colon_only() {
        assert_eq!(normalize_field_name(":created_at"), "created_at");
        assert_eq!(normalize_field_name("estimate"), "estimate");
        assert_eq!(normalize_field_name("a:b"), "a:b");
    }

    #[test]
    fn numbers_treat_blank_and_nan_as_missing() {
        assert_eq!(parse_number(" 12.5 "), Some(12.5));
        assert_eq!(parse_number("7"), Some(7.0));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("   "), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("n/a"), None);
    }

    #[test]
    fn timestamps_accept_epoch_and_iso_forms() {
        let epoch = parse_timestamp("1700000000").unwrap();
        assert_eq!(epoch.and_utc().timestamp(), 1_700_000_000);

        let iso = parse_timestamp("2023-11-14T22:13:20.000").unwrap();
        assert_eq!(iso, epoch);

        let rfc = parse_timestamp("2023-11-14T22:13:20Z").unwrap();
        assert_eq!(rfc, epoch);

        let date = parse_timestamp("2021-06-01").unwrap();
        assert_eq!(date.format("%Y-%m-%d %H:%M:%S").to_string(), "2021-06-01 00:00:00");
    }

    #[test]
    fn unparsable_timestamps_are_none() {
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp_millis("2021-13-45").is_none());
    }
}
