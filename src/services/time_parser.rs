use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;

/// Accepted ledger timestamp layouts, tried in order. The last one covers
/// verbose Apps-Script-style strings once their timezone suffix is stripped.
const FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%a %b %d %Y %H:%M:%S",
];

fn gmt_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*GMT[+-]\d{4}\s*(\([^)]*\))?\s*$").expect("valid regex"))
}

/// Normalize a raw ledger timestamp cell into a wall-clock instant.
///
/// Returns `None` on anything unparseable; malformed cells are data, not
/// bugs, and callers skip the affected row.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed);
        }
    }

    // e.g. "Tue Jul 15 2025 11:00:10 GMT+0900 (日本標準時)"
    let cleaned = gmt_suffix().replace(trimmed, "");
    if cleaned != trimmed {
        for format in FORMATS {
            if let Ok(parsed) = NaiveDateTime::parse_from_str(cleaned.as_ref(), format) {
                return Some(parsed);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn parses_slash_format() {
        assert_eq!(
            parse_timestamp("2025/07/15 10:56:46"),
            Some(at(2025, 7, 15, 10, 56, 46))
        );
    }

    #[test]
    fn parses_dash_format() {
        assert_eq!(
            parse_timestamp("2025-07-15 10:56:46"),
            Some(at(2025, 7, 15, 10, 56, 46))
        );
    }

    #[test]
    fn parses_us_format() {
        assert_eq!(
            parse_timestamp("07/15/2025 10:56:46"),
            Some(at(2025, 7, 15, 10, 56, 46))
        );
    }

    #[test]
    fn parses_verbose_format_without_suffix() {
        assert_eq!(
            parse_timestamp("Tue Jul 15 2025 11:00:10"),
            Some(at(2025, 7, 15, 11, 0, 10))
        );
    }

    #[test]
    fn parses_verbose_format_with_gmt_suffix() {
        assert_eq!(
            parse_timestamp("Tue Jul 15 2025 11:00:10 GMT+0900 (日本標準時)"),
            Some(at(2025, 7, 15, 11, 0, 10))
        );
    }

    #[test]
    fn parses_verbose_format_with_bare_offset() {
        assert_eq!(
            parse_timestamp("Tue Jul 15 2025 11:00:10 GMT+0900"),
            Some(at(2025, 7, 15, 11, 0, 10))
        );
    }

    #[test]
    fn tolerates_surrounding_whitespace() {
        assert_eq!(
            parse_timestamp("  2025/07/15 10:56:46  "),
            Some(at(2025, 7, 15, 10, 56, 46))
        );
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("   "), None);
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(parse_timestamp("2025/07/15"), None);
        assert_eq!(parse_timestamp("2025/13/40 99:99:99"), None);
    }
}
