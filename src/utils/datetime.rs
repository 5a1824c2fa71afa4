//! Datetime parsing for feed publication dates
//!
//! Feeds in the wild publish dates in RFC 2822 (RSS), RFC 3339 (Atom) and a
//! long tail of looser variants. [`DateTimeParser`] tries the strict formats
//! first, then falls back to offset-bearing and naive patterns. Naive values
//! are interpreted in a caller-supplied timezone.
//!
//! # Usage
//!
//! ```rust
//! use podcast_ingest::utils::datetime::DateTimeParser;
//!
//! let rss = DateTimeParser::parse_flexible("Mon, 06 Oct 2025 10:00:00 GMT").unwrap();
//! let atom = DateTimeParser::parse_flexible("2025-10-06T10:00:00Z").unwrap();
//! assert_eq!(rss, atom);
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Errors that can occur during datetime operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateTimeError {
    /// Input matched none of the supported formats
    #[error("Invalid datetime format: '{input}'")]
    InvalidFormat { input: String },

    /// Naive local time that does not exist in the target timezone (DST gap)
    #[error("Local time '{input}' does not exist in timezone {timezone}")]
    NonexistentLocalTime { input: String, timezone: String },
}

/// Formats carrying an explicit offset, tried after RFC 2822/3339
const OFFSET_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M %z",   // RFC 2822 without seconds
    "%d %b %Y %H:%M:%S %z",    // RFC 2822 without weekday
    "%A, %d %B %Y %H:%M:%S %z", // long weekday and month names
    "%Y-%m-%dT%H:%M:%S%z",     // ISO with compact offset
    "%Y-%m-%d %H:%M:%S%.f %z", // space separated with offset
];

/// Formats without offset; interpreted in the caller's timezone
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%a, %d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
];

/// Centralized datetime parsing utilities
pub struct DateTimeParser;

impl DateTimeParser {
    /// Parse a publication date, treating naive values as UTC
    pub fn parse_flexible(input: &str) -> Result<DateTime<Utc>, DateTimeError> {
        Self::parse_in_timezone(input, Tz::UTC)
    }

    /// Parse a publication date, treating naive values as local time in `tz`
    ///
    /// Ambiguous local times (DST fold) resolve to the earlier instant.
    pub fn parse_in_timezone(input: &str, tz: Tz) -> Result<DateTime<Utc>, DateTimeError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(DateTimeError::InvalidFormat {
                input: input.to_string(),
            });
        }

        if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
            return Ok(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(dt.with_timezone(&Utc));
        }
        for format in OFFSET_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(trimmed, format) {
                return Ok(dt.with_timezone(&Utc));
            }
        }

        // Trailing "UTC"/"GMT" on otherwise naive strings
        for suffix in [" UTC", " GMT", "Z"] {
            if let Some(stripped) = trimmed.strip_suffix(suffix) {
                if let Some(naive) = Self::parse_naive(stripped) {
                    return Ok(Utc.from_utc_datetime(&naive));
                }
            }
        }

        let naive = Self::parse_naive(trimmed).ok_or_else(|| DateTimeError::InvalidFormat {
            input: input.to_string(),
        })?;

        tz.from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| DateTimeError::NonexistentLocalTime {
                input: input.to_string(),
                timezone: tz.name().to_string(),
            })
    }

    fn parse_naive(input: &str) -> Option<NaiveDateTime> {
        NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(input, "%Y-%m-%d")
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[rstest]
    #[case("Mon, 06 Oct 2025 10:00:00 GMT")]
    #[case("Mon, 06 Oct 2025 10:00:00 +0000")]
    #[case("Mon, 6 Oct 2025 12:00:00 +0200")]
    #[case("06 Oct 2025 10:00:00 +0000")]
    #[case("Mon, 06 Oct 2025 10:00 +0000")]
    #[case("2025-10-06T10:00:00Z")]
    #[case("2025-10-06T12:00:00+02:00")]
    #[case("2025-10-06T10:00:00.000Z")]
    #[case("2025-10-06 10:00:00 UTC")]
    #[case("  2025-10-06T10:00:00Z  ")]
    fn test_offset_bearing_formats(#[case] input: &str) {
        assert_eq!(
            DateTimeParser::parse_flexible(input).unwrap(),
            utc(2025, 10, 6, 10, 0, 0)
        );
    }

    #[test]
    fn test_naive_dates_use_supplied_timezone() {
        let parsed =
            DateTimeParser::parse_in_timezone("2025-10-06 12:00:00", chrono_tz::Europe::Berlin)
                .unwrap();
        assert_eq!(parsed, utc(2025, 10, 6, 10, 0, 0));

        let parsed = DateTimeParser::parse_flexible("2025-10-06").unwrap();
        assert_eq!(parsed, utc(2025, 10, 6, 0, 0, 0));
    }

    #[test]
    fn test_dst_gap_is_reported() {
        // Clocks jump from 02:00 to 03:00 in Berlin on 2025-03-30
        let err =
            DateTimeParser::parse_in_timezone("2025-03-30 02:30:00", chrono_tz::Europe::Berlin)
                .unwrap_err();
        assert!(matches!(err, DateTimeError::NonexistentLocalTime { .. }));
    }

    #[rstest]
    #[case("")]
    #[case("not a date")]
    #[case("Mon, 32 Oct 2025 10:00:00 GMT")]
    #[case("yesterday-ish")]
    fn test_invalid_inputs(#[case] input: &str) {
        assert!(matches!(
            DateTimeParser::parse_flexible(input),
            Err(DateTimeError::InvalidFormat { .. })
        ));
    }
}
