//! Canonical instant handling.
//!
//! Every date that leaves the repository is rendered by [`format_parts`] as
//! `YYYY-MM-DDTHH:MM:SS.mmmZ`, whichever representation the store returned.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::Deserialize;

/// Broken-down UTC instant, as some stores return temporal values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DateParts {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    #[serde(default)]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
    #[serde(default)]
    pub second: u32,
    #[serde(default)]
    pub millis: u32,
}

impl DateParts {
    pub fn from_datetime(dt: &DateTime<Utc>) -> Self {
        Self {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second(),
            millis: dt.timestamp_subsec_millis(),
        }
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let date = NaiveDate::from_ymd_opt(self.year, self.month, self.day)?;
        let naive = date.and_hms_milli_opt(self.hour, self.minute, self.second, self.millis)?;
        Some(Utc.from_utc_datetime(&naive))
    }
}

/// A temporal value in one of the shapes a store may hand back.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InstantRepr {
    /// UTC epoch milliseconds.
    Millis(i64),
    /// Any text accepted by [`parse_instant`].
    Text(String),
    /// Structured components.
    Parts(DateParts),
}

impl InstantRepr {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            InstantRepr::Millis(ms) => from_millis(*ms),
            InstantRepr::Text(s) => parse_instant(s),
            InstantRepr::Parts(parts) => parts.to_datetime(),
        }
    }

    /// Canonical string form, or `None` if the value is not a valid instant.
    pub fn to_canonical(&self) -> Option<String> {
        self.to_datetime().map(|dt| format_instant(&dt))
    }
}

/// Assemble the canonical string. All components are zero-padded.
pub fn format_parts(parts: &DateParts) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        parts.year, parts.month, parts.day, parts.hour, parts.minute, parts.second, parts.millis
    )
}

pub fn format_instant(dt: &DateTime<Utc>) -> String {
    format_parts(&DateParts::from_datetime(dt))
}

pub fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// Parse a user- or store-supplied instant.
///
/// Accepts RFC 3339 (any offset, normalized to UTC), naive date-times which
/// are taken as UTC (`2024-03-01T09:00`, `2024-03-01 09:00:00`), bare dates
/// (midnight UTC) and all-digit epoch milliseconds.
pub fn parse_instant(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if s.bytes().all(|b| b.is_ascii_digit()) && s.len() > 8 {
        return s.parse::<i64>().ok().and_then(from_millis);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 6] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Half-open UTC window `[start, end)` covering a `YYYY-MM-DD` day.
pub fn day_window(date: &str) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
    let start = Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0)?);
    let next = day.succ_opt()?;
    let end = Utc.from_utc_datetime(&next.and_hms_opt(0, 0, 0)?);
    Some((start, end))
}

/// Half-open UTC window `[start, end)` covering a `YYYY-MM` month.
pub fn month_window(year_month: &str) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let ym = year_month.trim();
    let (year, month) = ym.split_once('-')?;
    if year.len() != 4 || month.len() != 2 {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((
        Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0)?),
        Utc.from_utc_datetime(&next.and_hms_opt(0, 0, 0)?),
    ))
}

/// `YYYY-MM` label of the month containing `dt`.
pub fn month_id(dt: &DateTime<Utc>) -> String {
    format!("{:04}-{:02}", dt.year(), dt.month())
}

/// Serde adapter rendering `DateTime<Utc>` in canonical form.
pub mod canonical {
    use super::{InstantRepr, format_instant};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_instant(dt))
    }

    /// Accepts epoch milliseconds, text, or structured parts.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = InstantRepr::deserialize(d)?;
        raw.to_datetime()
            .ok_or_else(|| D::Error::custom(format!("invalid instant: {:?}", raw)))
    }

    pub mod option {
        use super::super::{InstantRepr, format_instant};
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer, de::Error};

        pub fn serialize<S: Serializer>(
            dt: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => s.serialize_str(&format_instant(dt)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<InstantRepr>::deserialize(d)? {
                Some(raw) => raw
                    .to_datetime()
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid instant: {:?}", raw))),
                None => Ok(None),
            }
        }
    }
}
