//! Lenient timestamp codec.
//!
//! Mantis emits `xsd:dateTime` values in RFC 3339 form, but some servers
//! drop trailing fragments (seconds, zone). Parsing truncates both the input
//! and the canonical pattern `YYYY-MM-DDThh:mm:ssZhh:mm` to the shorter of
//! the two lengths and parses the input against what is left of the pattern.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

use crate::error::MantisError;

/// Length of the canonical pattern `YYYY-MM-DDThh:mm:ssZhh:mm`.
pub const PATTERN_LEN: usize = 25;

/// Offset just past `YYYY-MM-DDThh:mm:ss`.
const SECONDS_END: usize = 19;

/// What the zero timestamp formats as.
const ZERO_TEXT: &str = "0001-01-01T00:00:00Z";

/// Leading separator and digit width of each date/time field.
const FIELDS: [(Option<u8>, usize); 6] = [
    (None, 4),
    (Some(b'-'), 2),
    (Some(b'-'), 2),
    (Some(b'T'), 2),
    (Some(b':'), 2),
    (Some(b':'), 2),
];

/// A wall-clock instant as exchanged with the server.
///
/// The default value is the zero timestamp, which stands for "absent":
/// it is what an empty element decodes to, and it is never written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp(Option<DateTime<FixedOffset>>);

impl Timestamp {
    /// The zero (absent) timestamp.
    pub const ZERO: Timestamp = Timestamp(None);

    /// Wraps a concrete instant.
    pub fn new(instant: DateTime<FixedOffset>) -> Self {
        Timestamp(Some(instant))
    }

    /// Returns the current time in UTC.
    pub fn now() -> Self {
        Utc::now().into()
    }

    /// Returns true for the zero timestamp.
    pub fn is_zero(&self) -> bool {
        self.0.is_none()
    }

    /// Returns the instant, or `None` for the zero timestamp.
    pub fn as_datetime(&self) -> Option<&DateTime<FixedOffset>> {
        self.0.as_ref()
    }

    /// Formats the full canonical pattern (`Z` for UTC).
    pub fn format(&self) -> String {
        match &self.0 {
            Some(instant) => instant.to_rfc3339_opts(SecondsFormat::Secs, true),
            None => ZERO_TEXT.to_string(),
        }
    }
}

impl From<DateTime<FixedOffset>> for Timestamp {
    fn from(instant: DateTime<FixedOffset>) -> Self {
        Timestamp::new(instant)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(instant: DateTime<Utc>) -> Self {
        Timestamp::new(instant.fixed_offset())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl FromStr for Timestamp {
    type Err = MantisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.0 {
            Some(_) => serializer.serialize_str(&self.format()),
            None => serializer.serialize_none(),
        }
    }
}

/// Parses a possibly truncated RFC 3339 timestamp.
///
/// Empty (or all-whitespace) text yields [`Timestamp::ZERO`]. Text longer
/// than the pattern is cut to [`PATTERN_LEN`] characters before parsing,
/// not counting fractional seconds.
///
/// # Errors
///
/// Returns `MantisError::MalformedTimestamp` if the (truncated) text does
/// not match the (truncated) pattern.
///
/// # Example
///
/// ```
/// use mantis_connect::codec::timestamp::parse;
///
/// let full = parse("2013-08-16T17:39:49+01:00").unwrap();
/// let date_only = parse("2013-08-16").unwrap();
/// assert!(!full.is_zero());
/// assert_eq!(date_only.format(), "2013-08-16T00:00:00Z");
/// assert!(parse("").unwrap().is_zero());
/// ```
pub fn parse(text: &str) -> Result<Timestamp, MantisError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Timestamp::ZERO);
    }

    let n = trimmed.len().min(PATTERN_LEN + fraction_len(trimmed.as_bytes()));
    let cut = trimmed
        .get(..n)
        .ok_or_else(|| MantisError::malformed_timestamp(trimmed))?;

    parse_truncated(cut.as_bytes()).ok_or_else(|| MantisError::malformed_timestamp(trimmed))
}

/// Formats a timestamp; shorthand for [`Timestamp::format`].
pub fn format(timestamp: &Timestamp) -> String {
    timestamp.format()
}

fn parse_truncated(input: &[u8]) -> Option<Timestamp> {
    let mut pos = 0;
    // year, month, day, hour, minute, second
    let mut values = [0u32, 1, 1, 0, 0, 0];

    for (i, &(separator, width)) in FIELDS.iter().enumerate() {
        if let Some(separator) = separator {
            if pos == input.len() {
                return build(values, 0, 0);
            }
            if input[pos] != separator {
                return None;
            }
            pos += 1;
            if pos == input.len() {
                return build(values, 0, 0);
            }
        }
        values[i] = digits(input, pos, width)?;
        pos += width;
    }

    let mut nanos = 0;
    if input.get(pos) == Some(&b'.') {
        pos += 1;
        let start = pos;
        while pos < input.len() && input[pos].is_ascii_digit() {
            pos += 1;
        }
        if pos == start {
            return None;
        }
        nanos = fraction_nanos(&input[start..pos]);
    }

    let mut offset_secs = 0;
    if pos < input.len() {
        match input[pos] {
            b'Z' => pos += 1,
            sign @ (b'+' | b'-') => {
                pos += 1;
                let hours = digits(input, pos, 2)?;
                pos += 2;
                let mut minutes = 0;
                if input.get(pos) == Some(&b':') {
                    pos += 1;
                    if pos < input.len() {
                        minutes = digits(input, pos, 2)?;
                        pos += 2;
                    }
                }
                let secs = (hours * 3600 + minutes * 60) as i32;
                offset_secs = if sign == b'-' { -secs } else { secs };
            }
            _ => return None,
        }
    }

    if pos != input.len() {
        return None;
    }
    build(values, nanos, offset_secs)
}

/// Length of the `.digits` run after the seconds field, which the pattern
/// does not account for.
fn fraction_len(input: &[u8]) -> usize {
    match input.get(SECONDS_END..) {
        Some([b'.', rest @ ..]) => 1 + rest.iter().take_while(|b| b.is_ascii_digit()).count(),
        _ => 0,
    }
}

fn digits(input: &[u8], pos: usize, width: usize) -> Option<u32> {
    let field = input.get(pos..pos + width)?;
    if !field.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(field.iter().fold(0, |acc, b| acc * 10 + u32::from(b - b'0')))
}

fn fraction_nanos(field: &[u8]) -> u32 {
    let mut nanos = 0u32;
    for i in 0..9 {
        let digit = field.get(i).map_or(0, |b| u32::from(b - b'0'));
        nanos = nanos * 10 + digit;
    }
    nanos
}

fn build(values: [u32; 6], nanos: u32, offset_secs: i32) -> Option<Timestamp> {
    let [year, month, day, hour, minute, second] = values;
    let date = NaiveDate::from_ymd_opt(year as i32, month, day)?;
    let time = NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)?;
    let offset = FixedOffset::east_opt(offset_secs)?;
    NaiveDateTime::new(date, time)
        .and_local_timezone(offset)
        .single()
        .map(Timestamp::new)
}
