//! # Date-Time Value Codec
//!
//! This module provides [`RawDateTime`], the owned date-time representation
//! used by TIMESTAMP columns and `Variant::DateTime`, together with its
//! packed on-disk codec and SQL-style text forms.
//!
//! ## On-Disk Layout
//!
//! A serialized date-time is a 4-byte little-endian date word, optionally
//! followed by an 8-byte little-endian time word. Date-only values are
//! physically shorter — the reader keys off bit 0 of the date word.
//!
//! ```text
//! Date word (u32):
//!   bit  0       has_time_part flag
//!   bits 1..5    day of month (1..31)
//!   bits 6..9    month (1..12)
//!   bits 10..31  year, two's complement 22-bit (-2097152..2097151)
//!
//! Time word (u64):
//!   bits 0..29   nanoseconds (0..999999999)
//!   bits 30..35  seconds (0..59)
//!   bits 36..41  minutes (0..59)
//!   bits 42..46  hours (0..23)
//!   bits 47..63  zero
//! ```
//!
//! ## Text Forms
//!
//! - `YYYY-MM-DD` — date only; chosen by the parser when the input is at
//!   most 10 characters long, not counting a leading `-`
//! - `YYYY-MM-DD HH:MM:SS[.fffffffff]` — full date-time with an optional
//!   fractional-second part of 1 to 9 digits
//!
//! Negative years render and parse with a leading `-` (`-0044-03-15`).
//! The text forms cover years of up to four digits; the packed format
//! reaches further, and those wider years have no textual round-trip.
//!
//! Parsing is strict: the whole input must be consumed, fields must be in
//! range, and the calendar is validated (leap years included).
//!
//! ## Ordering
//!
//! Values order chronologically; a date-only value sorts immediately before
//! the same date at midnight with an explicit time part.

use std::cmp::Ordering;
use std::fmt;

use eyre::{bail, ensure, Result};

/// Serialized size of the date part.
pub const DATE_PART_SERIALIZED_SIZE: usize = 4;

/// Serialized size of the optional time part.
pub const TIME_PART_SERIALIZED_SIZE: usize = 8;

/// Serialized size of a full date-time.
pub const MAX_SERIALIZED_SIZE: usize = DATE_PART_SERIALIZED_SIZE + TIME_PART_SERIALIZED_SIZE;

const MIN_YEAR: i32 = -(1 << 21);
const MAX_YEAR: i32 = (1 << 21) - 1;

/// Time-of-day part of a [`RawDateTime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RawTime {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub nanos: u32,
}

impl RawTime {
    pub fn new(hours: u8, minutes: u8, seconds: u8, nanos: u32) -> Result<Self> {
        ensure!(hours < 24, "hours out of range: {}", hours);
        ensure!(minutes < 60, "minutes out of range: {}", minutes);
        ensure!(seconds < 60, "seconds out of range: {}", seconds);
        ensure!(nanos < 1_000_000_000, "nanoseconds out of range: {}", nanos);
        Ok(Self {
            hours,
            minutes,
            seconds,
            nanos,
        })
    }

    fn pack(&self) -> u64 {
        (self.nanos as u64)
            | ((self.seconds as u64) << 30)
            | ((self.minutes as u64) << 36)
            | ((self.hours as u64) << 42)
    }

    fn unpack(word: u64) -> Result<Self> {
        let time = Self::new(
            ((word >> 42) & 0x1F) as u8,
            ((word >> 36) & 0x3F) as u8,
            ((word >> 30) & 0x3F) as u8,
            (word & 0x3FFF_FFFF) as u32,
        )?;
        ensure!(word >> 47 == 0, "time word has nonzero padding bits");
        Ok(time)
    }
}

/// Owned date-time value: a calendar date plus an optional time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawDateTime {
    year: i32,
    month: u8,
    day: u8,
    time: Option<RawTime>,
}

impl RawDateTime {
    pub fn new_date(year: i32, month: u8, day: u8) -> Result<Self> {
        validate_date(year, month, day)?;
        Ok(Self {
            year,
            month,
            day,
            time: None,
        })
    }

    pub fn new_date_time(year: i32, month: u8, day: u8, time: RawTime) -> Result<Self> {
        validate_date(year, month, day)?;
        Ok(Self {
            year,
            month,
            day,
            time: Some(time),
        })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn day(&self) -> u8 {
        self.day
    }

    pub fn time(&self) -> Option<RawTime> {
        self.time
    }

    pub fn has_time_part(&self) -> bool {
        self.time.is_some()
    }

    /// Day of week, 0 = Sunday, via Zeller's congruence.
    pub fn day_of_week(&self) -> u8 {
        let (mut y, mut m) = (self.year, self.month as i32);
        if m < 3 {
            m += 12;
            y -= 1;
        }
        let k = y.rem_euclid(100);
        let j = y.div_euclid(100);
        let h = (self.day as i32 + (13 * (m + 1)) / 5 + k + k / 4 + j / 4 + 5 * j).rem_euclid(7);
        // Zeller yields 0 = Saturday
        ((h + 6) % 7) as u8
    }

    pub fn serialized_size(&self) -> usize {
        if self.time.is_some() {
            MAX_SERIALIZED_SIZE
        } else {
            DATE_PART_SERIALIZED_SIZE
        }
    }

    /// Appends the packed form to `buf` and returns the number of bytes
    /// written.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) -> usize {
        let date_word = (self.time.is_some() as u32)
            | ((self.day as u32) << 1)
            | ((self.month as u32) << 6)
            | (((self.year as u32) & 0x3F_FFFF) << 10);
        buf.extend_from_slice(&date_word.to_le_bytes());

        match self.time {
            Some(time) => {
                buf.extend_from_slice(&time.pack().to_le_bytes());
                MAX_SERIALIZED_SIZE
            }
            None => DATE_PART_SERIALIZED_SIZE,
        }
    }

    /// Decodes a packed date-time and returns it with the number of bytes
    /// consumed.
    pub fn deserialize(data: &[u8]) -> Result<(Self, usize)> {
        ensure!(
            data.len() >= DATE_PART_SERIALIZED_SIZE,
            "truncated date-time: {} bytes",
            data.len()
        );

        let date_word = u32::from_le_bytes(data[..4].try_into().unwrap());
        let has_time = date_word & 1 != 0;
        let day = ((date_word >> 1) & 0x1F) as u8;
        let month = ((date_word >> 6) & 0x0F) as u8;
        // sign-extend the 22-bit year
        let year = ((date_word >> 10) as i32) << 10 >> 10;
        validate_date(year, month, day)?;

        if !has_time {
            return Ok((
                Self {
                    year,
                    month,
                    day,
                    time: None,
                },
                DATE_PART_SERIALIZED_SIZE,
            ));
        }

        ensure!(
            data.len() >= MAX_SERIALIZED_SIZE,
            "truncated date-time: time part missing"
        );
        let time_word = u64::from_le_bytes(data[4..12].try_into().unwrap());
        let time = RawTime::unpack(time_word)?;

        Ok((
            Self {
                year,
                month,
                day,
                time: Some(time),
            },
            MAX_SERIALIZED_SIZE,
        ))
    }

    /// Parses the SQL-style text forms. Inputs of at most 10 characters
    /// (not counting a leading `-`) are parsed as date-only; longer inputs
    /// must carry a time of day.
    pub fn parse(text: &str) -> Result<Self> {
        let date_only_len = text.len() - usize::from(text.starts_with('-'));
        if date_only_len <= 10 {
            let (year, month, day) = parse_date_fields(text)?;
            return Self::new_date(year, month, day);
        }

        let (date_text, time_text) = text
            .split_once(' ')
            .ok_or_else(|| eyre::eyre!("invalid date-time literal '{}'", text))?;
        let (year, month, day) = parse_date_fields(date_text)?;

        let (hms, frac) = match time_text.split_once('.') {
            Some((hms, frac)) => (hms, Some(frac)),
            None => (time_text, None),
        };

        let mut parts = hms.split(':');
        let hours = parse_component(parts.next(), "hours")?;
        let minutes = parse_component(parts.next(), "minutes")?;
        let seconds = parse_component(parts.next(), "seconds")?;
        ensure!(parts.next().is_none(), "trailing time components in '{}'", text);

        let nanos = match frac {
            Some(f) => {
                ensure!(
                    !f.is_empty() && f.len() <= 9 && f.bytes().all(|b| b.is_ascii_digit()),
                    "invalid fractional seconds '{}'",
                    f
                );
                f.parse::<u32>()? * 10u32.pow(9 - f.len() as u32)
            }
            None => 0,
        };

        Self::new_date_time(year, month, day, RawTime::new(hours, minutes, seconds, nanos)?)
    }
}

impl PartialOrd for RawDateTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RawDateTime {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.year, self.month, self.day, self.time).cmp(&(
            other.year,
            other.month,
            other.day,
            other.time,
        ))
    }
}

impl fmt::Display for RawDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.year < 0 {
            write!(f, "-{:04}", self.year.unsigned_abs())?;
        } else {
            write!(f, "{:04}", self.year)?;
        }
        write!(f, "-{:02}-{:02}", self.month, self.day)?;
        if let Some(time) = self.time {
            write!(f, " {:02}:{:02}:{:02}", time.hours, time.minutes, time.seconds)?;
            if time.nanos != 0 {
                write!(f, ".{:09}", time.nanos)?;
            }
        }
        Ok(())
    }
}

fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

fn days_in_month(year: i32, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

fn validate_date(year: i32, month: u8, day: u8) -> Result<()> {
    ensure!(
        (MIN_YEAR..=MAX_YEAR).contains(&year),
        "year out of range: {}",
        year
    );
    ensure!((1..=12).contains(&month), "month out of range: {}", month);
    ensure!(
        day >= 1 && day <= days_in_month(year, month),
        "day out of range for {:04}-{:02}: {}",
        year,
        month,
        day
    );
    Ok(())
}

fn parse_date_fields(text: &str) -> Result<(i32, u8, u8)> {
    let (digits, negative) = match text.strip_prefix('-') {
        Some(rest) => (rest, true),
        None => (text, false),
    };
    let mut parts = digits.split('-');
    let year_text = parts
        .next()
        .ok_or_else(|| eyre::eyre!("invalid date literal '{}'", text))?;
    ensure!(
        !year_text.is_empty() && year_text.bytes().all(|b| b.is_ascii_digit()),
        "invalid year in '{}'",
        text
    );
    let mut year: i32 = year_text.parse()?;
    if negative {
        year = -year;
    }
    let month = parse_component(parts.next(), "month")?;
    let day = parse_component(parts.next(), "day")?;
    ensure!(parts.next().is_none(), "trailing date components in '{}'", text);
    Ok((year, month, day))
}

fn parse_component(part: Option<&str>, what: &str) -> Result<u8> {
    let part = part.ok_or_else(|| eyre::eyre!("missing {} component", what))?;
    ensure!(
        !part.is_empty() && part.len() <= 2 && part.bytes().all(|b| b.is_ascii_digit()),
        "invalid {} component '{}'",
        what,
        part
    );
    Ok(part.parse()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_only_roundtrip_is_four_bytes() {
        let dt = RawDateTime::new_date(2024, 2, 29).unwrap();
        let mut buf = Vec::new();
        assert_eq!(dt.serialize_into(&mut buf), 4);
        assert_eq!(buf.len(), 4);

        let (decoded, consumed) = RawDateTime::deserialize(&buf).unwrap();
        assert_eq!(consumed, 4);
        assert_eq!(decoded, dt);
        assert!(!decoded.has_time_part());
    }

    #[test]
    fn date_time_roundtrip_is_twelve_bytes() {
        let time = RawTime::new(23, 59, 59, 999_999_999).unwrap();
        let dt = RawDateTime::new_date_time(1999, 12, 31, time).unwrap();
        let mut buf = Vec::new();
        assert_eq!(dt.serialize_into(&mut buf), 12);

        let (decoded, consumed) = RawDateTime::deserialize(&buf).unwrap();
        assert_eq!(consumed, 12);
        assert_eq!(decoded, dt);
        assert_eq!(decoded.time().unwrap().nanos, 999_999_999);
    }

    #[test]
    fn negative_year_roundtrips() {
        let dt = RawDateTime::new_date(-44, 3, 15).unwrap();
        let mut buf = Vec::new();
        dt.serialize_into(&mut buf);

        let (decoded, _) = RawDateTime::deserialize(&buf).unwrap();
        assert_eq!(decoded.year(), -44);
    }

    #[test]
    fn invalid_dates_are_rejected() {
        assert!(RawDateTime::new_date(2023, 2, 29).is_err());
        assert!(RawDateTime::new_date(2024, 13, 1).is_err());
        assert!(RawDateTime::new_date(2024, 0, 1).is_err());
        assert!(RawDateTime::new_date(2024, 4, 31).is_err());
        assert!(RawTime::new(24, 0, 0, 0).is_err());
        assert!(RawTime::new(0, 0, 0, 1_000_000_000).is_err());
    }

    #[test]
    fn parse_short_input_as_date_only() {
        let dt = RawDateTime::parse("2024-06-01").unwrap();
        assert!(!dt.has_time_part());
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 6, 1));
    }

    #[test]
    fn parse_full_date_time() {
        let dt = RawDateTime::parse("2024-06-01 12:34:56.5").unwrap();
        let time = dt.time().unwrap();
        assert_eq!((time.hours, time.minutes, time.seconds), (12, 34, 56));
        assert_eq!(time.nanos, 500_000_000);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(RawDateTime::parse("notadate").is_err());
        assert!(RawDateTime::parse("2024-06-01x").is_err());
        assert!(RawDateTime::parse("2024-06-01 25:00:00").is_err());
        assert!(RawDateTime::parse("2024-06-01 12:34:56.1234567890").is_err());
    }

    #[test]
    fn display_roundtrips_through_parse() {
        let dt = RawDateTime::parse("2024-06-01 12:34:56.5").unwrap();
        assert_eq!(RawDateTime::parse(&dt.to_string()).unwrap(), dt);

        let d = RawDateTime::parse("0001-01-01").unwrap();
        assert_eq!(RawDateTime::parse(&d.to_string()).unwrap(), d);
    }

    #[test]
    fn negative_year_text_roundtrips() {
        let dt = RawDateTime::new_date(-44, 3, 15).unwrap();
        assert_eq!(dt.to_string(), "-0044-03-15");
        assert_eq!(RawDateTime::parse("-0044-03-15").unwrap(), dt);

        let time = RawTime::new(8, 30, 0, 0).unwrap();
        let dt = RawDateTime::new_date_time(-44, 3, 15, time).unwrap();
        assert_eq!(RawDateTime::parse(&dt.to_string()).unwrap(), dt);

        assert!(RawDateTime::parse("--44-03-15").is_err());
    }

    #[test]
    fn date_only_sorts_before_midnight() {
        let d = RawDateTime::new_date(2024, 6, 1).unwrap();
        let midnight =
            RawDateTime::new_date_time(2024, 6, 1, RawTime::new(0, 0, 0, 0).unwrap()).unwrap();
        assert!(d < midnight);
        assert_ne!(d, midnight);
    }

    #[test]
    fn day_of_week_known_dates() {
        // 2024-06-01 was a Saturday
        assert_eq!(RawDateTime::new_date(2024, 6, 1).unwrap().day_of_week(), 6);
        // 2000-01-01 was a Saturday
        assert_eq!(RawDateTime::new_date(2000, 1, 1).unwrap().day_of_week(), 6);
        // 1970-01-01 was a Thursday
        assert_eq!(RawDateTime::new_date(1970, 1, 1).unwrap().day_of_week(), 4);
    }
}
