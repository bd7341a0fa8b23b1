//! Date, time and datetime values.

use crate::decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Maximum number of hours in a TIME value.
pub const TIME_MAX_HOUR: u32 = 838;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemporalKind {
    Date,
    Time,
    DateTime,
}

impl TemporalKind {
    /// Kind able to hold both `self` and `other`.
    pub fn merge(self, other: TemporalKind) -> TemporalKind {
        if self == other {
            self
        } else {
            TemporalKind::DateTime
        }
    }

    /// Digits of the packed numeric form left of the decimal point.
    pub fn int_digits(&self) -> u8 {
        match self {
            TemporalKind::Date => 8,
            TemporalKind::Time => 7,
            TemporalKind::DateTime => 14,
        }
    }

    /// Display width without fractional seconds.
    pub fn max_length(&self) -> u32 {
        match self {
            TemporalKind::Date => 10,
            TemporalKind::Time => 10,
            TemporalKind::DateTime => 19,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TemporalKind::Date => "DATE",
            TemporalKind::Time => "TIME",
            TemporalKind::DateTime => "DATETIME",
        }
    }
}

/// A DATE, TIME or DATETIME value with microsecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Temporal {
    kind: TemporalKind,
    negative: bool,
    year: u16,
    month: u8,
    day: u8,
    hour: u32,
    minute: u8,
    second: u8,
    micros: u32,
}

fn valid_date(year: u16, month: u8, day: u8) -> bool {
    year <= 9999 && (1..=12).contains(&month) && (1..=31).contains(&day)
}

fn valid_clock(hour: u32, minute: u8, second: u8, micros: u32, max_hour: u32) -> bool {
    hour <= max_hour && minute < 60 && second < 60 && micros < 1_000_000
}

fn number(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn fraction(text: &str) -> Option<u32> {
    if text.is_empty() || text.len() > 6 {
        return None;
    }
    let digits = number(text)?;
    Some(digits * 10u32.pow(6 - text.len() as u32))
}

impl Temporal {
    pub fn date(year: u16, month: u8, day: u8) -> Option<Temporal> {
        valid_date(year, month, day).then_some(Temporal {
            kind: TemporalKind::Date,
            negative: false,
            year,
            month,
            day,
            hour: 0,
            minute: 0,
            second: 0,
            micros: 0,
        })
    }

    pub fn time(negative: bool, hour: u32, minute: u8, second: u8, micros: u32) -> Option<Temporal> {
        valid_clock(hour, minute, second, micros, TIME_MAX_HOUR).then_some(Temporal {
            kind: TemporalKind::Time,
            negative: negative && (hour, minute, second, micros) != (0, 0, 0, 0),
            year: 0,
            month: 0,
            day: 0,
            hour,
            minute,
            second,
            micros,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn datetime(
        year: u16,
        month: u8,
        day: u8,
        hour: u32,
        minute: u8,
        second: u8,
        micros: u32,
    ) -> Option<Temporal> {
        (valid_date(year, month, day) && valid_clock(hour, minute, second, micros, 23)).then_some(
            Temporal {
                kind: TemporalKind::DateTime,
                negative: false,
                year,
                month,
                day,
                hour,
                minute,
                second,
                micros,
            },
        )
    }

    /// Parses `YYYY-MM-DD`, `[-]HH:MM:SS[.ffffff]` or
    /// `YYYY-MM-DD HH:MM:SS[.ffffff]` (a `T` separator is accepted).
    pub fn parse(text: &str) -> Option<Temporal> {
        let text = text.trim();
        if let Some((date, clock)) = text.split_once([' ', 'T']) {
            let (year, month, day) = Self::parse_date(date)?;
            let (negative, hour, minute, second, micros) = Self::parse_clock(clock)?;
            if negative {
                return None;
            }
            return Temporal::datetime(year, month, day, hour, minute, second, micros);
        }
        if text.contains(':') {
            let (negative, hour, minute, second, micros) = Self::parse_clock(text)?;
            return Temporal::time(negative, hour, minute, second, micros);
        }
        let (year, month, day) = Self::parse_date(text)?;
        Temporal::date(year, month, day)
    }

    fn parse_date(text: &str) -> Option<(u16, u8, u8)> {
        let mut parts = text.splitn(3, '-');
        let year = number(parts.next()?)?;
        let month = number(parts.next()?)?;
        let day = number(parts.next()?)?;
        Some((
            u16::try_from(year).ok()?,
            u8::try_from(month).ok()?,
            u8::try_from(day).ok()?,
        ))
    }

    fn parse_clock(text: &str) -> Option<(bool, u32, u8, u8, u32)> {
        let (negative, text) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (clock, micros) = match text.split_once('.') {
            Some((clock, frac)) => (clock, fraction(frac)?),
            None => (text, 0),
        };
        let mut parts = clock.splitn(3, ':');
        let hour = number(parts.next()?)?;
        let minute = number(parts.next()?)?;
        let second = match parts.next() {
            Some(s) => number(s)?,
            None => 0,
        };
        Some((
            negative,
            hour,
            u8::try_from(minute).ok()?,
            u8::try_from(second).ok()?,
            micros,
        ))
    }

    pub fn kind(&self) -> TemporalKind {
        self.kind
    }

    pub fn micros(&self) -> u32 {
        self.micros
    }

    /// Converts to another kind: a date gains midnight, a time gains the
    /// zero date, and narrowing drops the unused fields.
    pub fn to_kind(&self, kind: TemporalKind) -> Temporal {
        let mut out = *self;
        out.kind = kind;
        match kind {
            TemporalKind::Date => {
                out.negative = false;
                out.hour = 0;
                out.minute = 0;
                out.second = 0;
                out.micros = 0;
            }
            TemporalKind::Time => {
                out.year = 0;
                out.month = 0;
                out.day = 0;
            }
            TemporalKind::DateTime => {
                if self.kind == TemporalKind::Time {
                    out.negative = false;
                    out.hour = self.hour % 24;
                }
            }
        }
        out
    }

    fn sort_key(&self) -> i128 {
        let date = self.year as i128 * 10_000 + self.month as i128 * 100 + self.day as i128;
        let clock = ((self.hour as i128 * 60 + self.minute as i128) * 60 + self.second as i128)
            * 1_000_000
            + self.micros as i128;
        let key = date * 1_000_000_000_000_000 + clock;
        if self.negative {
            -key
        } else {
            key
        }
    }

    /// Chronological comparison after converting both sides to a common kind.
    pub fn compare(&self, other: &Temporal) -> Ordering {
        let kind = self.kind.merge(other.kind);
        self.to_kind(kind).sort_key().cmp(&other.to_kind(kind).sort_key())
    }

    /// Packed numeric form: `YYYYMMDD`, `hhmmss[.ffffff]` or `YYYYMMDDhhmmss[.ffffff]`.
    pub fn to_decimal(&self, fsp: u8) -> Decimal {
        let fsp = fsp.min(6);
        let text = format!("{}{}", if self.negative { "-" } else { "" }, self.packed_digits(fsp));
        Decimal::parse(&text).0
    }

    /// Packed numeric form without fractional seconds.
    pub fn to_i64(&self) -> i64 {
        let clock = self.hour as i64 * 10_000 + self.minute as i64 * 100 + self.second as i64;
        let date = self.year as i64 * 10_000 + self.month as i64 * 100 + self.day as i64;
        let value = match self.kind {
            TemporalKind::Date => date,
            TemporalKind::Time => clock,
            TemporalKind::DateTime => date * 1_000_000 + clock,
        };
        if self.negative {
            -value
        } else {
            value
        }
    }

    fn packed_digits(&self, fsp: u8) -> String {
        let date = format!("{:04}{:02}{:02}", self.year, self.month, self.day);
        let clock = format!("{:02}{:02}{:02}", self.hour, self.minute, self.second);
        let mut out = match self.kind {
            TemporalKind::Date => return date,
            TemporalKind::Time => clock,
            TemporalKind::DateTime => date + &clock,
        };
        if fsp > 0 {
            let frac = format!("{:06}", self.micros);
            out.push('.');
            out.push_str(&frac[..fsp as usize]);
        }
        out
    }

    /// ISO text with `fsp` fractional-second digits.
    pub fn format(&self, fsp: u8) -> String {
        let fsp = fsp.min(6) as usize;
        let frac = if fsp > 0 && self.kind != TemporalKind::Date {
            format!(".{}", &format!("{:06}", self.micros)[..fsp])
        } else {
            String::new()
        };
        match self.kind {
            TemporalKind::Date => format!("{:04}-{:02}-{:02}", self.year, self.month, self.day),
            TemporalKind::Time => format!(
                "{}{:02}:{:02}:{:02}{}",
                if self.negative { "-" } else { "" },
                self.hour,
                self.minute,
                self.second,
                frac
            ),
            TemporalKind::DateTime => format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}{}",
                self.year, self.month, self.day, self.hour, self.minute, self.second, frac
            ),
        }
    }
}

impl fmt::Display for Temporal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fsp = if self.micros == 0 { 0 } else { 6 };
        f.write_str(&self.format(fsp))
    }
}
