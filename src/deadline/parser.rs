//! User timeout extraction and duration parsing.
//!
//! # Grammar
//! ```text
//! duration  := sign? ( "0" | component+ )
//! sign      := "+" | "-"
//! component := number unit
//! number    := digits ( "." digits? )? | "." digits
//! unit      := "ns" | "us" | "µs" | "μs" | "ms" | "s" | "m" | "h"
//! ```
//!
//! Fractions truncate to whole nanoseconds. Totals above `i64::MAX`
//! nanoseconds are rejected.

use std::time::Duration;

/// Query key carrying the user-requested timeout.
pub const TIMEOUT_QUERY_KEY: &str = "timeout";

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SECOND: u128 = 1_000_000_000;
const MAX_NANOS: u128 = i64::MAX as u128;

/// Fraction digits beyond this cannot change a nanosecond result.
const MAX_FRACTION_DIGITS: usize = 18;

/// Error returned by [`parse_duration`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    #[error("invalid duration {0:?}")]
    Invalid(String),
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },
    #[error("duration {0:?} is out of range")]
    Overflow(String),
    #[error("duration {0:?} is negative")]
    Negative(String),
}

/// Outcome of reading the `timeout` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserTimeout {
    /// No `timeout` key in the query.
    Absent,
    /// Present but not a valid duration.
    Malformed,
    /// Parsed to zero or a negative value.
    NonPositive,
    /// Strictly positive duration.
    Valid(Duration),
}

impl UserTimeout {
    /// Classify the `timeout` value of a raw query string. Never fails.
    pub fn from_query(query: Option<&str>) -> Self {
        match timeout_query_value(query) {
            Some(raw) => Self::from_value(&raw),
            None => Self::Absent,
        }
    }

    /// Classify an already extracted `timeout` value.
    pub fn from_value(raw: &str) -> Self {
        match parse_duration(raw) {
            Ok(duration) if duration.is_zero() => Self::NonPositive,
            Ok(duration) => Self::Valid(duration),
            Err(DurationError::Negative(_)) => Self::NonPositive,
            Err(err) => {
                tracing::debug!(value = %raw, error = %err, "Ignoring malformed timeout parameter");
                Self::Malformed
            }
        }
    }

    /// The usable duration, if any.
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Self::Valid(duration) => Some(*duration),
            _ => None,
        }
    }

    /// Label used for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Malformed => "malformed",
            Self::NonPositive => "non_positive",
            Self::Valid(_) => "valid",
        }
    }
}

/// First decoded value of the `timeout` key, if present.
pub fn timeout_query_value(query: Option<&str>) -> Option<String> {
    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == TIMEOUT_QUERY_KEY)
        .map(|(_, value)| value.into_owned())
}

/// Parse a duration such as `300ms`, `1.5h` or `5m2s`.
///
/// Negative non-zero values are reported as [`DurationError::Negative`]
/// rather than silently clamped.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let (negative, mut rest) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };

    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(DurationError::Invalid(input.to_string()));
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let (whole, after) = split_digits(rest);
        let (fraction, after) = match after.strip_prefix('.') {
            Some(tail) => split_digits(tail),
            None => ("", after),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(DurationError::Invalid(input.to_string()));
        }

        let unit_len = after
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(after.len());
        let (unit, tail) = after.split_at(unit_len);
        if unit.is_empty() {
            return Err(DurationError::MissingUnit(input.to_string()));
        }
        let scale = unit_nanos(unit).ok_or_else(|| DurationError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        let component = component_nanos(whole, fraction, scale)
            .ok_or_else(|| DurationError::Overflow(input.to_string()))?;
        total = total
            .checked_add(component)
            .filter(|total| *total <= MAX_NANOS)
            .ok_or_else(|| DurationError::Overflow(input.to_string()))?;

        rest = tail;
    }

    if negative && total > 0 {
        return Err(DurationError::Negative(input.to_string()));
    }

    let secs = (total / NANOS_PER_SECOND) as u64;
    let nanos = (total % NANOS_PER_SECOND) as u32;
    Ok(Duration::new(secs, nanos))
}

fn split_digits(s: &str) -> (&str, &str) {
    let len = s.bytes().take_while(u8::is_ascii_digit).count();
    s.split_at(len)
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "\u{00b5}s" | "\u{03bc}s" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(60 * NANOS_PER_SECOND),
        "h" => Some(3_600 * NANOS_PER_SECOND),
        _ => None,
    }
}

fn component_nanos(whole: &str, fraction: &str, scale: u128) -> Option<u128> {
    let whole_value = if whole.is_empty() {
        0
    } else {
        whole.parse::<u64>().ok()? as u128
    };
    let mut nanos = whole_value.checked_mul(scale)?;

    let fraction = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
    if !fraction.is_empty() {
        let digits = fraction.parse::<u128>().ok()?;
        let divisor = 10u128.pow(fraction.len() as u32);
        nanos = nanos.checked_add(digits * scale / divisor)?;
    }

    (nanos <= MAX_NANOS).then_some(nanos)
}
