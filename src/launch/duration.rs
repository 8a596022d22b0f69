//! Parsing for Go-style duration strings (`300ms`, `1.5h`, `1h30m`).

use std::iter::Peekable;
use std::str::Chars;
use std::time::Duration;

use thiserror::Error;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SECOND: u128 = 1_000_000_000;
const NANOS_PER_MINUTE: u128 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MINUTE;

// Fractional digits past this scale cannot change a nanosecond count.
const MAX_FRACTION_SCALE: u128 = 1_000_000_000_000_000_000;

/// Errors raised while parsing a duration string.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DurationParseError {
    /// The text is empty or is not a sequence of number and unit pairs.
    #[error("invalid duration {0:?}")]
    Invalid(String),
    /// A number was not followed by a unit.
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),
    /// A unit outside `ns`, `us`, `ms`, `s`, `m`, `h` was used.
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit {
        /// Unit as written.
        unit: String,
        /// Full input text.
        input: String,
    },
    /// The duration is below zero.
    #[error("negative duration {0:?} is not supported")]
    Negative(String),
    /// The duration does not fit in a signed 64-bit nanosecond count.
    #[error("duration {0:?} is out of range")]
    Overflow(String),
}

/// Parses a duration such as `5m`, `90s`, `1h30m` or `1.5h`.
///
/// A leading `+` is accepted. A leading `-` is only accepted for zero
/// durations because [`Duration`] cannot be negative. The bare string `0`
/// parses as zero.
///
/// # Errors
///
/// Returns [`DurationParseError`] describing the first problem found.
pub fn parse_duration(text: &str) -> Result<Duration, DurationParseError> {
    let mut chars = text.chars().peekable();
    let negative = match chars.peek() {
        Some(&'-') => {
            chars.next();
            true
        }
        Some(&'+') => {
            chars.next();
            false
        }
        _ => false,
    };

    let remainder: String = chars.clone().collect();
    if remainder == "0" {
        return Ok(Duration::ZERO);
    }
    if remainder.is_empty() {
        return Err(DurationParseError::Invalid(text.to_owned()));
    }

    let mut total: u128 = 0;
    while chars.peek().is_some() {
        let component = parse_component(&mut chars, text)?;
        total = total
            .checked_add(component)
            .ok_or_else(|| DurationParseError::Overflow(text.to_owned()))?;
    }

    if negative && total > 0 {
        return Err(DurationParseError::Negative(text.to_owned()));
    }

    let nanos = u64::try_from(total)
        .ok()
        .filter(|value| *value <= i64::MAX.unsigned_abs())
        .ok_or_else(|| DurationParseError::Overflow(text.to_owned()))?;
    Ok(Duration::from_nanos(nanos))
}

fn parse_component(chars: &mut Peekable<Chars<'_>>, text: &str) -> Result<u128, DurationParseError> {
    let overflow = || DurationParseError::Overflow(text.to_owned());

    let mut whole: u128 = 0;
    let mut whole_digits = 0_usize;
    while let Some(digit) = chars.peek().and_then(|ch| ch.to_digit(10)) {
        chars.next();
        whole = whole
            .checked_mul(10)
            .and_then(|value| value.checked_add(u128::from(digit)))
            .ok_or_else(overflow)?;
        whole_digits += 1;
    }

    let mut fraction: u128 = 0;
    let mut scale: u128 = 1;
    let mut fraction_digits = 0_usize;
    if chars.peek() == Some(&'.') {
        chars.next();
        while let Some(digit) = chars.peek().and_then(|ch| ch.to_digit(10)) {
            chars.next();
            if scale < MAX_FRACTION_SCALE {
                fraction = fraction * 10 + u128::from(digit);
                scale *= 10;
            }
            fraction_digits += 1;
        }
    }

    if whole_digits == 0 && fraction_digits == 0 {
        return Err(DurationParseError::Invalid(text.to_owned()));
    }

    let mut unit = String::new();
    while let Some(&ch) = chars.peek() {
        if ch == '.' || ch.is_ascii_digit() {
            break;
        }
        unit.push(ch);
        chars.next();
    }
    if unit.is_empty() {
        return Err(DurationParseError::MissingUnit(text.to_owned()));
    }

    let per_unit = unit_nanos(&unit).ok_or_else(|| DurationParseError::UnknownUnit {
        unit: unit.clone(),
        input: text.to_owned(),
    })?;

    let whole_nanos = whole.checked_mul(per_unit).ok_or_else(overflow)?;
    let fraction_nanos = fraction
        .checked_mul(per_unit)
        .and_then(|value| value.checked_div(scale))
        .ok_or_else(overflow)?;
    whole_nanos.checked_add(fraction_nanos).ok_or_else(overflow)
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(NANOS_PER_MINUTE),
        "h" => Some(NANOS_PER_HOUR),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("5m", Duration::from_secs(300))]
    #[case("90s", Duration::from_secs(90))]
    #[case("1h30m", Duration::from_secs(5_400))]
    #[case("1.5h", Duration::from_secs(5_400))]
    #[case("300ms", Duration::from_millis(300))]
    #[case("2us", Duration::from_micros(2))]
    #[case("+10s", Duration::from_secs(10))]
    #[case("0", Duration::ZERO)]
    #[case("-0", Duration::ZERO)]
    #[case(".5s", Duration::from_millis(500))]
    fn parses_go_style_durations(#[case] input: &str, #[case] expected: Duration) {
        assert_eq!(parse_duration(input), Ok(expected));
    }

    #[rstest]
    #[case("")]
    #[case("m")]
    #[case(".s")]
    #[case("-")]
    fn rejects_malformed_text(#[case] input: &str) {
        assert_eq!(
            parse_duration(input),
            Err(DurationParseError::Invalid(input.to_owned()))
        );
    }

    #[test]
    fn rejects_missing_unit() {
        assert_eq!(
            parse_duration("5"),
            Err(DurationParseError::MissingUnit(String::from("5")))
        );
    }

    #[test]
    fn rejects_unknown_unit() {
        let err = parse_duration("5 minutes").expect_err("space is not a unit");
        assert!(
            matches!(err, DurationParseError::UnknownUnit { ref unit, .. } if unit == " minutes"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn rejects_negative_durations() {
        assert_eq!(
            parse_duration("-5m"),
            Err(DurationParseError::Negative(String::from("-5m")))
        );
    }

    #[test]
    fn rejects_durations_beyond_int64_nanoseconds() {
        assert_eq!(
            parse_duration("3000000h"),
            Err(DurationParseError::Overflow(String::from("3000000h")))
        );
    }
}
