//! Parsing of duration strings such as `4h0m0s`, `1.5h` or `300ms`.
//!
//! Durations are written as a sequence of decimal numbers, each with an
//! optional fraction and a unit suffix.  Valid units are `ns`, `us` (or
//! `µs`), `ms`, `s`, `m` and `h`.  A bare `0` is accepted without a unit.

use std::time::Duration;

use thiserror::Error;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// A duration string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid duration {input:?}: {reason}")]
pub struct DurationError {
    /// The rejected input.
    pub input: String,
    /// What is wrong with it.
    pub reason: &'static str,
}

/// Parses a duration string.
///
/// ```rust,ignore
/// assert_eq!(parse_duration("1m30s")?, Duration::from_secs(90));
/// ```
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let fail = |reason| DurationError {
        input: input.to_string(),
        reason,
    };

    let mut rest = input.strip_prefix('+').unwrap_or(input);
    if rest.starts_with('-') {
        return Err(fail("negative durations are not allowed"));
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(fail("empty duration"));
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let split = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(split);

        let split = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(split);

        let scale = unit_scale(unit).ok_or_else(|| {
            fail(if unit.is_empty() {
                "missing unit"
            } else {
                "unknown unit"
            })
        })?;
        let nanos = scaled(number, scale).ok_or_else(|| fail("invalid number"))?;
        total = total
            .checked_add(nanos)
            .ok_or_else(|| fail("duration out of range"))?;

        rest = tail;
    }

    let secs = u64::try_from(total / NANOS_PER_SEC).map_err(|_| fail("duration out of range"))?;
    // Always below one billion.
    let nanos = (total % NANOS_PER_SEC) as u32;
    Ok(Duration::new(secs, nanos))
}

fn unit_scale(unit: &str) -> Option<u128> {
    let scale = match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => NANOS_PER_SEC,
        "m" => 60 * NANOS_PER_SEC,
        "h" => 3_600 * NANOS_PER_SEC,
        _ => return None,
    };
    Some(scale)
}

/// Converts `whole[.fraction]` in units of `scale` nanoseconds.
fn scaled(number: &str, scale: u128) -> Option<u128> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
        return None;
    }

    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos = whole.checked_mul(scale)?;

    let mut place = scale;
    for digit in fraction.bytes() {
        place /= 10;
        if place == 0 {
            break;
        }
        nanos = nanos.checked_add(u128::from(digit - b'0') * place)?;
    }
    Some(nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_durations() {
        let cases = [
            ("0", Duration::ZERO),
            ("0s", Duration::ZERO),
            ("4h0m0s", Duration::from_secs(4 * 3600)),
            ("5m0s", Duration::from_secs(300)),
            ("1m30s", Duration::from_secs(90)),
            ("300ms", Duration::from_millis(300)),
            ("1.5h", Duration::from_secs(5400)),
            (".5s", Duration::from_millis(500)),
            ("10us", Duration::from_micros(10)),
            ("10µs", Duration::from_micros(10)),
            ("7ns", Duration::from_nanos(7)),
            ("+2s", Duration::from_secs(2)),
        ];
        for (input, expected) in cases {
            assert_eq!(parse_duration(input), Ok(expected), "input {input:?}");
        }
    }

    #[test]
    fn test_parse_invalid_durations() {
        let cases = [
            ("", "empty duration"),
            ("10", "missing unit"),
            ("3d", "unknown unit"),
            ("-1s", "negative durations are not allowed"),
            ("1.2.3s", "invalid number"),
            ("s", "invalid number"),
            ("340282366920938463463374607431.9s", "invalid number"),
            ("99999999999999999999999h", "duration out of range"),
        ];
        for (input, reason) in cases {
            let err = parse_duration(input).unwrap_err();
            assert_eq!(err.reason, reason, "input {input:?}");
        }
    }
}
