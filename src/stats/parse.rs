//! Scalar value grammars for raw statistics fields.
//!
//! Every parser looks a key up in a [`Record`] and converts the raw text into
//! an `f64`. A missing key is reported as [`ParseError::KeyAbsent`], which
//! callers treat as "not applicable to this server" rather than a failure.

use thiserror::Error;
use tracing::{debug, error};

use super::Record;

/// Sub-second ticks per second in split-duration values.
const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Errors that can occur while reading a statistics field.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("key {key:?} not found")]
    KeyAbsent { key: String },

    #[error("field {key:?}: {value:?} is not a number")]
    MalformedNumber { key: String, value: String },

    #[error("field {key:?}: {value:?} is not yes or no")]
    MalformedBoolean { key: String, value: String },

    #[error("field {key:?}: {value:?} is not a <seconds>.<microseconds> duration")]
    MalformedDuration { key: String, value: String },
}

impl ParseError {
    /// Whether the error only signals a missing key.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::KeyAbsent { .. })
    }
}

/// Value grammar used to read a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    /// Plain floating point number.
    Number,
    /// `yes` or `no`.
    Flag,
    /// `<seconds>.<microseconds>`, as used by `rusage_user`/`rusage_system`.
    Timeval,
}

impl Grammar {
    /// Reads `key` from `record` with this grammar.
    pub fn parse(self, record: &Record, key: &str) -> Result<f64, ParseError> {
        match self {
            Self::Number => parse_number(record, key),
            Self::Flag => parse_flag(record, key),
            Self::Timeval => parse_timeval(record, key),
        }
    }
}

fn lookup<'a>(record: &'a Record, key: &str) -> Result<&'a str, ParseError> {
    match record.get(key) {
        Some(value) => Ok(value.as_str()),
        None => {
            debug!(key, "key not found");
            Err(ParseError::KeyAbsent {
                key: key.to_string(),
            })
        }
    }
}

/// Parses a numeric field.
pub fn parse_number(record: &Record, key: &str) -> Result<f64, ParseError> {
    let value = lookup(record, key)?;

    value.parse::<f64>().map_err(|e| {
        error!(key, value, error = %e, "failed to parse number");
        ParseError::MalformedNumber {
            key: key.to_string(),
            value: value.to_string(),
        }
    })
}

/// Parses a `yes`/`no` field into 1.0/0.0.
pub fn parse_flag(record: &Record, key: &str) -> Result<f64, ParseError> {
    let value = lookup(record, key)?;

    match value {
        "yes" => Ok(1.0),
        "no" => Ok(0.0),
        _ => {
            error!(key, value, "failed to parse flag");
            Err(ParseError::MalformedBoolean {
                key: key.to_string(),
                value: value.to_string(),
            })
        }
    }
}

/// Parses a `<seconds>.<microseconds>` field into fractional seconds.
pub fn parse_timeval(record: &Record, key: &str) -> Result<f64, ParseError> {
    let value = lookup(record, key)?;

    let malformed = || {
        error!(key, value, "failed to parse timeval");
        ParseError::MalformedDuration {
            key: key.to_string(),
            value: value.to_string(),
        }
    };

    let mut parts = value.split('.');
    let (Some(seconds), Some(micros), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(malformed());
    };

    let seconds = parse_digits(seconds).ok_or_else(malformed)?;
    let micros = parse_digits(micros).ok_or_else(malformed)?;

    Ok(seconds + micros / MICROS_PER_SECOND)
}

/// Reads a non-empty run of ASCII digits of any length.
fn parse_digits(digits: &str) -> Option<f64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Sums several numeric fields. Fails on the first absent or malformed key.
pub fn sum(record: &Record, keys: &[&str]) -> Result<f64, ParseError> {
    keys.iter()
        .try_fold(0.0, |acc, key| Ok(acc + parse_number(record, key)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::record;

    #[test]
    fn test_parse_number() {
        let r = record(&[("bytes", "1024"), ("ratio", "0.5"), ("bad", "12abc")]);

        assert_eq!(parse_number(&r, "bytes"), Ok(1024.0));
        assert_eq!(parse_number(&r, "ratio"), Ok(0.5));
        assert!(matches!(
            parse_number(&r, "bad"),
            Err(ParseError::MalformedNumber { .. })
        ));
    }

    #[test]
    fn test_absent_key_is_distinguishable() {
        let r = Record::new();

        for grammar in [Grammar::Number, Grammar::Flag, Grammar::Timeval] {
            let err = grammar.parse(&r, "missing").expect_err("key is absent");
            assert!(err.is_absent());
        }
    }

    #[test]
    fn test_parse_flag() {
        let r = record(&[("on", "yes"), ("off", "no"), ("upper", "YES"), ("num", "1")]);

        assert_eq!(parse_flag(&r, "on"), Ok(1.0));
        assert_eq!(parse_flag(&r, "off"), Ok(0.0));
        assert!(matches!(
            parse_flag(&r, "upper"),
            Err(ParseError::MalformedBoolean { .. })
        ));
        assert!(matches!(
            parse_flag(&r, "num"),
            Err(ParseError::MalformedBoolean { .. })
        ));
    }

    #[test]
    fn test_parse_timeval() {
        let r = record(&[
            ("whole", "12.000000"),
            ("frac", "3.250000"),
            ("short", "1.5"),
        ]);

        assert_eq!(parse_timeval(&r, "whole"), Ok(12.0));
        assert_eq!(parse_timeval(&r, "frac"), Ok(3.25));
        // Sub-second part is always in microseconds, not a decimal fraction.
        assert_eq!(parse_timeval(&r, "short"), Ok(1.000005));
    }

    #[test]
    fn test_parse_timeval_property() {
        for seconds in [0u64, 1, 59, 86_400, 1_700_000_000] {
            for micros in [0u64, 1, 999, 500_000, 999_999] {
                let r = record(&[("t", &format!("{seconds}.{micros}"))]);
                let expected = seconds as f64 + micros as f64 / 1_000_000.0;
                assert_eq!(parse_timeval(&r, "t"), Ok(expected));
            }
        }
    }

    #[test]
    fn test_parse_timeval_huge_seconds() {
        let r = record(&[("t", "99999999999999999999.5")]);

        let parsed = parse_timeval(&r, "t").expect("digits of any length");
        assert_eq!(parsed, 99999999999999999999.0 + 0.000005);
        assert!(parsed > u64::MAX as f64);
    }

    #[test]
    fn test_parse_timeval_malformed() {
        for raw in ["12", "1.2.3", "a.5", "5.b", "", ".", "1.", "-1.5", "+1.5", "1.5e3"] {
            let r = record(&[("t", raw)]);
            assert!(
                matches!(
                    parse_timeval(&r, "t"),
                    Err(ParseError::MalformedDuration { .. })
                ),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_sum() {
        let r = record(&[("a", "3"), ("b", "2"), ("c", "1"), ("bad", "x")]);

        assert_eq!(sum(&r, &["a", "b", "c"]), Ok(6.0));
        assert_eq!(sum(&r, &[]), Ok(0.0));
        assert!(sum(&r, &["a", "missing"])
            .expect_err("missing key")
            .is_absent());
        assert!(matches!(
            sum(&r, &["a", "bad"]),
            Err(ParseError::MalformedNumber { .. })
        ));
    }
}
