use std::{str::FromStr, time::Duration};

/// A timeout as configured at a single scope.
///
/// `Unset` is distinct from a zero duration: an unset setting defers to the
/// next scope and, when every scope is unset, is omitted from rendered
/// configuration entirely.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Setting {
    #[default]
    Unset,

    /// Explicitly disabled (`infinity`). Rendered as a zero duration, which the
    /// proxy reads as "no timeout".
    Disabled,

    Value(Duration),
}

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("invalid unit: {}", EXPECTED_UNITS)]
    InvalidUnit,

    #[error("missing a unit: {}", EXPECTED_UNITS)]
    NoUnit,

    #[error("invalid floating-point number: {}", .0)]
    NotANumber(#[from] std::num::ParseFloatError),

    #[error("timeouts cannot be negative")]
    Negative,

    #[error("timeout is too large")]
    Overflow,
}

const EXPECTED_UNITS: &str = "expected one of 'ns', 'us', '\u{00b5}s', 'ms', 's', 'm', or 'h'";

/// The listener-scoped timeouts applied to the HTTP connection manager.
///
/// The same type describes both the listener's explicit values and the
/// process-wide defaults; see [`TimeoutPolicy::resolve`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TimeoutPolicy {
    pub connection_idle: Setting,
    pub stream_idle: Setting,
    pub max_connection_duration: Setting,
    pub connection_shutdown_grace_period: Setting,
}

/// Concrete listener timeouts. `None` fields are not rendered.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedTimeouts {
    pub connection_idle: Option<Duration>,
    pub stream_idle: Option<Duration>,
    pub max_connection_duration: Option<Duration>,
    pub connection_shutdown_grace_period: Option<Duration>,
}

/// Timeouts declared on a single route.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RouteTimeouts {
    pub response: Setting,
    pub idle: Setting,
}

// === impl Setting ===

impl Setting {
    #[inline]
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Returns `self` unless it is unset, in which case `fallback` is used.
    #[inline]
    #[must_use]
    pub fn or(self, fallback: Self) -> Self {
        match self {
            Self::Unset => fallback,
            setting => setting,
        }
    }

    /// The duration to render, if any.
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Self::Unset => None,
            Self::Disabled => Some(Duration::ZERO),
            Self::Value(duration) => Some(*duration),
        }
    }
}

impl From<Duration> for Setting {
    fn from(duration: Duration) -> Self {
        Self::Value(duration)
    }
}

impl FromStr for Setting {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Ok(Self::Unset),
            "infinity" | "infinite" => Ok(Self::Disabled),
            s => parse_duration(s).map(Self::Value),
        }
    }
}

/// Parses a Go `time.Duration` string, e.g. `1h2m3.5s`.
fn parse_duration(mut s: &str) -> Result<Duration, ParseError> {
    fn duration_from_units(val: f64, unit: &str) -> Result<Duration, ParseError> {
        const MINUTE: Duration = Duration::from_secs(60);
        let base = match unit {
            "ns" => Duration::from_nanos(1),
            // U+00B5 is the "micro sign" while U+03BC is "Greek letter mu"
            "us" | "\u{00b5}s" | "\u{03bc}s" => Duration::from_micros(1),
            "ms" => Duration::from_millis(1),
            "s" => Duration::from_secs(1),
            "m" => MINUTE,
            "h" => MINUTE * 60,
            _ => return Err(ParseError::InvalidUnit),
        };
        Duration::try_from_secs_f64(base.as_secs_f64() * val)
            .map_err(|_| ParseError::Overflow)
    }

    if s.starts_with('-') {
        return Err(ParseError::Negative);
    }
    s = s.trim_start_matches('+');
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    while !s.is_empty() {
        let Some(unit_start) = s.find(|c: char| c.is_alphabetic()) else {
            return Err(ParseError::NoUnit);
        };
        let (val, rest) = s.split_at(unit_start);
        let val = val.parse::<f64>()?;
        let unit = match rest.find(|c: char| !c.is_alphabetic()) {
            Some(next_numeric_start) => {
                let (unit, rest) = rest.split_at(next_numeric_start);
                s = rest;
                unit
            }
            None => {
                s = "";
                rest
            }
        };
        total = total
            .checked_add(duration_from_units(val, unit)?)
            .ok_or(ParseError::Overflow)?;
    }

    Ok(total)
}

// === impl TimeoutPolicy ===

impl TimeoutPolicy {
    /// Resolves each field independently: the value at this (listener) scope
    /// wins, then the process-wide `defaults`, otherwise the field is absent.
    pub fn resolve(&self, defaults: &TimeoutPolicy) -> ResolvedTimeouts {
        ResolvedTimeouts {
            connection_idle: self.connection_idle.or(defaults.connection_idle).duration(),
            stream_idle: self.stream_idle.or(defaults.stream_idle).duration(),
            max_connection_duration: self
                .max_connection_duration
                .or(defaults.max_connection_duration)
                .duration(),
            connection_shutdown_grace_period: self
                .connection_shutdown_grace_period
                .or(defaults.connection_shutdown_grace_period)
                .duration(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);
    const HOUR: Duration = Duration::from_secs(60 * 60);

    #[test]
    fn parses_settings() {
        let cases: &[(&str, Setting)] = &[
            ("", Setting::Unset),
            ("  ", Setting::Unset),
            ("infinity", Setting::Disabled),
            ("infinite", Setting::Disabled),
            ("0", Duration::ZERO.into()),
            ("0s", Duration::ZERO.into()),
            ("7s", Duration::from_secs(7).into()),
            ("+5s", Duration::from_secs(5).into()),
            ("5.6s", (Duration::from_secs(5) + Duration::from_millis(600)).into()),
            (".5s", Duration::from_millis(500).into()),
            ("250ms", Duration::from_millis(250).into()),
            ("12µs", Duration::from_micros(12).into()),
            ("15m", (15 * MINUTE).into()),
            ("3h30m", (3 * HOUR + 30 * MINUTE).into()),
            (
                "1h2m3s4ms",
                (HOUR + 2 * MINUTE + Duration::from_secs(3) + Duration::from_millis(4)).into(),
            ),
        ];

        for (input, expected) in cases {
            let parsed = dbg!(input).parse::<Setting>().unwrap();
            assert_eq!(&dbg!(parsed), expected);
        }
    }

    #[test]
    fn rejects_invalid_settings() {
        assert_eq!("-5s".parse::<Setting>(), Err(ParseError::Negative));
        assert_eq!("10".parse::<Setting>(), Err(ParseError::NoUnit));
        assert_eq!("10d".parse::<Setting>(), Err(ParseError::InvalidUnit));
        assert_eq!(
            "99999999999999999999h".parse::<Setting>(),
            Err(ParseError::Overflow)
        );
        assert_eq!(
            "5000000000000000h5000000000000000h".parse::<Setting>(),
            Err(ParseError::Overflow)
        );
        assert!(matches!(
            "abc".parse::<Setting>(),
            Err(ParseError::NotANumber(_))
        ));
    }

    #[test]
    fn resolves_fields_independently() {
        let listener = TimeoutPolicy {
            connection_idle: Duration::from_secs(1).into(),
            stream_idle: Setting::Disabled,
            ..Default::default()
        };
        let defaults = TimeoutPolicy {
            connection_idle: Duration::from_secs(7).into(),
            stream_idle: Duration::from_secs(70).into(),
            max_connection_duration: Duration::from_secs(700).into(),
            connection_shutdown_grace_period: Setting::Unset,
        };

        assert_eq!(
            listener.resolve(&defaults),
            ResolvedTimeouts {
                connection_idle: Some(Duration::from_secs(1)),
                stream_idle: Some(Duration::ZERO),
                max_connection_duration: Some(Duration::from_secs(700)),
                connection_shutdown_grace_period: None,
            }
        );
    }

    #[test]
    fn unset_everywhere_resolves_to_absent() {
        assert_eq!(
            TimeoutPolicy::default().resolve(&TimeoutPolicy::default()),
            ResolvedTimeouts::default()
        );
    }
}
