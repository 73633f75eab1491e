//! Timestamp type, including the relative-reference grammar used by the
//! time-travel engine (§4.8: `-Nh|-Nd|-Nm|-Nw`).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in time, stored as UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

/// Error parsing a relative time reference.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelativeTimeError {
    /// The string didn't match `-N[hdmw]`.
    #[error("invalid relative time reference: {0:?} (expected -Nh, -Nd, -Nm, or -Nw)")]
    InvalidFormat(String),
}

impl Timestamp {
    /// The current instant.
    ///
    /// Callers needing reproducibility (tests, commit hashing) should prefer
    /// [`Timestamp::from_rfc3339`] with a fixed value.
    pub fn now() -> Self {
        Timestamp(Utc::now())
    }

    /// Wrap an existing `DateTime<Utc>`.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Timestamp(dt)
    }

    /// Parse an RFC3339 timestamp.
    pub fn from_rfc3339(s: &str) -> Result<Self, chrono::ParseError> {
        Ok(Timestamp(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc)))
    }

    /// Render as RFC3339 (the CloudEvents `time` attribute format, §3).
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// The wrapped `chrono` value.
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Parse a relative time reference (`-Nh`, `-Nd`, `-Nm`, `-Nw`) relative to
    /// `base`. `-0h` resolves to `base` unchanged (§8 boundary behaviour).
    pub fn parse_relative(s: &str, base: Timestamp) -> Result<Self, RelativeTimeError> {
        let bytes = s.as_bytes();
        if bytes.len() < 3 || bytes[0] != b'-' {
            return Err(RelativeTimeError::InvalidFormat(s.to_string()));
        }
        let unit = *bytes.last().unwrap() as char;
        let digits = &s[1..s.len() - 1];
        let n: i64 = digits
            .parse()
            .map_err(|_| RelativeTimeError::InvalidFormat(s.to_string()))?;
        let delta = match unit {
            'h' => Duration::hours(n),
            'd' => Duration::days(n),
            'm' => Duration::days(n * 30),
            'w' => Duration::weeks(n),
            _ => return Err(RelativeTimeError::InvalidFormat(s.to_string())),
        };
        Ok(Timestamp(base.0 - delta))
    }

    /// Duration between two timestamps (`self - earlier`), saturating at zero
    /// if `earlier` is actually later.
    pub fn duration_since(&self, earlier: Timestamp) -> chrono::Duration {
        self.0 - earlier.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_hours_is_identity() {
        let base = Timestamp::now();
        let parsed = Timestamp::parse_relative("-0h", base).unwrap();
        assert_eq!(parsed, base);
    }

    #[test]
    fn relative_hours_subtracts() {
        let base = Timestamp::from_rfc3339("2026-01-02T00:00:00Z").unwrap();
        let parsed = Timestamp::parse_relative("-3h", base).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-01-01T21:00:00+00:00");
    }

    #[test]
    fn relative_days_and_weeks() {
        let base = Timestamp::from_rfc3339("2026-01-08T00:00:00Z").unwrap();
        let d = Timestamp::parse_relative("-1d", base).unwrap();
        let w = Timestamp::parse_relative("-1w", base).unwrap();
        assert_eq!(d.to_rfc3339(), "2026-01-07T00:00:00+00:00");
        assert_eq!(w.to_rfc3339(), "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn rejects_malformed() {
        let base = Timestamp::now();
        assert!(Timestamp::parse_relative("3h", base).is_err());
        assert!(Timestamp::parse_relative("-3x", base).is_err());
        assert!(Timestamp::parse_relative("-h", base).is_err());
    }
}
