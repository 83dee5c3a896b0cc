//! RFC-3339 UTC, millisecond-precision timestamp helpers.
//!
//! All audit, job and work-order timestamps in this workspace use this
//! format so that log lines are directly comparable as strings.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current instant, truncated to millisecond precision.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Render a timestamp as RFC-3339 with millisecond precision, e.g.
/// `2026-01-15T12:34:56.789Z`.
#[must_use]
pub fn format(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC-3339 timestamp produced by [`format`].
///
/// # Errors
///
/// Returns an error if `s` is not valid RFC-3339.
pub fn parse(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_format_and_parse() {
        let ts = now();
        let rendered = format(&ts);
        let parsed = parse(&rendered).unwrap();
        assert_eq!(format(&parsed), rendered);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("not-a-timestamp").is_err());
    }
}
