use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::errors::TokenError;

pub const INVALID_EXPIRY: &str = "Invalid expiration date";
pub const EXPIRY_IN_PAST: &str = "Expiration date must be in the future";

/// Parse a caller-supplied expiry.
///
/// Accepts RFC 3339 (`2099-01-01T00:00:00.000Z`, `2099-01-01T02:00:00+02:00`),
/// a date-time without offset (taken as UTC), or a bare date (midnight UTC).
pub fn parse_expiry(input: &str) -> Result<DateTime<Utc>, TokenError> {
    let s = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&midnight));
        }
    }

    Err(TokenError::InvalidInput(INVALID_EXPIRY.into()))
}

/// Epoch milliseconds, as sent by JavaScript clients posting a number.
pub fn expiry_from_millis(ms: i64) -> Result<DateTime<Utc>, TokenError> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| TokenError::InvalidInput(INVALID_EXPIRY.into()))
}

/// Reject expiries that are not strictly after `now`.
pub fn ensure_future(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), TokenError> {
    if expires_at <= now {
        return Err(TokenError::InvalidInput(EXPIRY_IN_PAST.into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn reason(err: TokenError) -> String {
        match err {
            TokenError::InvalidInput(r) => r,
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_parses_rfc3339_with_millis_and_z() {
        let dt = parse_expiry("2099-01-01T00:00:00.000Z").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_offset_is_normalized_to_utc() {
        let dt = parse_expiry("2099-01-01T02:00:00+02:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_naive_forms_are_utc() {
        let midnight = Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_expiry("2099-01-01").unwrap(), midnight);
        assert_eq!(parse_expiry("2099-01-01T00:00:00").unwrap(), midnight);
        assert_eq!(parse_expiry("2099-01-01T00:00").unwrap(), midnight);
    }

    #[test]
    fn test_garbage_is_invalid_input() {
        for bad in ["not-a-date", "", "2099-13-01", "2099-02-30", "tomorrow"] {
            assert_eq!(reason(parse_expiry(bad).unwrap_err()), INVALID_EXPIRY, "{bad}");
        }
    }

    #[test]
    fn test_millis() {
        let dt = expiry_from_millis(4_070_908_800_000).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap());
        assert!(expiry_from_millis(i64::MAX).is_err());
    }

    #[test]
    fn test_ensure_future() {
        let now = Utc::now();
        assert!(ensure_future(now + Duration::seconds(1), now).is_ok());
        assert_eq!(reason(ensure_future(now, now).unwrap_err()), EXPIRY_IN_PAST);
        assert_eq!(
            reason(ensure_future(now - Duration::days(1), now).unwrap_err()),
            EXPIRY_IN_PAST
        );
    }
}
