//! Duration specifiers such as `"15m"` or `"30d"`.

use crate::error::{AuthError, Result};
use chrono::Duration;

/// Parse a duration specifier matching `^\d+[smhd]$`.
///
/// A malformed specifier is a programming error on the caller's side and is
/// reported as [`AuthError::BadRequest`].
pub fn parse_duration(spec: &str) -> Result<Duration> {
    let invalid = || AuthError::bad_request(format!("Invalid duration specifier: {:?}", spec));

    let unit = spec.chars().last().ok_or_else(invalid)?;
    let digits = &spec[..spec.len() - unit.len_utf8()];

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let amount: i64 = digits.parse().map_err(|_| invalid())?;

    let seconds = match unit {
        's' => Some(amount),
        'm' => amount.checked_mul(60),
        'h' => amount.checked_mul(60 * 60),
        'd' => amount.checked_mul(24 * 60 * 60),
        _ => None,
    }
    .ok_or_else(invalid)?;

    Duration::try_seconds(seconds).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_every_unit() {
        assert_eq!(parse_duration("45s").unwrap(), Duration::seconds(45));
        assert_eq!(parse_duration("15m").unwrap(), Duration::minutes(15));
        assert_eq!(parse_duration("2h").unwrap(), Duration::hours(2));
        assert_eq!(parse_duration("30d").unwrap(), Duration::days(30));
        assert_eq!(parse_duration("0s").unwrap(), Duration::zero());
    }

    #[test]
    fn test_rejects_malformed_specifiers() {
        for spec in ["", "m", "15", "15w", "-5m", "1.5h", " 15m", "15m ", "15M", "1d2h"] {
            let err = parse_duration(spec).unwrap_err();
            assert!(matches!(err, AuthError::BadRequest(_)), "{spec:?} should be rejected");
        }
    }

    #[test]
    fn test_rejects_overflow() {
        assert!(parse_duration("99999999999999999999d").is_err());
        assert!(parse_duration("9223372036854775807d").is_err());
    }
}
