//! Operator input normalization.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::{EngineError, Result};

pub const MIN_AMOUNT: f64 = 0.0;
pub const MAX_AMOUNT: f64 = 10_000.0;
pub const NOTICE_TTL_SECS: i64 = 3;
pub const CLAMP_MESSAGE: &str = "Value adjusted to valid range";

/// Short-lived message shown after an input was adjusted.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValidationNotice {
    pub message: String,
    pub raised_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ValidationNotice {
    pub fn clamped(now: DateTime<Utc>) -> Self {
        Self {
            message: CLAMP_MESSAGE.to_string(),
            raised_at: now,
            expires_at: now + Duration::seconds(NOTICE_TTL_SECS),
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// An amount after clamping, with whether clamping changed it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Amount {
    pub value: f64,
    pub adjusted: bool,
}

/// Clamps a revenue or goal value into `[0, 10000]`. Non-numbers are rejected.
pub fn clamp_amount(raw: f64) -> Result<Amount> {
    if raw.is_nan() {
        return Err(EngineError::InvalidAmount("not a number".to_string()));
    }
    let value = raw.clamp(MIN_AMOUNT, MAX_AMOUNT);
    Ok(Amount {
        value,
        adjusted: value != raw,
    })
}

/// Parses free-form operator text such as `"42.50"` or `"$1,200"`.
pub fn parse_amount(text: &str) -> Result<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    cleaned
        .parse::<f64>()
        .map_err(|_| EngineError::InvalidAmount(text.to_string()))
}

/// Relative rendering of an instant for status lines.
pub fn time_ago(then: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(then) = then else {
        return "never".to_string();
    };
    let minutes = (now - then).num_minutes();
    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else if minutes < 24 * 60 {
        format!("{}h ago", minutes / 60)
    } else {
        format!("{}d ago", minutes / (24 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    #[test_case(42.5 => (42.5, false))]
    #[test_case(-3.0 => (0.0, true))]
    #[test_case(12_000.0 => (10_000.0, true))]
    #[test_case(f64::INFINITY => (10_000.0, true))]
    fn clamps_into_range(raw: f64) -> (f64, bool) {
        let amount = clamp_amount(raw).unwrap();
        (amount.value, amount.adjusted)
    }

    #[test]
    fn nan_is_rejected() {
        assert!(matches!(
            clamp_amount(f64::NAN),
            Err(EngineError::InvalidAmount(_))
        ));
    }

    #[test]
    fn notice_expires_after_three_seconds() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let notice = ValidationNotice::clamped(now);
        assert!(notice.is_active(now + Duration::milliseconds(2_999)));
        assert!(!notice.is_active(now + Duration::seconds(3)));
    }

    #[test]
    fn parses_currency_text() {
        assert_eq!(parse_amount("$1,200.50").unwrap(), 1200.5);
        assert!(parse_amount("twelve").is_err());
    }

    #[test]
    fn renders_time_ago() {
        let now = Utc.with_ymd_and_hms(2024, 5, 3, 10, 0, 0).unwrap();
        assert_eq!(time_ago(None, now), "never");
        assert_eq!(time_ago(Some(now), now), "just now");
        assert_eq!(time_ago(Some(now - Duration::minutes(5)), now), "5m ago");
        assert_eq!(time_ago(Some(now - Duration::hours(3)), now), "3h ago");
        assert_eq!(time_ago(Some(now - Duration::days(2)), now), "2d ago");
    }
}
