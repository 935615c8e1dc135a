use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::error::TrialError;
use crate::message::parse_timestamp;

pub const MILLISECONDS_IN_ONE_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTrial {
    pub start_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
}

impl AuditTrial {
    /// Validates the raw dates reported by the backend.
    ///
    /// `Ok(None)` means the learner has no trial. Any malformed date, or an
    /// expiration earlier than the start, rejects the trial as a whole.
    pub fn from_raw(
        start_date: Option<&str>,
        expiration_date: Option<&str>,
    ) -> Result<Option<Self>, TrialError> {
        let start_date = parse_field("start_date", start_date)?;
        let expiration_date = parse_field("expiration_date", expiration_date)?;

        if start_date.is_none() && expiration_date.is_none() {
            return Ok(None);
        }

        if let (Some(start), Some(expiration)) = (start_date, expiration_date) {
            if expiration < start {
                return Err(TrialError::ExpiresBeforeStart);
            }
        }

        Ok(Some(Self {
            start_date,
            expiration_date,
        }))
    }
}

fn parse_field(
    field: &'static str,
    raw: Option<&str>,
) -> Result<Option<DateTime<Utc>>, TrialError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_timestamp(value)
            .map(Some)
            .ok_or_else(|| TrialError::MalformedDate {
                field,
                value: value.to_string(),
            }),
    }
}

/// Whole days left on the trial, rounded up. `None` when the trial carries no
/// expiration date.
pub fn days_remaining(trial: &AuditTrial, now: DateTime<Utc>) -> Option<i64> {
    let expiration = trial.expiration_date?;
    let remaining_ms = (expiration - now).num_milliseconds();
    Some(ceil_div(remaining_ms, MILLISECONDS_IN_ONE_DAY))
}

/// Zero remaining days counts as expired.
pub fn is_expired(trial: &AuditTrial, now: DateTime<Utc>) -> bool {
    days_remaining(trial, now).is_some_and(|days| days <= 0)
}

fn ceil_div(value: i64, divisor: i64) -> i64 {
    let quotient = value.div_euclid(divisor);
    if value.rem_euclid(divisor) > 0 {
        quotient + 1
    } else {
        quotient
    }
}
