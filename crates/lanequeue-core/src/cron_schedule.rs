use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::error::QueueError;

/// A validated cron expression, adapted from the `cron` crate's
/// [`Schedule`] type.
///
/// Accepts the standard 5- or 6-field form (seconds optionally prefixed).
/// Invalid syntax is rejected at construction time rather than deferred to
/// first use.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    inner: Schedule,
    source: String,
}

impl CronSchedule {
    /// Parse and validate a cron expression.
    ///
    /// The `cron` crate's parser requires an explicit seconds field; a
    /// caller-supplied 5-field expression (the common `min hour dom month
    /// dow` crontab form) is normalised to 6 fields by prefixing a literal
    /// `0` seconds field before parsing, so both forms validate as spec'd.
    pub fn parse(expression: &str) -> Result<Self, QueueError> {
        let field_count = expression.split_whitespace().count();
        let normalised = if field_count == 5 {
            format!("0 {expression}")
        } else {
            expression.to_string()
        };
        let inner = Schedule::from_str(&normalised).map_err(|_| QueueError::InvalidCron)?;
        Ok(Self {
            inner,
            source: expression.to_string(),
        })
    }

    pub fn expression(&self) -> &str {
        &self.source
    }

    /// Next fire instant strictly after `from`.
    ///
    /// If the process was stopped through several missed fires, this still
    /// returns only the single next occurrence after `from` — missed fires
    /// are not enumerated or replayed.
    pub fn next_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.inner.after(&from).next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_syntax() {
        let err = CronSchedule::parse("not a cron expression").unwrap_err();
        assert!(matches!(err, QueueError::InvalidCron));
        assert_eq!(err.to_string(), "invalid cron expression provided");
    }

    #[test]
    fn computes_next_fire_after_reference_instant() {
        let schedule = CronSchedule::parse("0 * * * * *").unwrap();
        let now = Utc::now();
        let next = schedule.next_after(now).unwrap();
        assert!(next > now);
    }

    #[test]
    fn accepts_five_field_crontab_form() {
        let schedule = CronSchedule::parse("*/30 * * * *").unwrap();
        assert_eq!(schedule.expression(), "*/30 * * * *");
        let now = Utc::now();
        assert!(schedule.next_after(now).unwrap() > now);
    }
}
