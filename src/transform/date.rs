//! Timestamp transforms. Both write epoch milliseconds, as decimal text, to a
//! single output field.
//!
//! Unlike the other transforms a bad timestamp is an error: the time field is
//! mandatory for every record, so the caller decides whether to skip the record
//! or abort ingestion.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::Span;

use super::{Transform, TransformOutcome};
use crate::error::{ConfigError, TransformError};
use crate::record::{FieldRef, Record};

/// Parses a timestamp with a `chrono` strftime pattern, in UTC.
///
/// Patterns carrying an offset (`%z`, `%:z`) honour it. Patterns without a
/// time of day parse as midnight UTC.
pub struct DateFormatTransform {
    pattern: String,
    read: [FieldRef; 1],
    write: [FieldRef; 1],
    span: Span,
}

impl DateFormatTransform {
    /// # Errors
    /// Returns [`ConfigError::InvalidDatePattern`] if `pattern` contains an
    /// unknown specifier or no specifier at all.
    pub fn new(
        pattern: &str,
        read: FieldRef,
        write: FieldRef,
        span: Span,
    ) -> Result<Self, ConfigError> {
        let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
        let has_error = items.iter().any(|item| matches!(item, Item::Error));
        let has_field = items
            .iter()
            .any(|item| matches!(item, Item::Numeric(..) | Item::Fixed(_)));
        if has_error || !has_field {
            return Err(ConfigError::InvalidDatePattern(pattern.to_string()));
        }
        Ok(Self {
            pattern: pattern.to_string(),
            read: [read],
            write: [write],
            span,
        })
    }

    /// Parse `value` to epoch milliseconds.
    ///
    /// # Errors
    /// Returns [`TransformError::CannotParseTimestamp`] if `value` does not
    /// match the pattern.
    pub fn epoch_ms(&self, value: &str) -> Result<i64, TransformError> {
        let value = value.trim();
        if let Ok(dt) = DateTime::parse_from_str(value, &self.pattern) {
            return Ok(dt.timestamp_millis());
        }
        match NaiveDateTime::parse_from_str(value, &self.pattern) {
            Ok(dt) => Ok(dt.and_utc().timestamp_millis()),
            Err(err) => NaiveDate::parse_from_str(value, &self.pattern)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc().timestamp_millis())
                .ok_or_else(|| TransformError::CannotParseTimestamp {
                    value: value.to_string(),
                    reason: format!("does not match '{}': {err}", self.pattern),
                }),
        }
    }
}

impl Transform for DateFormatTransform {
    fn name(&self) -> &str {
        "date_format"
    }

    fn reads(&self) -> &[FieldRef] {
        &self.read
    }

    fn writes(&self) -> &[FieldRef] {
        &self.write
    }

    fn apply(&self, record: &mut Record) -> Result<TransformOutcome, TransformError> {
        let millis = self.epoch_ms(record.get(self.read[0])).inspect_err(|err| {
            tracing::warn!(parent: &self.span, field = %self.read[0], error = %err, "bad timestamp");
        })?;
        record.set(self.write[0], millis.to_string());
        Ok(TransformOutcome::Ok)
    }
}

/// Parses a numeric epoch timestamp, in seconds or milliseconds.
pub struct DoubleDateTransform {
    is_millisecond: bool,
    read: [FieldRef; 1],
    write: [FieldRef; 1],
    span: Span,
}

impl DoubleDateTransform {
    #[must_use]
    pub fn new(is_millisecond: bool, read: FieldRef, write: FieldRef, span: Span) -> Self {
        Self {
            is_millisecond,
            read: [read],
            write: [write],
            span,
        }
    }

    /// Parse `value` to epoch milliseconds, truncating any fraction of a
    /// millisecond.
    ///
    /// # Errors
    /// Returns [`TransformError::CannotParseTimestamp`] if `value` is not a
    /// finite number.
    #[allow(clippy::cast_possible_truncation)]
    pub fn epoch_ms(&self, value: &str) -> Result<i64, TransformError> {
        let seconds_or_ms = value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| TransformError::CannotParseTimestamp {
                value: value.to_string(),
                reason: "not a number".to_string(),
            })?;
        let millis = if self.is_millisecond {
            seconds_or_ms
        } else {
            seconds_or_ms * 1000.0
        };
        Ok(millis as i64)
    }
}

impl Transform for DoubleDateTransform {
    fn name(&self) -> &str {
        "double_date"
    }

    fn reads(&self) -> &[FieldRef] {
        &self.read
    }

    fn writes(&self) -> &[FieldRef] {
        &self.write
    }

    fn apply(&self, record: &mut Record) -> Result<TransformOutcome, TransformError> {
        let millis = self.epoch_ms(record.get(self.read[0])).inspect_err(|err| {
            tracing::warn!(parent: &self.span, field = %self.read[0], error = %err, "bad timestamp");
        })?;
        record.set(self.write[0], millis.to_string());
        Ok(TransformOutcome::Ok)
    }
}
