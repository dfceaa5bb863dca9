//! Exclude filters drop records whose field satisfies a [`Condition`].

use tracing::Span;

use super::{Condition, Transform, TransformOutcome};
use crate::error::{ConfigError, TransformError};
use crate::record::{FieldRef, Record};

/// Build the exclude filter matching the condition's operator: numeric
/// comparison for `eq`/`gt`/`gte`/`lt`/`lte`, pattern match for `match`.
#[must_use]
pub fn exclude_filter(condition: Condition, read: FieldRef, span: Span) -> Box<dyn Transform> {
    if condition.operator().is_numeric() {
        Box::new(ExcludeFilterNumeric {
            condition,
            read: [read],
            span,
        })
    } else {
        Box::new(ExcludeFilterRegex {
            condition,
            read: [read],
            span,
        })
    }
}

/// Excludes the record when `field <op> operand` holds, comparing as `f64`.
///
/// Comparison is exact: `10` against `gte 10.000` is excluded. A field that is
/// not a number never satisfies the condition.
pub struct ExcludeFilterNumeric {
    condition: Condition,
    read: [FieldRef; 1],
    span: Span,
}

impl ExcludeFilterNumeric {
    /// # Errors
    /// Returns [`ConfigError::InvalidCondition`] if the condition uses the
    /// `match` operator.
    pub fn new(condition: Condition, read: FieldRef, span: Span) -> Result<Self, ConfigError> {
        if !condition.operator().is_numeric() {
            return Err(ConfigError::InvalidCondition {
                operator: condition.operator().to_string(),
                operand: condition.value().to_string(),
            });
        }
        Ok(Self {
            condition,
            read: [read],
            span,
        })
    }
}

impl Transform for ExcludeFilterNumeric {
    fn name(&self) -> &str {
        "exclude"
    }

    fn reads(&self) -> &[FieldRef] {
        &self.read
    }

    fn writes(&self) -> &[FieldRef] {
        &[]
    }

    fn apply(&self, record: &mut Record) -> Result<TransformOutcome, TransformError> {
        let Some(operand) = self.condition.number() else {
            return Ok(TransformOutcome::Ok);
        };
        let field = record.get(self.read[0]);
        let Ok(value) = field.trim().parse::<f64>() else {
            tracing::debug!(
                parent: &self.span,
                field = %self.read[0],
                value = field,
                "non-numeric value in numeric exclude filter"
            );
            return Ok(TransformOutcome::Ok);
        };
        if self.condition.operator().test(value, operand) {
            Ok(TransformOutcome::Exclude)
        } else {
            Ok(TransformOutcome::Ok)
        }
    }
}

/// Excludes the record when the whole field matches the condition's pattern.
pub struct ExcludeFilterRegex {
    condition: Condition,
    read: [FieldRef; 1],
    span: Span,
}

impl ExcludeFilterRegex {
    /// # Errors
    /// Returns [`ConfigError::InvalidCondition`] unless the condition uses the
    /// `match` operator.
    pub fn new(condition: Condition, read: FieldRef, span: Span) -> Result<Self, ConfigError> {
        if condition.pattern().is_none() {
            return Err(ConfigError::InvalidCondition {
                operator: condition.operator().to_string(),
                operand: condition.value().to_string(),
            });
        }
        Ok(Self {
            condition,
            read: [read],
            span,
        })
    }
}

impl Transform for ExcludeFilterRegex {
    fn name(&self) -> &str {
        "exclude"
    }

    fn reads(&self) -> &[FieldRef] {
        &self.read
    }

    fn writes(&self) -> &[FieldRef] {
        &[]
    }

    fn apply(&self, record: &mut Record) -> Result<TransformOutcome, TransformError> {
        let field = record.get(self.read[0]);
        let excluded = self
            .condition
            .pattern()
            .is_some_and(|re| re.is_match(field));
        if excluded {
            tracing::trace!(parent: &self.span, field = %self.read[0], "record excluded");
            Ok(TransformOutcome::Exclude)
        } else {
            Ok(TransformOutcome::Ok)
        }
    }
}
