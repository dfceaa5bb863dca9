//! Regular expression transforms.

use regex::Regex;
use tracing::Span;

use super::{Transform, TransformOutcome};
use crate::error::{ConfigError, TransformError};
use crate::record::{FieldRef, Record};

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })
}

/// Copies the capture groups of a regex match into the write fields.
///
/// The pattern is searched for anywhere in the field. Group `i` (1-based) is
/// written to write field `i - 1`; groups beyond the number of write fields are
/// ignored, and a group that did not participate in the match writes `""`.
pub struct RegexExtract {
    pattern: Regex,
    read: [FieldRef; 1],
    writes: Vec<FieldRef>,
    span: Span,
}

impl RegexExtract {
    /// # Errors
    /// Returns [`ConfigError::InvalidRegex`] if `pattern` does not compile.
    pub fn new(
        pattern: &str,
        read: FieldRef,
        writes: Vec<FieldRef>,
        span: Span,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            pattern: compile(pattern)?,
            read: [read],
            writes,
            span,
        })
    }
}

impl Transform for RegexExtract {
    fn name(&self) -> &str {
        "extract"
    }

    fn reads(&self) -> &[FieldRef] {
        &self.read
    }

    fn writes(&self) -> &[FieldRef] {
        &self.writes
    }

    fn apply(&self, record: &mut Record) -> Result<TransformOutcome, TransformError> {
        let field = record.get(self.read[0]);
        let Some(caps) = self.pattern.captures(field) else {
            tracing::warn!(
                parent: &self.span,
                transform = self.name(),
                field = %self.read[0],
                value = field,
                pattern = self.pattern.as_str(),
                "cannot extract from field: no match"
            );
            return Ok(TransformOutcome::Fail);
        };
        let groups: Vec<String> = (1..caps.len())
            .take(self.writes.len())
            .map(|i| caps.get(i).map_or_else(String::new, |m| m.as_str().to_string()))
            .collect();
        for (out, value) in self.writes.iter().zip(groups) {
            record.set(*out, value);
        }
        Ok(TransformOutcome::Ok)
    }
}

/// Splits a field by a regex and copies the parts into the write fields.
///
/// Trailing empty parts are dropped. A part count that differs from the number
/// of write fields is logged but is not a failure.
pub struct RegexSplit {
    pattern: Regex,
    read: [FieldRef; 1],
    writes: Vec<FieldRef>,
    span: Span,
}

impl RegexSplit {
    /// # Errors
    /// Returns [`ConfigError::InvalidRegex`] if `pattern` does not compile.
    pub fn new(
        pattern: &str,
        read: FieldRef,
        writes: Vec<FieldRef>,
        span: Span,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            pattern: compile(pattern)?,
            read: [read],
            writes,
            span,
        })
    }

    fn split(&self, value: &str) -> Vec<String> {
        let mut parts: Vec<String> = self.pattern.split(value).map(str::to_string).collect();
        while parts.len() > 1 && parts.last().is_some_and(String::is_empty) {
            parts.pop();
        }
        parts
    }
}

impl Transform for RegexSplit {
    fn name(&self) -> &str {
        "split"
    }

    fn reads(&self) -> &[FieldRef] {
        &self.read
    }

    fn writes(&self) -> &[FieldRef] {
        &self.writes
    }

    fn apply(&self, record: &mut Record) -> Result<TransformOutcome, TransformError> {
        let parts = self.split(record.get(self.read[0]));
        if parts.len() != self.writes.len() {
            tracing::warn!(
                parent: &self.span,
                transform = self.name(),
                field = %self.read[0],
                value = record.get(self.read[0]),
                parts = parts.len(),
                outputs = self.writes.len(),
                "split produced an unexpected number of parts"
            );
        }
        for (out, part) in self.writes.iter().zip(parts) {
            record.set(*out, part);
        }
        Ok(TransformOutcome::Ok)
    }
}
