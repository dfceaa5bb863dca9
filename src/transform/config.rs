//! Job-supplied transform configuration.
//!
//! A [`TransformConfig`] names a transform type, its input and output fields,
//! its arguments and (for exclude filters) a [`Condition`]. Configs are checked
//! with [`TransformConfig::verify`] and turned into [`Transform`]s with
//! [`TransformConfig::build`], which resolves field names through a
//! [`RecordLayout`].
//!
//! ```
//! use jobflow::transform::TransformConfig;
//!
//! let config: TransformConfig = serde_json::from_str(r#"{
//!     "transform": "extract",
//!     "inputs": ["uri"],
//!     "arguments": ["^/(\\w+)/(\\w+)"],
//!     "outputs": ["service", "action"]
//! }"#).unwrap();
//! assert!(config.verify().is_ok());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing::Span;

use super::{
    Concat, Condition, DateFormatTransform, DoubleDateTransform, Lowercase, RegexExtract,
    RegexSplit, Transform, Trim, Uppercase, exclude_filter,
};
use crate::error::ConfigError;
use crate::record::{FieldRef, RecordLayout};

/// Inclusive lower bound and optional inclusive upper bound on a count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: Option<usize>,
}

impl Arity {
    const fn exactly(n: usize) -> Self {
        Self { min: n, max: Some(n) }
    }

    const fn between(min: usize, max: usize) -> Self {
        Self { min, max: Some(max) }
    }

    const fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    #[must_use]
    pub fn contains(&self, n: usize) -> bool {
        n >= self.min && self.max.is_none_or(|max| n <= max)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "[{}, {}]", self.min, max),
            None => write!(f, "[{}, +inf)", self.min),
        }
    }
}

/// Every transform a job can configure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransformType {
    Concat,
    Lowercase,
    Uppercase,
    Trim,
    Extract,
    Split,
    Exclude,
    DateFormat,
    Epoch,
    EpochMs,
}

impl TransformType {
    pub const ALL: [TransformType; 10] = [
        TransformType::Concat,
        TransformType::Lowercase,
        TransformType::Uppercase,
        TransformType::Trim,
        TransformType::Extract,
        TransformType::Split,
        TransformType::Exclude,
        TransformType::DateFormat,
        TransformType::Epoch,
        TransformType::EpochMs,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TransformType::Concat => "concat",
            TransformType::Lowercase => "lowercase",
            TransformType::Uppercase => "uppercase",
            TransformType::Trim => "trim",
            TransformType::Extract => "extract",
            TransformType::Split => "split",
            TransformType::Exclude => "exclude",
            TransformType::DateFormat => "date_format",
            TransformType::Epoch => "epoch",
            TransformType::EpochMs => "epoch_ms",
        }
    }

    #[must_use]
    pub fn inputs(self) -> Arity {
        match self {
            TransformType::Concat => Arity::at_least(2),
            _ => Arity::exactly(1),
        }
    }

    #[must_use]
    pub fn arguments(self) -> Arity {
        match self {
            TransformType::Concat => Arity::between(0, 1),
            TransformType::Extract | TransformType::Split | TransformType::DateFormat => {
                Arity::exactly(1)
            }
            _ => Arity::exactly(0),
        }
    }

    #[must_use]
    pub fn outputs(self) -> Arity {
        match self {
            TransformType::Extract | TransformType::Split => Arity::at_least(1),
            TransformType::Exclude => Arity::exactly(0),
            _ => Arity::exactly(1),
        }
    }

    #[must_use]
    pub fn requires_condition(self) -> bool {
        self == TransformType::Exclude
    }

    /// Output used when a single-output transform is configured without one.
    #[must_use]
    pub fn default_output(self) -> Option<&'static str> {
        (self.outputs() == Arity::exactly(1)).then(|| self.as_str())
    }
}

impl fmt::Display for TransformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransformType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        TransformType::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| ConfigError::UnknownTransform(s.to_string()))
    }
}

/// One transform as supplied by the job configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct TransformConfig {
    /// Transform type name, e.g. `"extract"`.
    pub transform: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub condition: Option<Condition>,
}

impl TransformConfig {
    #[must_use]
    pub fn new<I, S>(transform: impl Into<String>, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            transform: transform.into(),
            inputs: inputs.into_iter().map(Into::into).collect(),
            arguments: Vec::new(),
            outputs: Vec::new(),
            condition: None,
        }
    }

    #[must_use]
    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments = arguments.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Output field names, falling back to the type's default output.
    #[must_use]
    pub fn effective_outputs(&self, ty: TransformType) -> Vec<String> {
        if self.outputs.is_empty()
            && let Some(default) = ty.default_output()
        {
            return vec![default.to_string()];
        }
        self.outputs.clone()
    }

    /// Check input, argument and output counts and the presence of a condition.
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] found.
    pub fn verify(&self) -> Result<TransformType, ConfigError> {
        let ty: TransformType = self.transform.parse()?;
        let name = ty.to_string();

        if !ty.inputs().contains(self.inputs.len()) {
            return Err(ConfigError::InvalidInputCount {
                transform: name,
                expected: ty.inputs().to_string(),
                actual: self.inputs.len(),
            });
        }
        if !ty.arguments().contains(self.arguments.len()) {
            return Err(ConfigError::InvalidArgumentCount {
                transform: name,
                expected: ty.arguments().to_string(),
                actual: self.arguments.len(),
            });
        }
        let outputs = self.effective_outputs(ty);
        if !ty.outputs().contains(outputs.len()) {
            return Err(ConfigError::InvalidOutputCount {
                transform: name,
                expected: ty.outputs().to_string(),
                actual: outputs.len(),
            });
        }
        if ty.requires_condition() && self.condition.is_none() {
            return Err(ConfigError::MissingCondition(name));
        }
        Ok(ty)
    }

    /// Verify the config and build its transform, resolving input names to
    /// read references and allocating write references in `layout`.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if verification fails, an input names a field
    /// nothing provides, or a regex, condition or date pattern is invalid.
    pub fn build(
        &self,
        layout: &mut RecordLayout,
        span: &Span,
    ) -> Result<Box<dyn Transform>, ConfigError> {
        let ty = self.verify()?;
        let reads = self
            .inputs
            .iter()
            .map(|name| {
                layout
                    .read_ref(name)
                    .ok_or_else(|| ConfigError::UnknownField(name.clone()))
            })
            .collect::<Result<Vec<FieldRef>, _>>()?;
        let writes: Vec<FieldRef> = self
            .effective_outputs(ty)
            .iter()
            .map(|name| layout.write_ref(name))
            .collect();
        let argument = self.arguments.first().map(String::as_str);
        let span = span.clone();

        let transform: Box<dyn Transform> = match ty {
            TransformType::Concat => Box::new(Concat::new(argument.unwrap_or(""), reads, writes[0])),
            TransformType::Lowercase => Box::new(Lowercase::new(reads[0], writes[0])),
            TransformType::Uppercase => Box::new(Uppercase::new(reads[0], writes[0])),
            TransformType::Trim => Box::new(Trim::new(reads[0], writes[0])),
            TransformType::Extract => Box::new(RegexExtract::new(
                argument.unwrap_or_default(),
                reads[0],
                writes,
                span,
            )?),
            TransformType::Split => Box::new(RegexSplit::new(
                argument.unwrap_or_default(),
                reads[0],
                writes,
                span,
            )?),
            TransformType::Exclude => {
                let condition = self
                    .condition
                    .clone()
                    .ok_or_else(|| ConfigError::MissingCondition(ty.to_string()))?;
                exclude_filter(condition, reads[0], span)
            }
            TransformType::DateFormat => Box::new(DateFormatTransform::new(
                argument.unwrap_or_default(),
                reads[0],
                writes[0],
                span,
            )?),
            TransformType::Epoch => {
                Box::new(DoubleDateTransform::new(false, reads[0], writes[0], span))
            }
            TransformType::EpochMs => {
                Box::new(DoubleDateTransform::new(true, reads[0], writes[0], span))
            }
        };
        Ok(transform)
    }
}
