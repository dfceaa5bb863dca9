//! Comparison conditions evaluated against a single field value.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;

/// Comparison operator of a [`Condition`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Match,
}

impl Operator {
    /// Numeric operators compare doubles; `Match` compares against a regex.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        !matches!(self, Operator::Match)
    }

    /// Evaluate `lhs <op> rhs` with exact floating point semantics.
    ///
    /// Always `false` for [`Operator::Match`].
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn test(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Operator::Eq => lhs == rhs,
            Operator::Gt => lhs > rhs,
            Operator::Gte => lhs >= rhs,
            Operator::Lt => lhs < rhs,
            Operator::Lte => lhs <= rhs,
            Operator::Match => false,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Match => "match",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eq" => Ok(Operator::Eq),
            "gt" => Ok(Operator::Gt),
            "gte" => Ok(Operator::Gte),
            "lt" => Ok(Operator::Lt),
            "lte" => Ok(Operator::Lte),
            "match" => Ok(Operator::Match),
            _ => Err(ConfigError::UnknownOperator(s.to_string())),
        }
    }
}

/// Compiled form of a condition operand.
#[derive(Clone, Debug)]
enum Operand {
    Number(f64),
    Pattern(Regex),
}

/// An operator plus operand, validated when constructed.
///
/// Numeric operators require the operand to parse as `f64`; [`Operator::Match`]
/// requires it to compile as a regular expression. The regex is anchored so it
/// must match the whole field.
#[derive(Clone, Debug)]
pub struct Condition {
    operator: Operator,
    value: String,
    operand: Operand,
}

impl Condition {
    /// Validate and compile a condition.
    ///
    /// # Errors
    /// - [`ConfigError::InvalidCondition`] if a numeric operand is not a number
    /// - [`ConfigError::InvalidRegex`] if a `match` operand does not compile
    pub fn new(operator: Operator, value: impl Into<String>) -> Result<Self, ConfigError> {
        let value = value.into();
        let operand = if operator.is_numeric() {
            let n = value
                .trim()
                .parse::<f64>()
                .map_err(|_| ConfigError::InvalidCondition {
                    operator: operator.to_string(),
                    operand: value.clone(),
                })?;
            Operand::Number(n)
        } else {
            let anchored = format!("^(?:{value})$");
            let re = Regex::new(&anchored).map_err(|source| ConfigError::InvalidRegex {
                pattern: value.clone(),
                source,
            })?;
            Operand::Pattern(re)
        };
        Ok(Self {
            operator,
            value,
            operand,
        })
    }

    #[must_use]
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// The operand as configured.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Numeric operand, if the operator is numeric.
    #[must_use]
    pub fn number(&self) -> Option<f64> {
        match self.operand {
            Operand::Number(n) => Some(n),
            Operand::Pattern(_) => None,
        }
    }

    /// Compiled pattern, if the operator is `match`.
    #[must_use]
    pub fn pattern(&self) -> Option<&Regex> {
        match &self.operand {
            Operand::Pattern(re) => Some(re),
            Operand::Number(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct RawCondition {
    operator: String,
    value: String,
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawCondition::deserialize(deserializer)?;
        let operator = raw.operator.parse().map_err(serde::de::Error::custom)?;
        Condition::new(operator, raw.value).map_err(serde::de::Error::custom)
    }
}
