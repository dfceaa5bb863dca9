//! Field transforms applied to a [`Record`] before it is routed to a worker.
//!
//! A [`Transform`] reads from one or more [`FieldRef`]s and writes to zero or
//! more others. Routine data problems (no regex match, an unexpected number of
//! split parts) are reported through [`TransformOutcome`] and logged; they never
//! raise errors. Only transforms whose input is mandatory (the date transforms)
//! return a [`TransformError`], and configuration problems are rejected when the
//! transform is constructed.
//!
//! Available transforms:
//! - [`RegexExtract`], [`RegexSplit`] - regular expression field extraction
//! - [`ExcludeFilterNumeric`], [`ExcludeFilterRegex`] - drop records by [`Condition`]
//! - [`DateFormatTransform`], [`DoubleDateTransform`] - timestamp normalisation
//! - [`Concat`], [`Lowercase`], [`Uppercase`], [`Trim`] - text clean-up
//!
//! Transforms are combined into a [`TransformChain`], usually built from a list
//! of [`TransformConfig`]s with [`TransformChain::from_configs`].

pub mod chain;
pub mod condition;
pub mod config;
pub mod date;
pub mod exclude;
pub mod extract;
pub mod text;

pub use chain::{ChainOutcome, FailurePolicy, TransformChain};
pub use condition::{Condition, Operator};
pub use config::{TransformConfig, TransformType};
pub use date::{DateFormatTransform, DoubleDateTransform};
pub use exclude::{ExcludeFilterNumeric, ExcludeFilterRegex, exclude_filter};
pub use extract::{RegexExtract, RegexSplit};
pub use text::{Concat, Lowercase, Trim, Uppercase};

use crate::error::{ConfigError, TransformError};
use crate::record::{FieldRef, Record, RecordLayout};

/// Result of applying one transform to one record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransformOutcome {
    /// The transform succeeded.
    Ok,
    /// The input did not have the expected shape; dependents cannot use it.
    Fail,
    /// The record should be dropped.
    Exclude,
}

/// A pure function over a [`Record`].
pub trait Transform: Send + Sync {
    /// Transform name, used in log events.
    fn name(&self) -> &str;

    /// Fields this transform reads.
    fn reads(&self) -> &[FieldRef];

    /// Fields this transform writes.
    fn writes(&self) -> &[FieldRef];

    /// Apply the transform to `record`.
    ///
    /// # Errors
    /// Only transforms with a mandatory input return an error; see
    /// [`TransformError`].
    fn apply(&self, record: &mut Record) -> Result<TransformOutcome, TransformError>;

    /// Check every field reference against `layout`.
    ///
    /// # Errors
    /// Returns [`ConfigError::FieldOutOfBounds`] for the first reference that
    /// does not fit.
    fn validate(&self, layout: &RecordLayout) -> Result<(), ConfigError> {
        self.reads()
            .iter()
            .chain(self.writes())
            .try_for_each(|field| layout.check(*field))
    }
}
