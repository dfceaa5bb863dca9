use tracing::Span;

use super::{Transform, TransformConfig, TransformOutcome};
use crate::error::{ConfigError, TransformError};
use crate::record::{Record, RecordLayout};

/// What a chain does when a transform returns [`TransformOutcome::Fail`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the chain; the record is unusable.
    AbortRecord,
    /// Count the failure and keep applying the remaining transforms.
    #[default]
    Continue,
}

/// Result of running a whole chain over one record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainOutcome {
    /// Every transform ran; `failures` counts those that returned `Fail`.
    Ok { failures: usize },
    /// A transform failed under [`FailurePolicy::AbortRecord`].
    Failed,
    /// An exclude filter matched. The record should be dropped.
    Excluded,
}

/// An ordered list of transforms applied to each record of a job.
pub struct TransformChain {
    transforms: Vec<Box<dyn Transform>>,
    policy: FailurePolicy,
}

impl TransformChain {
    /// Build a chain from already constructed transforms, validating every
    /// field reference against `layout`.
    ///
    /// # Errors
    /// Returns [`ConfigError::FieldOutOfBounds`] if a transform reads or writes
    /// outside the layout.
    pub fn new(
        transforms: Vec<Box<dyn Transform>>,
        layout: &RecordLayout,
        policy: FailurePolicy,
    ) -> Result<Self, ConfigError> {
        for t in &transforms {
            t.validate(layout)?;
        }
        Ok(Self { transforms, policy })
    }

    /// Build a chain from job configuration. Scratch slots are allocated in
    /// `layout` for intermediate fields, so records must be created from the
    /// layout after this returns.
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] raised by any config.
    pub fn from_configs(
        configs: &[TransformConfig],
        layout: &mut RecordLayout,
        policy: FailurePolicy,
        span: &Span,
    ) -> Result<Self, ConfigError> {
        let transforms = configs
            .iter()
            .map(|c| c.build(layout, span))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(transforms, layout, policy)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    #[must_use]
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Apply every transform to `record` in order.
    ///
    /// # Errors
    /// Propagates the first [`TransformError`]; the record is left partially
    /// transformed.
    pub fn apply(&self, record: &mut Record) -> Result<ChainOutcome, TransformError> {
        let mut failures = 0;
        for t in &self.transforms {
            match t.apply(record)? {
                TransformOutcome::Ok => {}
                TransformOutcome::Exclude => return Ok(ChainOutcome::Excluded),
                TransformOutcome::Fail => match self.policy {
                    FailurePolicy::AbortRecord => return Ok(ChainOutcome::Failed),
                    FailurePolicy::Continue => failures += 1,
                },
            }
        }
        Ok(ChainOutcome::Ok { failures })
    }
}
