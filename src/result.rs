//! Typed view of the documents a worker process emits.
//!
//! Each document is a JSON object carrying one (occasionally several) of the
//! keys below. Result bodies whose schema belongs to the persistence layer are
//! kept as raw [`Value`]s; the two kinds this crate's consumers act on directly,
//! quantiles and flush acknowledgements, are typed.
//!
//! ```
//! use jobflow::result::{ResultKind, WorkerResult};
//!
//! let doc: WorkerResult = serde_json::from_str(r#"{"flush":{"id":"f1"}}"#).unwrap();
//! assert_eq!(doc.kinds(), vec![ResultKind::FlushAcknowledgement]);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Normalisation state persisted periodically by the job manager.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quantiles {
    #[serde(default)]
    pub timestamp: Option<i64>,
    pub quantile_state: String,
}

/// Confirms that the worker has processed all input sent before a flush
/// request with the same id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushAcknowledgement {
    pub id: String,
}

/// What a [`WorkerResult`] carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResultKind {
    Bucket,
    Records,
    Influencers,
    Quantiles,
    ModelSizeStats,
    ModelSnapshot,
    CategoryDefinition,
    FlushAcknowledgement,
}

/// One decoded worker output document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub influencers: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantiles: Option<Quantiles>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_size_stats: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_snapshot: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_definition: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flush: Option<FlushAcknowledgement>,
}

impl WorkerResult {
    /// Kinds present in this document, in declaration order. Empty for a
    /// document with no recognised key.
    #[must_use]
    pub fn kinds(&self) -> Vec<ResultKind> {
        [
            (self.bucket.is_some(), ResultKind::Bucket),
            (self.records.is_some(), ResultKind::Records),
            (self.influencers.is_some(), ResultKind::Influencers),
            (self.quantiles.is_some(), ResultKind::Quantiles),
            (self.model_size_stats.is_some(), ResultKind::ModelSizeStats),
            (self.model_snapshot.is_some(), ResultKind::ModelSnapshot),
            (self.category_definition.is_some(), ResultKind::CategoryDefinition),
            (self.flush.is_some(), ResultKind::FlushAcknowledgement),
        ]
        .into_iter()
        .filter_map(|(present, kind)| present.then_some(kind))
        .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds().is_empty()
    }
}
