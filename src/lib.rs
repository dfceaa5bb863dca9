//! # Jobflow
//!
//! The **job data path** of an anomaly-detection service: everything between a
//! raw record arriving for a job and that job's analytic worker, and between
//! the worker's output stream and typed results.
//!
//! ## Key Features
//!
//! - **Field transforms** - regex extract/split, exclude filters, date parsing and text clean-up
//! - **Configurable chains** - transforms declared as JSON, verified and resolved against the job's fields
//! - **Partitioned routing** - every record with the same key reaches the same worker, in order
//! - **Streaming decoding** - worker output decoded incrementally as bytes arrive
//! - **Coordination primitives** - a periodic task scheduler and a keyed lock manager with draining stop
//! - **Structured logging** - every component logs through a `tracing` span supplied by its owner
//!
//! ## Quick Start
//!
//! ```
//! use jobflow::pipeline::{JobPipeline, JobPipelineConfig};
//! use jobflow::testing::RecordingSink;
//! use jobflow::transform::TransformConfig;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let config = JobPipelineConfig {
//!     input_fields: vec!["host".into(), "url".into()],
//!     output_fields: vec!["host".into(), "domain".into()],
//!     partition_field: Some("host".into()),
//!     transforms: vec![
//!         TransformConfig::new("extract", ["url"])
//!             .with_arguments([r"https?://([^/]+)"])
//!             .with_outputs(["domain"]),
//!     ],
//!     ..JobPipelineConfig::default()
//! };
//! let sinks = vec![RecordingSink::new(), RecordingSink::new()];
//! let mut job = JobPipeline::new(config, sinks.clone(), tracing::Span::none())?;
//!
//! job.process(["web-1", "https://example.com/a"])?;
//! job.flush()?;
//! assert_eq!(job.counts().output_records, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! A [`Record`] holds string fields in three areas: the raw **input**, the
//! **output** sent to the worker, and **scratch** space for intermediate values.
//! Transforms address fields with [`FieldRef`]s that are resolved from names
//! once, when the job is set up, and checked against the [`RecordLayout`].
//!
//! ### Transforms
//!
//! A [`Transform`] reports routine data problems as a
//! [`TransformOutcome`] rather than an error. A [`TransformChain`] applies
//! transforms in order and decides, through its [`FailurePolicy`], whether a
//! failure abandons the record.
//!
//! ### Routing
//!
//! A [`PartitionRouter`] buffers encoded records per worker and picks the
//! worker with a stable hash of the partition key.
//!
//! ### Decoding
//!
//! A [`StreamingResultDecoder`] turns a separator-terminated stream of JSON
//! documents into values (or [`WorkerResult`]s), however the stream is split
//! into reads.
//!
//! ### Coordination
//!
//! [`PeriodicTaskScheduler`] runs maintenance tasks such as persisting
//! quantiles, and [`KeyedLockManager`] serialises operations on one job.
//! Both stop gracefully with a bounded wait.
//!
//! ## Module Overview
//!
//! - [`record`] - records, field references and layouts
//! - [`transform`] - transforms, chains and transform configuration
//! - [`router`] - partitioned, buffered routing to worker sinks
//! - [`decoder`] - incremental result stream decoding
//! - [`result`] - typed worker result documents
//! - [`pipeline`] - one job's transform, encode and route path
//! - [`counts`] - per-job data counts
//! - [`scheduler`] - periodic task execution
//! - [`lock`] - keyed locks
//! - [`error`] - error types
//! - [`testing`] - test doubles (feature `testing`)

pub mod counts;
pub mod decoder;
pub mod error;
pub mod lock;
pub mod pipeline;
pub mod record;
pub mod result;
pub mod router;
pub mod scheduler;
pub mod transform;

#[cfg(feature = "testing")]
pub mod testing;

// Re-export commonly used types
pub use counts::DataCounts;
pub use decoder::StreamingResultDecoder;
pub use error::{ConfigError, DecodeError, LockError, RouteError, SchedulerError, TransformError};
pub use lock::{KeyedLockManager, LockHandle};
pub use pipeline::{Disposition, JobPipeline, JobPipelineConfig};
pub use record::{Area, FieldRef, Record, RecordLayout};
pub use result::WorkerResult;
pub use router::{PartitionRouter, RouterConfig, WriteFailurePolicy};
pub use scheduler::PeriodicTaskScheduler;
pub use transform::{
    ChainOutcome, FailurePolicy, Transform, TransformChain, TransformConfig, TransformOutcome,
};
