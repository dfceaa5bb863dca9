//! Error types for every stage of the job data pipeline.
//!
//! Each concern gets its own enum so callers can tell a bad job configuration
//! (fail the job at setup) from a bad record (skip it) from a shutdown that ran
//! out of time (still running, not crashed).

use std::time::Duration;

use crate::record::FieldRef;

/// Job configuration problems. Raised once while a job is being set up and
/// never retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A regular expression argument failed to compile.
    #[error("invalid regex '{pattern}': {source}")]
    InvalidRegex {
        /// The offending pattern.
        pattern: String,
        /// Compiler diagnostic.
        #[source]
        source: regex::Error,
    },

    /// A condition operand does not suit its operator.
    #[error("invalid condition: operator '{operator}' cannot take operand '{operand}'")]
    InvalidCondition {
        /// Operator name as configured.
        operator: String,
        /// Operand as configured.
        operand: String,
    },

    /// Unrecognised condition operator name.
    #[error("unknown condition operator '{0}'")]
    UnknownOperator(String),

    /// A date pattern that `chrono` cannot interpret.
    #[error("invalid date pattern '{0}'")]
    InvalidDatePattern(String),

    /// Unrecognised transform name.
    #[error("unknown transform type '{0}'")]
    UnknownTransform(String),

    /// Wrong number of inputs for the transform type.
    #[error("transform type {transform} expected {expected} input(s), got {actual}")]
    InvalidInputCount {
        transform: String,
        expected: String,
        actual: usize,
    },

    /// Wrong number of arguments for the transform type.
    #[error("transform type {transform} expected {expected} argument(s), got {actual}")]
    InvalidArgumentCount {
        transform: String,
        expected: String,
        actual: usize,
    },

    /// Wrong number of outputs for the transform type.
    #[error("transform type {transform} expected {expected} output(s), got {actual}")]
    InvalidOutputCount {
        transform: String,
        expected: String,
        actual: usize,
    },

    /// Exclude filters need a condition.
    #[error("transform type {0} requires a condition")]
    MissingCondition(String),

    /// A transform reads a field nothing provides.
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// A field reference points outside the record layout.
    #[error("field reference {field} is outside the record layout (area size {size})")]
    FieldOutOfBounds {
        /// The reference that failed validation.
        field: FieldRef,
        /// Size of the area it points into.
        size: usize,
    },

    /// A router needs at least one sink.
    #[error("partition router requires at least one route")]
    NoRoutes,
}

/// Per-record failures for transforms whose input field is mandatory.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// The timestamp field did not match the configured format.
    #[error("cannot parse timestamp '{value}': {reason}")]
    CannotParseTimestamp {
        /// Raw field value.
        value: String,
        /// What went wrong.
        reason: String,
    },
}

/// Sink write failures surfaced by a router configured to propagate them.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// Writing a drained buffer to its sink failed. The buffer was cleared.
    #[error("write to route {route} failed: {source}")]
    Write {
        /// Index of the failing sink.
        route: usize,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Failures while decoding a worker's output stream.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Reading from the stream failed.
    #[error("i/o error reading worker output: {0}")]
    Io(#[from] std::io::Error),

    /// A complete document was not valid JSON for the target type.
    #[error("malformed document at stream offset {offset}: {source}")]
    Json {
        /// Byte offset of the document start within the stream.
        offset: u64,
        /// Parser diagnostic.
        #[source]
        source: serde_json::Error,
    },
}

/// Scheduler lifecycle failures.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// `start` was called on a scheduler that is already running.
    #[error("scheduler '{0}' already started")]
    AlreadyStarted(String),

    /// The background thread could not be spawned.
    #[error("failed to spawn scheduler thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The loop was still running when the stop timeout expired.
    #[error("scheduler '{name}' did not stop within {timeout:?}")]
    StopTimeout { name: String, timeout: Duration },
}

/// Keyed lock manager failures.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The manager is stopped (or stopping) and grants no new locks.
    #[error("lock manager is not running")]
    NotRunning,

    /// The key stayed locked for the whole wait.
    #[error("timed out after {timeout:?} waiting for lock on '{key}'")]
    AcquireTimeout { key: String, timeout: Duration },

    /// Handles were still held when the stop timeout expired.
    #[error("lock manager stop timed out after {timeout:?} with {outstanding} lock(s) held")]
    StopTimeout { outstanding: usize, timeout: Duration },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Area;

    #[test]
    fn input_count_message_names_transform() {
        let err = ConfigError::InvalidInputCount {
            transform: "concat".into(),
            expected: "[2, +inf)".into(),
            actual: 0,
        };
        assert_eq!(
            err.to_string(),
            "transform type concat expected [2, +inf) input(s), got 0"
        );
    }

    #[test]
    fn out_of_bounds_displays_field() {
        let err = ConfigError::FieldOutOfBounds {
            field: FieldRef::new(Area::Scratch, 4),
            size: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("scratch[4]"), "got: {msg}");
    }

    #[test]
    fn lock_stop_timeout_reports_outstanding() {
        let err = LockError::StopTimeout {
            outstanding: 3,
            timeout: Duration::from_millis(10),
        };
        assert!(err.to_string().contains("3 lock(s) held"));
    }
}
