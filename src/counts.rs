//! Per-job data counts.
//!
//! [`DataCounts`] tallies what happened to every record a
//! [`JobPipeline`](crate::pipeline::JobPipeline) saw. The counts serialize to a
//! flat JSON object so the job manager can report or persist them.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

/// Record totals for one job.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DataCounts {
    /// Records handed to the pipeline.
    pub processed_records: u64,
    /// Records dropped by an exclude filter.
    pub excluded_records: u64,
    /// Transform failures. Under `Continue` one record can add several.
    pub failed_transforms: u64,
    /// Records dropped because a date field could not be parsed.
    pub invalid_date_records: u64,
    /// Records written to a route.
    pub output_records: u64,
    /// Encoded bytes written to routes, headers included.
    pub routed_bytes: u64,
}

impl DataCounts {
    /// Records that reached a worker as a share of those processed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn output_ratio(&self) -> f64 {
        if self.processed_records == 0 {
            return 0.0;
        }
        self.output_records as f64 / self.processed_records as f64
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Write the counts as pretty-printed JSON to `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut file =
            File::create(path).with_context(|| format!("create counts file {}", path.display()))?;
        let json = serde_json::to_string_pretty(self)?;
        file.write_all(json.as_bytes())
            .with_context(|| format!("write counts file {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_of_empty_counts_is_zero() {
        assert!(DataCounts::default().output_ratio().abs() < f64::EPSILON);
    }

    #[test]
    fn json_uses_field_names() {
        let counts = DataCounts {
            processed_records: 4,
            excluded_records: 1,
            ..DataCounts::default()
        };
        let json = counts.to_json();
        assert_eq!(json["processed_records"], 4);
        assert_eq!(json["excluded_records"], 1);
        assert_eq!(json["routed_bytes"], 0);
    }
}
