//! One job's record path: transform, encode, route.
//!
//! A [`JobPipeline`] is built from a [`JobPipelineConfig`] and the job's worker
//! sinks. For each raw record it
//! 1. loads the values into the input area of a reusable [`Record`],
//! 2. copies input fields that are also job outputs into the output area,
//! 3. runs the [`TransformChain`],
//! 4. encodes the output area with [`encode_record`], and
//! 5. routes the bytes by the partition field's value.
//!
//! Excluded records, failed transforms and unparseable dates are counted in
//! [`DataCounts`] and logged; they never fail the call. Only sink failures
//! under [`WriteFailurePolicy::Propagate`](crate::router::WriteFailurePolicy)
//! do.
//!
//! # Record encoding
//!
//! A record is a big-endian `i32` field count, then for each field a
//! big-endian `i32` byte length followed by the UTF-8 bytes.

use std::io::{self, Write};

use anyhow::{Context, Result};
use bytes::{BufMut, BytesMut};
use serde::Deserialize;
use tracing::Span;

use crate::counts::DataCounts;
use crate::error::{ConfigError, TransformError};
use crate::record::{Area, FieldRef, Record, RecordLayout};
use crate::router::{PartitionRouter, RouterConfig};
use crate::transform::{ChainOutcome, FailurePolicy, TransformChain, TransformConfig};

/// Everything the job manager supplies to set up a job's record path.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct JobPipelineConfig {
    /// Names of the raw record's fields, in order.
    pub input_fields: Vec<String>,
    /// Names of the fields sent to the worker, in order.
    pub output_fields: Vec<String>,
    /// Field whose value picks the route. Without one every record takes the
    /// route of the empty key.
    pub partition_field: Option<String>,
    pub transforms: Vec<TransformConfig>,
    pub router: RouterConfig,
    pub failure_policy: FailurePolicy,
}

/// What [`JobPipeline::process`] did with a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Routed { route: usize },
    Excluded,
    Failed,
    InvalidDate,
}

/// Append the length-encoded form of `fields` to `buf`.
///
/// # Errors
/// Returns [`io::ErrorKind::InvalidInput`] if there are more fields, or a
/// field is longer, than an `i32` can describe.
pub fn encode_record<S: AsRef<str>>(fields: &[S], buf: &mut BytesMut) -> io::Result<()> {
    buf.put_i32(encoded_len(fields.len())?);
    for field in fields {
        let bytes = field.as_ref().as_bytes();
        buf.put_i32(encoded_len(bytes.len())?);
        buf.put_slice(bytes);
    }
    Ok(())
}

fn encoded_len(len: usize) -> io::Result<i32> {
    i32::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("length {len} does not fit a record header"),
        )
    })
}

/// Transforms, encodes and routes the records of one job.
pub struct JobPipeline<W: Write> {
    layout: RecordLayout,
    chain: TransformChain,
    router: PartitionRouter<W>,
    passthrough: Vec<(FieldRef, FieldRef)>,
    partition: Option<FieldRef>,
    record: Record,
    buf: BytesMut,
    counts: DataCounts,
    span: Span,
}

impl<W: Write> JobPipeline<W> {
    /// Build the layout, chain and router for a job.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] for an invalid transform, a partition field
    /// that neither the input nor a transform provides, or an empty `sinks`.
    pub fn new(config: JobPipelineConfig, sinks: Vec<W>, span: Span) -> Result<Self, ConfigError> {
        let mut layout = RecordLayout::new(&config.input_fields, &config.output_fields);
        let chain = TransformChain::from_configs(
            &config.transforms,
            &mut layout,
            config.failure_policy,
            &span,
        )?;
        let partition = config
            .partition_field
            .as_deref()
            .map(|name| {
                layout
                    .read_ref(name)
                    .ok_or_else(|| ConfigError::UnknownField(name.to_string()))
            })
            .transpose()?;
        let router = PartitionRouter::with_config(sinks, config.router, span.clone())?;
        let record = Record::new(&layout);
        let passthrough = layout.passthrough();
        tracing::debug!(
            parent: &span,
            transforms = chain.len(),
            routes = router.route_count(),
            scratch = layout.size(Area::Scratch),
            "job pipeline ready"
        );
        Ok(Self {
            layout,
            chain,
            router,
            passthrough,
            partition,
            record,
            buf: BytesMut::new(),
            counts: DataCounts::default(),
            span,
        })
    }

    #[must_use]
    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    #[must_use]
    pub fn counts(&self) -> &DataCounts {
        &self.counts
    }

    #[must_use]
    pub fn router(&self) -> &PartitionRouter<W> {
        &self.router
    }

    /// Send the output field names to every worker as a header record.
    ///
    /// # Errors
    /// Fails if a route write fails under the `Propagate` policy.
    pub fn write_header(&mut self) -> Result<()> {
        self.buf.clear();
        encode_record(self.layout.names(Area::Output), &mut self.buf)?;
        self.router
            .route_to_all(&self.buf)
            .context("broadcast header record")?;
        let routes = self.router.route_count() as u64;
        self.counts.routed_bytes += self.buf.len() as u64 * routes;
        Ok(())
    }

    /// Run one raw record through the pipeline.
    ///
    /// # Errors
    /// Fails only when the routed write fails under the `Propagate` policy or
    /// a field is too large to encode.
    pub fn process<I, S>(&mut self, values: I) -> Result<Disposition>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.counts.processed_records += 1;
        self.record.load(values);
        for &(from, to) in &self.passthrough {
            let value = self.record.get(from).to_string();
            self.record.set(to, value);
        }

        match self.chain.apply(&mut self.record) {
            Ok(ChainOutcome::Ok { failures }) => {
                self.counts.failed_transforms += failures as u64;
            }
            Ok(ChainOutcome::Excluded) => {
                self.counts.excluded_records += 1;
                return Ok(Disposition::Excluded);
            }
            Ok(ChainOutcome::Failed) => {
                self.counts.failed_transforms += 1;
                return Ok(Disposition::Failed);
            }
            Err(TransformError::CannotParseTimestamp { value, reason }) => {
                tracing::debug!(parent: &self.span, %value, %reason, "dropping record with invalid date");
                self.counts.invalid_date_records += 1;
                return Ok(Disposition::InvalidDate);
            }
        }

        self.buf.clear();
        encode_record(self.record.area(Area::Output), &mut self.buf)
            .context("encode output record")?;
        let key = self.partition.map_or("", |field| self.record.get(field));
        let route = self
            .router
            .route_to_job(key, &self.buf)
            .with_context(|| format!("route record with partition key {key:?}"))?;
        self.counts.output_records += 1;
        self.counts.routed_bytes += self.buf.len() as u64;
        Ok(Disposition::Routed { route })
    }

    /// Drain every route buffer to its sink.
    ///
    /// # Errors
    /// Fails if a drain fails under the `Propagate` policy.
    pub fn flush(&mut self) -> Result<()> {
        self.router.flush().context("flush job routes")
    }

    /// Flush and hand back the sinks with the final counts.
    ///
    /// # Errors
    /// As [`flush`](Self::flush).
    pub fn finish(self) -> Result<(Vec<W>, DataCounts)> {
        let counts = self.counts;
        let span = self.span;
        let sinks = self.router.into_sinks().context("flush job routes")?;
        tracing::debug!(
            parent: &span,
            processed = counts.processed_records,
            output = counts.output_records,
            "job pipeline finished"
        );
        Ok((sinks, counts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_count_then_length_prefixed_fields() {
        let mut buf = BytesMut::new();
        encode_record(&["ab", ""], &mut buf).unwrap();
        assert_eq!(
            &buf[..],
            &[0, 0, 0, 2, 0, 0, 0, 2, b'a', b'b', 0, 0, 0, 0][..]
        );
    }

    #[test]
    fn empty_record_is_just_a_count() {
        let mut buf = BytesMut::new();
        encode_record::<&str>(&[], &mut buf).unwrap();
        assert_eq!(&buf[..], &[0, 0, 0, 0][..]);
    }
}
