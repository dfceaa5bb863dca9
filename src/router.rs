//! Partitioned routing of encoded records to a job's worker sinks.
//!
//! A [`PartitionRouter`] owns `N` byte sinks (pipes to worker processes, files,
//! sockets) with one buffer each. [`PartitionRouter::route_to_job`] picks a
//! sink from the partition key, so every record with the same key reaches the
//! same worker in call order; [`PartitionRouter::route_to_all`] broadcasts
//! (control messages, headers).
//!
//! # Notes
//! - The route is `fnv1a_64(key) % N`. N is fixed for the router's lifetime;
//!   there is no rebalancing when the worker count changes.
//! - Buffers are drained when the next append would overflow them, on
//!   [`flush`](PartitionRouter::flush), and on drop.
//! - The router is single-writer: it takes `&mut self` and holds no locks.

use std::io::Write;

use serde::Deserialize;
use tracing::Span;

use crate::error::{ConfigError, RouteError};

/// Default per-sink buffer size: 1 MiB.
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// What happens to a buffer whose sink rejects a write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteFailurePolicy {
    /// Log the failure, discard the buffered bytes and keep going. The other
    /// routes are unaffected.
    #[default]
    DropAndLog,
    /// Discard the buffered bytes and return [`RouteError::Write`].
    Propagate,
}

/// Router tuning supplied by the job configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Per-sink buffer capacity in bytes.
    pub buffer_size: usize,
    pub write_failure_policy: WriteFailurePolicy,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            write_failure_policy: WriteFailurePolicy::default(),
        }
    }
}

/// Stable 64-bit FNV-1a hash of a partition key.
#[must_use]
pub fn fnv1a_64(key: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    key.bytes()
        .fold(OFFSET, |h, b| (h ^ u64::from(b)).wrapping_mul(PRIME))
}

struct Route<W> {
    sink: W,
    buffer: Vec<u8>,
}

/// Buffers and routes payloads to one of `N` sinks.
pub struct PartitionRouter<W: Write> {
    routes: Vec<Route<W>>,
    config: RouterConfig,
    span: Span,
}

impl<W: Write> PartitionRouter<W> {
    /// Router with 1 MiB buffers that logs and drops failed writes.
    ///
    /// # Errors
    /// Returns [`ConfigError::NoRoutes`] if `sinks` is empty.
    pub fn new(sinks: Vec<W>) -> Result<Self, ConfigError> {
        Self::with_config(sinks, RouterConfig::default(), Span::none())
    }

    /// Router with explicit configuration and logging span.
    ///
    /// # Errors
    /// Returns [`ConfigError::NoRoutes`] if `sinks` is empty.
    pub fn with_config(
        sinks: Vec<W>,
        config: RouterConfig,
        span: Span,
    ) -> Result<Self, ConfigError> {
        if sinks.is_empty() {
            return Err(ConfigError::NoRoutes);
        }
        let capacity = config.buffer_size.max(1);
        let routes = sinks
            .into_iter()
            .map(|sink| Route {
                sink,
                buffer: Vec::with_capacity(capacity),
            })
            .collect();
        Ok(Self {
            routes,
            config,
            span,
        })
    }

    /// Number of routes (`N`).
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Route selected for `partition_key`. Pure function of the key and `N`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn route_for(&self, partition_key: &str) -> usize {
        (fnv1a_64(partition_key) % self.routes.len() as u64) as usize
    }

    /// Bytes currently buffered for `route`.
    #[must_use]
    pub fn buffered(&self, route: usize) -> usize {
        self.routes.get(route).map_or(0, |r| r.buffer.len())
    }

    /// Append `payload` to every route.
    ///
    /// # Errors
    /// Only with [`WriteFailurePolicy::Propagate`]: the first failed drain.
    /// Every route still receives the payload.
    pub fn route_to_all(&mut self, payload: &[u8]) -> Result<(), RouteError> {
        let mut first_err = None;
        for route in 0..self.routes.len() {
            if let Err(err) = self.append(route, payload) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Append `payload` to the route selected by `partition_key`. Returns
    /// the route used.
    ///
    /// # Errors
    /// Only with [`WriteFailurePolicy::Propagate`]: a failed drain of that
    /// route's buffer.
    pub fn route_to_job(&mut self, partition_key: &str, payload: &[u8]) -> Result<usize, RouteError> {
        let route = self.route_for(partition_key);
        self.append(route, payload)?;
        Ok(route)
    }

    /// Drain every non-empty buffer to its sink. Empty buffers cause no
    /// writes, so a second flush in a row writes nothing.
    ///
    /// # Errors
    /// Only with [`WriteFailurePolicy::Propagate`]: the first failed route.
    /// Every route is still attempted.
    pub fn flush(&mut self) -> Result<(), RouteError> {
        let mut first_err = None;
        for route in 0..self.routes.len() {
            if let Err(err) = self.drain(route) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Flush and hand back the sinks.
    ///
    /// # Errors
    /// As [`flush`](Self::flush).
    pub fn into_sinks(mut self) -> Result<Vec<W>, RouteError> {
        let flushed = self.flush();
        let routes = std::mem::take(&mut self.routes);
        flushed.map(|()| routes.into_iter().map(|r| r.sink).collect())
    }

    fn append(&mut self, route: usize, payload: &[u8]) -> Result<(), RouteError> {
        let capacity = self.config.buffer_size.max(1);
        let mut result = Ok(());
        if self.routes[route].buffer.len() + payload.len() > capacity {
            result = self.drain(route);
        }
        if payload.len() >= capacity {
            // Too big to buffer: write straight through.
            let r = &mut self.routes[route];
            let written = r.sink.write_all(payload).and_then(|()| r.sink.flush());
            return result.and(self.handle(route, written, payload.len()));
        }
        self.routes[route].buffer.extend_from_slice(payload);
        result
    }

    fn drain(&mut self, route: usize) -> Result<(), RouteError> {
        let r = &mut self.routes[route];
        if r.buffer.is_empty() {
            return Ok(());
        }
        let len = r.buffer.len();
        let written = r.sink.write_all(&r.buffer).and_then(|()| r.sink.flush());
        r.buffer.clear();
        self.handle(route, written, len)
    }

    fn handle(
        &self,
        route: usize,
        written: std::io::Result<()>,
        len: usize,
    ) -> Result<(), RouteError> {
        match written {
            Ok(()) => {
                tracing::trace!(parent: &self.span, route, bytes = len, "drained route");
                Ok(())
            }
            Err(source) => {
                tracing::error!(
                    parent: &self.span,
                    route,
                    bytes = len,
                    error = %source,
                    "failed to write to route; buffered data discarded"
                );
                match self.config.write_failure_policy {
                    WriteFailurePolicy::DropAndLog => Ok(()),
                    WriteFailurePolicy::Propagate => Err(RouteError::Write { route, source }),
                }
            }
        }
    }
}

impl<W: Write> Drop for PartitionRouter<W> {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            tracing::error!(parent: &self.span, error = %err, "flush on drop failed");
        }
    }
}
