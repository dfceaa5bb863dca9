//! In-memory sinks that record what a router writes.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct SinkState {
    writes: Vec<Vec<u8>>,
    flushes: usize,
    failing: bool,
}

/// A [`Write`] that keeps every successful `write` call as a separate entry.
///
/// Clones share the same state, so a test can hand clones to a router and
/// inspect the originals afterwards.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    state: Arc<Mutex<SinkState>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose writes and flushes fail with [`io::ErrorKind::BrokenPipe`].
    #[must_use]
    pub fn failing() -> Self {
        let sink = Self::new();
        sink.set_failing(true);
        sink
    }

    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Every accepted write, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    #[must_use]
    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    #[must_use]
    pub fn flush_count(&self) -> usize {
        self.lock().flushes
    }

    /// All accepted bytes, concatenated.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        self.lock().writes.concat()
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.writes.clear();
        state.flushes = 0;
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn broken_pipe() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "recording sink is failing")
}

impl Write for RecordingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        if state.failing {
            return Err(broken_pipe());
        }
        state.writes.push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self.lock();
        if state.failing {
            return Err(broken_pipe());
        }
        state.flushes += 1;
        Ok(())
    }
}
