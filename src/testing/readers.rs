//! Readers that control how a byte stream is split into reads.

use std::io::{self, Read};

/// Serves `data` in reads of the sizes listed in the chunk plan.
///
/// Once the plan is used up the remainder comes in reads as large as the
/// caller's buffer allows. A read never returns more than the caller asked
/// for, and zero sizes in the plan are skipped so they never look like end
/// of stream.
#[derive(Clone, Debug)]
pub struct ChunkedReader {
    data: Vec<u8>,
    pos: usize,
    plan: Vec<usize>,
    next_chunk: usize,
    interrupt: bool,
    interrupted: bool,
}

impl ChunkedReader {
    pub fn new(data: impl Into<Vec<u8>>, plan: impl Into<Vec<usize>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
            plan: plan.into().into_iter().filter(|n| *n > 0).collect(),
            next_chunk: 0,
            interrupt: false,
            interrupted: false,
        }
    }

    /// Reads of exactly `size` bytes (the last may be shorter).
    pub fn fixed(data: impl Into<Vec<u8>>, size: usize) -> Self {
        let data = data.into();
        let size = size.max(1);
        let plan = vec![size; data.len().div_ceil(size)];
        Self::new(data, plan)
    }

    /// Fail every other read with [`io::ErrorKind::Interrupted`] before
    /// serving the chunk.
    #[must_use]
    pub fn interrupting(mut self) -> Self {
        self.interrupt = true;
        self
    }

    /// Bytes not yet served.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl Read for ChunkedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining() == 0 || buf.is_empty() {
            return Ok(0);
        }
        if self.interrupt {
            self.interrupted = !self.interrupted;
            if self.interrupted {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "chunked reader"));
            }
        }
        let want = match self.plan.get(self.next_chunk) {
            Some(size) => {
                self.next_chunk += 1;
                *size
            }
            None => usize::MAX,
        };
        let n = want.min(buf.len()).min(self.remaining());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
