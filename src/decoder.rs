//! Incremental decoding of a worker's streamed result documents.
//!
//! The worker writes a continuous stream of JSON documents, each terminated by
//! a single separator byte (`\n` by default). Reads from the stream can split a
//! document anywhere, so the decoder keeps the unterminated tail in a pending
//! buffer and prepends it to the next chunk.
//!
//! Two ways to drive it:
//! - **Push**: [`StreamingResultDecoder::decode_chunk`] with bytes from any source
//! - **Pull**: iterate a decoder built over a [`Read`]er until end of stream
//!
//! # Notes
//! - Empty and whitespace-only spans between separators are skipped.
//! - Bytes left without a separator at end of stream are discarded, never
//!   emitted as a document.
//! - A malformed document is a hard error for the iterator, which yields the
//!   documents completed before it, then the error, then nothing. Pushed
//!   chunks skip the bad span; documents completed before it come back from
//!   the next [`decode_chunk`](StreamingResultDecoder::decode_chunk) call.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use bytes::{Buf, BytesMut};
use serde::de::DeserializeOwned;
use tracing::Span;

use crate::error::DecodeError;

/// Default document separator.
pub const DEFAULT_SEPARATOR: u8 = b'\n';

const READ_CHUNK: usize = 8 * 1024;

/// Decodes separator-terminated JSON documents from a byte stream.
///
/// `T` is the document type; the default, [`serde_json::Value`], accepts any
/// JSON. `R` is the underlying reader for pull-based use; push-only decoders
/// can use [`std::io::Empty`] via [`StreamingResultDecoder::push`].
pub struct StreamingResultDecoder<R, T = serde_json::Value> {
    reader: R,
    separator: u8,
    pending: BytesMut,
    /// Leading bytes of `pending` known to hold no separator.
    scanned: usize,
    /// Stream offset of the first byte in `pending`.
    offset: u64,
    ready: VecDeque<T>,
    error: Option<DecodeError>,
    done: bool,
    span: Span,
}

impl<T: DeserializeOwned> StreamingResultDecoder<std::io::Empty, T> {
    /// Decoder fed only through [`decode_chunk`](Self::decode_chunk).
    #[must_use]
    pub fn push() -> Self {
        Self::new(std::io::empty())
    }
}

impl<R: Read, T: DeserializeOwned> StreamingResultDecoder<R, T> {
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self::with_separator(reader, DEFAULT_SEPARATOR)
    }

    #[must_use]
    pub fn with_separator(reader: R, separator: u8) -> Self {
        Self {
            reader,
            separator,
            pending: BytesMut::new(),
            scanned: 0,
            offset: 0,
            ready: VecDeque::new(),
            error: None,
            done: false,
            span: Span::none(),
        }
    }

    /// Attach the span log events are recorded under.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Bytes held back waiting for a separator.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Append `chunk` and decode every document it completes, in order.
    ///
    /// # Errors
    /// Returns [`DecodeError::Json`] for the first complete span that is not a
    /// valid `T`. Documents decoded before it are held back and returned first
    /// by the next call; bytes after it stay pending.
    pub fn decode_chunk(&mut self, chunk: &[u8]) -> Result<Vec<T>, DecodeError> {
        let mut docs = std::mem::take(&mut self.ready);
        if let Err(err) = self.scan(chunk, &mut docs) {
            self.ready = docs;
            return Err(err);
        }
        Ok(docs.into())
    }

    fn scan<E: Extend<T>>(&mut self, chunk: &[u8], out: &mut E) -> Result<(), DecodeError> {
        self.pending.extend_from_slice(chunk);
        let mut scan_from = self.scanned;
        // Spans after a bad document are rescanned on the next call.
        self.scanned = 0;
        while let Some(pos) = self.pending[scan_from..]
            .iter()
            .position(|b| *b == self.separator)
        {
            let end = scan_from + pos;
            let doc_bytes = self.pending.split_to(end);
            self.pending.advance(1);
            let start = self.offset;
            self.offset += end as u64 + 1;
            scan_from = 0;

            if doc_bytes.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let doc = serde_json::from_slice(&doc_bytes)
                .map_err(|source| DecodeError::Json { offset: start, source })?;
            out.extend(std::iter::once(doc));
        }
        self.scanned = self.pending.len();
        Ok(())
    }

    /// Read the stream to its end, passing each document to `f`.
    ///
    /// # Errors
    /// Stops at the first [`DecodeError`] from the stream or a document.
    pub fn for_each_document<F>(&mut self, mut f: F) -> Result<(), DecodeError>
    where
        F: FnMut(T),
    {
        for doc in self.by_ref() {
            f(doc?);
        }
        Ok(())
    }

    /// Read one chunk and queue its documents. Returns `false` at end of stream.
    fn fill(&mut self) -> Result<bool, DecodeError> {
        let mut buf = [0u8; READ_CHUNK];
        let n = loop {
            match self.reader.read(&mut buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(DecodeError::Io(e)),
            }
        };
        if n == 0 {
            if !self.pending.is_empty() {
                tracing::debug!(
                    parent: &self.span,
                    bytes = self.pending.len(),
                    "discarding unterminated data at end of stream"
                );
                self.pending.clear();
                self.scanned = 0;
            }
            return Ok(false);
        }
        let mut ready = std::mem::take(&mut self.ready);
        let scanned = self.scan(&buf[..n], &mut ready);
        self.ready = ready;
        scanned.map(|()| true)
    }
}

impl<R: Read, T: DeserializeOwned> Iterator for StreamingResultDecoder<R, T> {
    type Item = Result<T, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(doc) = self.ready.pop_front() {
                return Some(Ok(doc));
            }
            if let Some(err) = self.error.take() {
                return Some(Err(err));
            }
            if self.done {
                return None;
            }
            match self.fill() {
                Ok(true) => {}
                Ok(false) => self.done = true,
                Err(err) => {
                    // Documents completed before the failure are still yielded.
                    self.done = true;
                    self.error = Some(err);
                }
            }
        }
    }
}
