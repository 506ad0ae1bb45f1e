//! Record splitter for the generation stream.
//!
//! The body is a sequence of SSE-like records separated by a blank line,
//! each of the form `data: <JSON>`. Bytes are carried over between chunks
//! so records, and multi-byte characters, may straddle chunk boundaries.

use bytes::{Buf, Bytes, BytesMut};
use futures::Stream;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Prefix that marks a payload record.
pub const DATA_PREFIX: &str = "data: ";

/// A `data: ` record with its prefix stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseRecord {
    pub data: String,
}

/// Carry-over buffer splitting raw bytes into completed records.
#[derive(Debug, Default)]
pub struct RecordSplitter {
    carry: BytesMut,
}

impl RecordSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every record it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseRecord> {
        self.carry.extend_from_slice(chunk);

        let mut records = Vec::new();
        while let Some((end, separator_len)) = find_separator(&self.carry) {
            let raw = self.carry.split_to(end);
            self.carry.advance(separator_len);
            if let Some(record) = decode_record(&raw) {
                records.push(record);
            }
        }
        records
    }

    /// Flush the trailing record left when the stream ends without a separator.
    pub fn finish(&mut self) -> Option<SseRecord> {
        if self.carry.is_empty() {
            return None;
        }
        let raw = self.carry.split();
        decode_record(&raw)
    }

    /// Number of bytes waiting for a separator.
    pub fn pending(&self) -> usize {
        self.carry.len()
    }
}

/// Locate the earliest blank-line separator: `(record_end, separator_len)`.
fn find_separator(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = find(buf, b"\n\n").map(|at| (at, 2));
    let crlf = find(buf, b"\r\n\r\n").map(|at| (at, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if b.0 <= a.0 { b } else { a }),
        (a, b) => a.or(b),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn decode_record(raw: &[u8]) -> Option<SseRecord> {
    let text = String::from_utf8_lossy(raw);
    // A record arriving right after a CRLF pair may carry stray line breaks.
    let text = text.trim_start_matches(['\r', '\n']);
    match text.strip_prefix(DATA_PREFIX) {
        Some(payload) => Some(SseRecord {
            data: payload.trim_end_matches(['\r', '\n']).to_string(),
        }),
        None => {
            if !text.is_empty() {
                tracing::trace!(record = %text, "ignoring record without data prefix");
            }
            None
        }
    }
}

/// Stream wrapper that yields `data: ` records from a byte stream.
pub struct SseStream<S> {
    inner: S,
    splitter: RecordSplitter,
    pending: VecDeque<SseRecord>,
    done: bool,
}

impl<S> SseStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            splitter: RecordSplitter::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<SseRecord, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            if let Some(record) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(record)));
            }
            if this.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.pending.extend(this.splitter.feed(&bytes));
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.done = true;
                    this.pending.extend(this.splitter.finish());
                }
                Poll::Pending => {
                    return Poll::Pending;
                }
            }
        }
    }
}

/// Create a record stream from a byte stream.
pub fn parse_sse_stream<S, E>(stream: S) -> SseStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    SseStream::new(stream)
}
