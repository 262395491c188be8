use bytes::{Buf, Bytes, BytesMut};

use crate::scanner::DelimiterScanner;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Bytes received from the peer but not yet consumed by a read.
///
/// Bytes are appended at the back and consumed from the front, in strict
/// arrival order; a consumed byte is never handed out again. The buffer
/// keeps running totals so `received() - consumed() == len()` always holds.
#[derive(Debug)]
pub struct ReadBuffer {
    buf: BytesMut,
    scanner: DelimiterScanner,
    received: u64,
    consumed: u64,
    /// Delimiters among the unconsumed bytes.
    delimiters: usize,
}

impl ReadBuffer {
    /// Create an empty buffer that splits messages on `delimiter`.
    pub fn new(delimiter: u8) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            scanner: DelimiterScanner::new(delimiter),
            received: 0,
            consumed: 0,
            delimiters: 0,
        }
    }

    /// Append one received byte.
    pub fn push(&mut self, byte: u8) {
        self.buf.extend_from_slice(&[byte]);
        self.received += 1;
        if byte == self.delimiter() {
            self.delimiters += 1;
        }
    }

    /// Append a run of received bytes.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        self.received += bytes.len() as u64;
        self.delimiters += count_delimiters(bytes, self.delimiter());
    }

    /// Number of unconsumed bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Total bytes ever appended.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Total bytes ever consumed.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// The message delimiter.
    pub fn delimiter(&self) -> u8 {
        self.scanner.delimiter()
    }

    /// View of the unconsumed bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Number of complete messages buffered. Constant time.
    pub fn complete_messages(&self) -> usize {
        self.delimiters
    }

    /// Whether a complete message is buffered.
    pub fn has_message(&mut self) -> bool {
        self.scanner.find(&self.buf).is_some()
    }

    /// Remove and return exactly the first `n` bytes.
    ///
    /// Returns `None` and leaves the buffer untouched if fewer than `n`
    /// bytes are buffered.
    pub fn take(&mut self, n: usize) -> Option<Bytes> {
        if self.buf.len() < n {
            return None;
        }
        let out = self.buf.split_to(n).freeze();
        self.delimiters -= count_delimiters(&out, self.delimiter());
        self.scanner.consumed(n);
        self.consumed += n as u64;
        Some(out)
    }

    /// Remove and return the first complete message, without its delimiter.
    ///
    /// Consumes through and including the first delimiter. Returns `None`
    /// and leaves the buffer untouched if no delimiter is buffered.
    pub fn take_message(&mut self) -> Option<Bytes> {
        let end = self.scanner.find(&self.buf)?;
        let msg = self.buf.split_to(end).freeze();
        self.buf.advance(1);
        self.delimiters -= 1;
        self.scanner.reset();
        self.consumed += end as u64 + 1;
        Some(msg)
    }
}

fn count_delimiters(bytes: &[u8], delimiter: u8) -> usize {
    bytes.iter().filter(|&&b| b == delimiter).count()
}
