/// Finds the first delimiter byte in a growing buffer.
///
/// The scanner remembers how much of the buffer is already known to be
/// delimiter-free, so polling the same buffer as it grows only looks at
/// new bytes. The owner must report every consumption from the front via
/// [`DelimiterScanner::consumed`].
#[derive(Debug, Clone)]
pub struct DelimiterScanner {
    delimiter: u8,
    scanned: usize,
}

impl DelimiterScanner {
    pub fn new(delimiter: u8) -> Self {
        Self {
            delimiter,
            scanned: 0,
        }
    }

    /// The delimiter this scanner looks for.
    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Index of the first delimiter in `buf`, if any.
    ///
    /// `buf` must be the same buffer (minus consumed prefixes) passed to
    /// previous calls.
    pub fn find(&mut self, buf: &[u8]) -> Option<usize> {
        let start = self.scanned.min(buf.len());
        match buf[start..].iter().position(|&b| b == self.delimiter) {
            Some(offset) => {
                self.scanned = start + offset;
                Some(start + offset)
            }
            None => {
                self.scanned = buf.len();
                None
            }
        }
    }

    /// Account for `n` bytes removed from the front of the buffer.
    pub fn consumed(&mut self, n: usize) {
        self.scanned = self.scanned.saturating_sub(n);
    }

    /// Forget all scan progress.
    pub fn reset(&mut self) {
        self.scanned = 0;
    }
}
