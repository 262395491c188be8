use std::io::{ErrorKind, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bufconn_frame::{encode_message, ReadBuffer};
use bufconn_transport::NetStream;
use bytes::{Bytes, BytesMut};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::trace;

use crate::conn::Shared;
use crate::error::{ConnError, Result};
use crate::handler::{DiscardMessage, MessageHandler};

/// Exclusive access to the connection, handed to handlers and operations.
///
/// A session only exists on the scheduler thread, for the duration of one
/// callback. Reads and writes through it can never interleave with another
/// callback's.
pub struct Session {
    stream: NetStream,
    buffer: ReadBuffer,
    pending: Receiver<u8>,
    shared: Arc<Shared>,
    /// Delimiters pulled in by reads rather than by the scheduler.
    unannounced: usize,
}

impl Session {
    pub(crate) fn new(
        stream: NetStream,
        delimiter: u8,
        pending: Receiver<u8>,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            stream,
            buffer: ReadBuffer::new(delimiter),
            pending,
            shared,
            unannounced: 0,
        }
    }

    /// Read exactly `n` bytes.
    ///
    /// Waits until `n` unconsumed bytes are buffered, then removes and
    /// returns them. A zero `timeout` waits forever. On
    /// [`ConnError::Timeout`] or [`ConnError::Closed`] nothing is consumed.
    pub fn read(&mut self, n: usize, timeout: Duration) -> Result<Bytes> {
        self.wait_for(timeout, |buffer| buffer.take(n))
    }

    /// Read one message.
    ///
    /// Waits until a delimiter is buffered, then returns every byte before
    /// the first delimiter and consumes through the delimiter. Timeout
    /// semantics match [`Session::read`].
    pub fn read_msg(&mut self, timeout: Duration) -> Result<Bytes> {
        self.wait_for(timeout, ReadBuffer::take_message)
    }

    /// Read one message as text. Invalid UTF-8 is replaced, not rejected.
    pub fn read_msg_string(&mut self, timeout: Duration) -> Result<String> {
        let msg = self.read_msg(timeout)?;
        Ok(String::from_utf8_lossy(&msg).into_owned())
    }

    /// Write all of `bytes` to the connection and flush.
    ///
    /// Returns the number of bytes written. A write failure (including an
    /// expired write timeout) is returned to the caller and does not stop
    /// the connection; only read failures do.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.stream.write(&bytes[offset..]) {
                Ok(0) => return Err(ConnError::Io(ErrorKind::WriteZero.into())),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(ConnError::Io(err)),
            }
        }

        loop {
            match self.stream.flush() {
                Ok(()) => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(ConnError::Io(err)),
            }
        }

        trace!(bytes = offset, "wrote");
        Ok(offset)
    }

    /// Write `msg` followed by the delimiter, in one write.
    pub fn write_msg(&mut self, msg: impl AsRef<[u8]>) -> Result<usize> {
        let msg = msg.as_ref();
        let mut wire = BytesMut::with_capacity(msg.len() + 1);
        encode_message(msg, self.buffer.delimiter(), &mut wire);
        self.write(&wire)
    }

    /// Number of received bytes not yet consumed, including any still queued.
    pub fn buffered(&mut self) -> usize {
        self.drain_pending();
        self.buffer.len()
    }

    /// The message delimiter.
    pub fn delimiter(&self) -> u8 {
        self.buffer.delimiter()
    }

    /// Replace the message handler, starting with the next boundary.
    pub fn set_message_handler(&self, handler: impl MessageHandler) {
        self.shared.handler.replace(Arc::new(handler));
    }

    /// Restore the default handler, starting with the next boundary.
    pub fn reset_message_handler(&self) {
        self.set_message_handler(DiscardMessage);
    }

    /// Request a stop. The current callback still runs to completion.
    pub fn stop(&self) {
        self.shared.lifecycle.request_stop();
    }

    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        !self.shared.lifecycle.is_active()
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut ReadBuffer {
        &mut self.buffer
    }

    pub(crate) fn stream(&self) -> &NetStream {
        &self.stream
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Boundaries that arrived through a read during the last callback and
    /// whose message is still buffered. Resets the count.
    pub(crate) fn take_unannounced(&mut self) -> usize {
        let owed = std::mem::take(&mut self.unannounced);
        if owed == 0 {
            return 0;
        }
        owed.min(self.buffer.complete_messages())
    }

    /// Move every byte already queued by the reader into the buffer.
    fn drain_pending(&mut self) {
        while let Ok(byte) = self.pending.try_recv() {
            self.push_drained(byte);
        }
    }

    fn push_drained(&mut self, byte: u8) {
        if byte == self.buffer.delimiter() {
            self.unannounced += 1;
        }
        self.buffer.push(byte);
    }

    /// Poll the buffer with `ready` until it yields, blocking on the
    /// pending queue in between. Delimiters drained here are counted so the
    /// scheduler can announce them once the callback returns.
    fn wait_for<T>(
        &mut self,
        timeout: Duration,
        mut ready: impl FnMut(&mut ReadBuffer) -> Option<T>,
    ) -> Result<T> {
        let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);

        loop {
            self.drain_pending();
            if let Some(out) = ready(&mut self.buffer) {
                return Ok(out);
            }

            let next = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(ConnError::Timeout(timeout));
                    }
                    self.pending.recv_timeout(remaining)
                }
                None => self
                    .pending
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };

            match next {
                Ok(byte) => self.push_drained(byte),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(ConnError::Closed),
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("stream", &self.stream)
            .field("buffered", &self.buffer.len())
            .field("delimiter", &self.buffer.delimiter())
            .finish()
    }
}
