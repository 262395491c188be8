use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use bufconn_transport::{Endpoint, NetStream};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::debug;

use crate::config::ConnConfig;
use crate::error::{ConnError, Result};
use crate::handler::{DiscardMessage, HandlerSlot, MessageHandler, Operation};
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::reader;
use crate::scheduler::Scheduler;
use crate::session::Session;

/// State shared by the wrapper, the byte reader and the scheduler.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) lifecycle: Lifecycle,
    pub(crate) handler: HandlerSlot,
}

impl Shared {
    pub(crate) fn new(handler: Arc<dyn MessageHandler>) -> (Self, Receiver<()>) {
        let (lifecycle, stop_rx) = Lifecycle::new();
        let shared = Self {
            lifecycle,
            handler: HandlerSlot::new(handler),
        };
        (shared, stop_rx)
    }
}

/// A message-oriented wrapper around one established stream connection.
///
/// Once wrapped, the stream belongs to the connection: all reads and writes
/// go through handlers and queued operations, which the scheduler runs one
/// at a time. `Conn` is `Send + Sync`; share it behind an `Arc` to queue
/// work from several threads.
///
/// Only read failures stop the connection. A failed write is returned to
/// the callback that issued it and the connection keeps running.
pub struct Conn {
    ops: Sender<Operation>,
    shared: Arc<Shared>,
    delimiter: u8,
    local: Endpoint,
    peer: Endpoint,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

impl Conn {
    /// Wrap `stream`, splitting messages on `delimiter`.
    ///
    /// Pass [`DiscardMessage`] as `handler` for the default behaviour of
    /// reading and dropping each message.
    pub fn new(
        stream: impl Into<NetStream>,
        handler: impl MessageHandler,
        delimiter: u8,
    ) -> Result<Self> {
        Self::with_config(stream, handler, ConnConfig::with_delimiter(delimiter))
    }

    /// Wrap `stream` with explicit configuration.
    pub fn with_config(
        stream: impl Into<NetStream>,
        handler: impl MessageHandler,
        config: ConnConfig,
    ) -> Result<Self> {
        let stream = stream.into();
        let local = stream.local_endpoint()?;
        let peer = stream.peer_endpoint()?;

        let reader_stream = stream.try_clone()?;
        reader_stream.set_read_timeout(None)?;
        stream.set_write_timeout(config.write_timeout)?;

        let (shared, stop_rx) = Shared::new(Arc::new(handler));
        let shared = Arc::new(shared);
        let (pending_tx, pending_rx) = bounded(config.byte_queue_capacity);
        let (ops_tx, ops_rx) = bounded(config.op_queue_capacity);

        let session = Session::new(
            stream,
            config.delimiter,
            pending_rx.clone(),
            Arc::clone(&shared),
        );
        let scheduler = Scheduler::new(session, pending_rx, ops_rx, stop_rx).spawn()?;

        if let Err(err) = reader::spawn(
            reader_stream,
            pending_tx,
            Arc::clone(&shared),
            config.read_chunk_size,
        ) {
            shared.lifecycle.request_stop();
            let _ = scheduler.join();
            return Err(err.into());
        }

        debug!(local = %local, peer = %peer, delimiter = config.delimiter, "connection wrapped");

        Ok(Self {
            ops: ops_tx,
            shared,
            delimiter: config.delimiter,
            local,
            peer,
            scheduler: Mutex::new(Some(scheduler)),
        })
    }

    /// Queue an operation to run with exclusive access to the connection.
    ///
    /// Operations run in submission order relative to each other. Blocks
    /// while the operation queue is full. Returns [`ConnError::Stopped`] if
    /// the connection is stopping or stopped; the operation is dropped.
    pub fn queue_operation<F>(&self, op: F) -> Result<()>
    where
        F: FnOnce(&mut Session) + Send + 'static,
    {
        if !self.shared.lifecycle.is_active() {
            return Err(ConnError::Stopped);
        }
        self.ops
            .send(Box::new(op))
            .map_err(|_| ConnError::Stopped)
    }

    /// Queue an operation without blocking.
    ///
    /// Returns [`ConnError::QueueFull`] instead of waiting for room.
    pub fn try_queue_operation<F>(&self, op: F) -> Result<()>
    where
        F: FnOnce(&mut Session) + Send + 'static,
    {
        if !self.shared.lifecycle.is_active() {
            return Err(ConnError::Stopped);
        }
        self.ops.try_send(Box::new(op)).map_err(|err| match err {
            TrySendError::Full(_) => ConnError::QueueFull,
            TrySendError::Disconnected(_) => ConnError::Stopped,
        })
    }

    /// Replace the message handler.
    ///
    /// A handler already running (or already picked for a boundary) is not
    /// affected; the replacement runs from the next message boundary on.
    pub fn set_message_handler(&self, handler: impl MessageHandler) {
        self.shared.handler.replace(Arc::new(handler));
    }

    /// Restore the default [`DiscardMessage`] handler.
    pub fn reset_message_handler(&self) {
        self.set_message_handler(DiscardMessage);
    }

    /// Request a stop.
    ///
    /// The running handler or operation, if any, finishes first; nothing
    /// queued runs afterwards. Calling `stop` again is a no-op.
    pub fn stop(&self) {
        self.shared.lifecycle.request_stop();
    }

    /// Whether a stop has been requested.
    ///
    /// This turns true as soon as [`Conn::stop`] is called or a read fails,
    /// possibly while a callback is still finishing. Use [`Conn::state`] to
    /// tell stopping from stopped.
    pub fn is_stopped(&self) -> bool {
        !self.shared.lifecycle.is_active()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.shared.lifecycle.state()
    }

    /// Block until the scheduler has exited and the stream is closed.
    ///
    /// Does not itself request a stop. Must not be called from inside a
    /// handler or operation. Later calls return immediately.
    pub fn join(&self) -> Result<()> {
        let handle = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match handle {
            Some(handle) => handle.join().map_err(|_| ConnError::SchedulerPanicked),
            None => Ok(()),
        }
    }

    /// The message delimiter.
    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Local end of the underlying stream.
    pub fn local_endpoint(&self) -> &Endpoint {
        &self.local
    }

    /// Remote end of the underlying stream.
    pub fn peer_endpoint(&self) -> &Endpoint {
        &self.peer
    }
}

impl Drop for Conn {
    fn drop(&mut self) {
        self.shared.lifecycle.request_stop();
    }
}

impl std::fmt::Debug for Conn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn")
            .field("local", &self.local)
            .field("peer", &self.peer)
            .field("delimiter", &self.delimiter)
            .field("state", &self.state())
            .finish()
    }
}
