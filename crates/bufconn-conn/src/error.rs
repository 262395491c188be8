use std::time::Duration;

/// Errors surfaced by a connection and its session handle.
#[derive(Debug, thiserror::Error)]
pub enum ConnError {
    /// A read did not complete before its deadline. Nothing was consumed.
    #[error("read timed out after {0:?}")]
    Timeout(Duration),

    /// The byte reader has exited and the buffer cannot satisfy the read.
    ///
    /// Returned as soon as that is known, even when the read was given a
    /// timeout that has not yet elapsed.
    #[error("connection closed")]
    Closed,

    /// The connection was stopped; queued work will never run.
    #[error("connection stopped")]
    Stopped,

    /// The operation queue is at capacity.
    #[error("operation queue full")]
    QueueFull,

    /// The scheduler thread panicked inside a handler or operation.
    #[error("scheduler panicked")]
    SchedulerPanicked,

    /// Writing to the connection failed. The connection keeps running.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] bufconn_transport::TransportError),
}

pub type Result<T> = std::result::Result<T, ConnError>;
