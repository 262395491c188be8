/// Errors that can occur on a wrapped stream socket.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An I/O error occurred on the stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The local or peer address of the stream could not be resolved.
    #[error("failed to resolve {side} endpoint: {source}")]
    Endpoint {
        side: &'static str,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, TransportError>;
