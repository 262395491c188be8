use std::time::Duration;

use bufconn_frame::DEFAULT_DELIMITER;

/// Default bound of the queue between the byte reader and the scheduler.
pub const DEFAULT_BYTE_QUEUE_CAPACITY: usize = 100;

/// Default bound of the operation queue.
pub const DEFAULT_OP_QUEUE_CAPACITY: usize = 10;

const DEFAULT_READ_CHUNK_SIZE: usize = 1024;

/// Configuration for a [`Conn`](crate::Conn).
#[derive(Debug, Clone)]
pub struct ConnConfig {
    /// Byte that terminates every message. Fixed for the connection's lifetime.
    pub delimiter: u8,
    /// Capacity of the pending byte queue. The byte reader blocks when it is full.
    pub byte_queue_capacity: usize,
    /// Capacity of the operation queue. `queue_operation` blocks when it is full.
    pub op_queue_capacity: usize,
    /// Largest single read the byte reader issues.
    pub read_chunk_size: usize,
    /// Write timeout applied to the stream.
    pub write_timeout: Option<Duration>,
}

impl Default for ConnConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            byte_queue_capacity: DEFAULT_BYTE_QUEUE_CAPACITY,
            op_queue_capacity: DEFAULT_OP_QUEUE_CAPACITY,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            write_timeout: None,
        }
    }
}

impl ConnConfig {
    /// Default configuration with an explicit delimiter.
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self {
            delimiter,
            ..Self::default()
        }
    }
}
