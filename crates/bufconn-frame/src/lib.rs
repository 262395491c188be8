//! Delimiter-terminated message framing.
//!
//! Messages on the wire are arbitrary byte sequences terminated by exactly
//! one delimiter byte. There is no length prefix and no escaping: a payload
//! that itself contains the delimiter is cut short at its first occurrence.
//!
//! This crate does no I/O. [`ReadBuffer`] accumulates received bytes and
//! hands out complete reads and messages, [`DelimiterScanner`] finds message
//! boundaries, and [`encode_message`] produces the wire form of a message.

pub mod buffer;
pub mod codec;
pub mod scanner;

pub use buffer::ReadBuffer;
pub use codec::{encode_message, DEFAULT_DELIMITER};
pub use scanner::DelimiterScanner;
