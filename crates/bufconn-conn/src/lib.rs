//! Serialized access to one stream connection.
//!
//! A [`Conn`] owns an established stream and runs two threads for it:
//!
//! - the byte reader, which pulls bytes off the socket into a bounded queue
//! - the scheduler, which is the only place the read buffer is touched,
//!   message handlers run, or queued operations run
//!
//! The scheduler handles one item at a time. A byte is appended to the
//! read buffer and, if it is the delimiter, the current [`MessageHandler`]
//! runs. A queued operation runs with the same exclusive [`Session`]. Only
//! one handler or operation ever runs at a time, so callbacks never race on
//! the buffer or interleave writes.
//!
//! A callback that blocks (including a [`Session::read_msg`] with no
//! timeout) blocks the whole connection until it returns. Nothing preempts
//! a running callback, and a stop request only takes effect between
//! callbacks.
//!
//! ```no_run
//! use std::net::TcpStream;
//! use std::time::Duration;
//!
//! use bufconn_conn::{Conn, Session};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let stream = TcpStream::connect("127.0.0.1:7000")?;
//! let conn = Conn::new(
//!     stream,
//!     |session: &mut Session| {
//!         if let Ok(msg) = session.read_msg_string(Duration::ZERO) {
//!             println!("unsolicited: {msg}");
//!         }
//!     },
//!     b';',
//! )?;
//!
//! conn.queue_operation(|session| {
//!     let _ = session.write_msg(b"ping");
//!     let _ = session.read_msg(Duration::from_secs(5));
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod conn;
pub mod error;
pub mod handler;
pub mod lifecycle;
mod reader;
mod scheduler;
pub mod session;

pub use config::{ConnConfig, DEFAULT_BYTE_QUEUE_CAPACITY, DEFAULT_OP_QUEUE_CAPACITY};
pub use conn::Conn;
pub use error::{ConnError, Result};
pub use handler::{DiscardMessage, MessageHandler, Operation};
pub use lifecycle::LifecycleState;
pub use session::Session;
