//! Connected stream sockets for bufconn.
//!
//! The caller dials, listens and accepts; this crate only wraps the
//! resulting stream so the layers above can treat TCP and Unix domain
//! sockets the same way:
//! - [`NetStream`] reads, writes, clones and shuts down the socket
//! - [`Endpoint`] names either end of it
//!
//! This is the lowest layer of bufconn.

pub mod endpoint;
pub mod error;
pub mod stream;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use stream::NetStream;
