//! Delimiter-framed messages over a single stream connection.
//!
//! bufconn wraps one established TCP or Unix domain stream and serializes
//! all access to it: message handlers and queued operations run one at a
//! time, each with exclusive use of the read buffer and the socket.
//!
//! # Crate Structure
//!
//! - [`transport`]: Connected stream sockets and their endpoints
//! - [`frame`]: Read buffer, delimiter scanning and message encoding
//! - [`conn`]: The connection wrapper, its scheduler and session handle
//!
//! The most used types are re-exported at the root.

/// Re-export transport types.
pub mod transport {
    pub use bufconn_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use bufconn_frame::*;
}

/// Re-export connection types.
pub mod conn {
    pub use bufconn_conn::*;
}

pub use bufconn_conn::{
    Conn, ConnConfig, ConnError, DiscardMessage, LifecycleState, MessageHandler, Session,
};
pub use bufconn_transport::{Endpoint, NetStream};
