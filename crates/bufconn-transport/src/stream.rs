use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};

/// An established, bidirectional stream socket.
///
/// Wraps either a TCP stream or (on Unix) a Unix domain stream. The caller
/// performs dialing, listening and accepting; a `NetStream` only ever
/// represents a connection that is already open.
pub struct NetStream {
    inner: NetStreamInner,
}

enum NetStreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for NetStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            NetStreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            NetStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for NetStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            NetStreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            NetStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            NetStreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            NetStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl From<TcpStream> for NetStream {
    fn from(stream: TcpStream) -> Self {
        Self {
            inner: NetStreamInner::Tcp(stream),
        }
    }
}

#[cfg(unix)]
impl From<std::os::unix::net::UnixStream> for NetStream {
    fn from(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: NetStreamInner::Unix(stream),
        }
    }
}

impl NetStream {
    /// Try to clone this stream (creates a new file descriptor for the same socket).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            NetStreamInner::Tcp(stream) => Ok(Self::from(stream.try_clone()?)),
            #[cfg(unix)]
            NetStreamInner::Unix(stream) => Ok(Self::from(stream.try_clone()?)),
        }
    }

    /// Shut down both directions of the socket.
    ///
    /// Every handle cloned from this stream observes the shutdown: a blocked
    /// `read` on another handle returns EOF. Shutting down a socket the peer
    /// already closed is not an error.
    pub fn shutdown(&self) -> Result<()> {
        let result = match &self.inner {
            NetStreamInner::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            NetStreamInner::Unix(stream) => stream.shutdown(Shutdown::Both),
        };
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotConnected => {
                debug!("shutdown on already disconnected stream");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// The local end of the connection.
    pub fn local_endpoint(&self) -> Result<Endpoint> {
        let resolved = match &self.inner {
            NetStreamInner::Tcp(stream) => stream.local_addr().map(Endpoint::Tcp),
            #[cfg(unix)]
            NetStreamInner::Unix(stream) => stream
                .local_addr()
                .map(|addr| Endpoint::Unix(addr.as_pathname().map(Into::into))),
        };
        resolved.map_err(|source| TransportError::Endpoint {
            side: "local",
            source,
        })
    }

    /// The remote end of the connection.
    pub fn peer_endpoint(&self) -> Result<Endpoint> {
        let resolved = match &self.inner {
            NetStreamInner::Tcp(stream) => stream.peer_addr().map(Endpoint::Tcp),
            #[cfg(unix)]
            NetStreamInner::Unix(stream) => stream
                .peer_addr()
                .map(|addr| Endpoint::Unix(addr.as_pathname().map(Into::into))),
        };
        resolved.map_err(|source| TransportError::Endpoint {
            side: "peer",
            source,
        })
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            NetStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            NetStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            NetStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            NetStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            NetStreamInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            NetStreamInner::Unix(_) => "unix",
        }
    }
}

impl std::fmt::Debug for NetStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("NetStream");
        dbg.field("type", &self.transport_name());
        if let Ok(peer) = self.peer_endpoint() {
            dbg.field("peer", &format_args!("{peer}"));
        }
        dbg.finish()
    }
}
