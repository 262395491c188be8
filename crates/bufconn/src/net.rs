//! Dialing and listening for the CLI. The library only wraps streams that
//! are already connected.

use std::io;
use std::net::{TcpListener, TcpStream};
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};
#[cfg(unix)]
use std::path::PathBuf;

use bufconn_transport::NetStream;
use tracing::{debug, info};

use crate::exit::{io_error, CliResult};

pub enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix { listener: UnixListener, path: PathBuf },
}

impl Listener {
    /// Bind `addr` as a TCP address, or as a socket path when `unix` is set.
    pub fn bind(addr: &str, unix: bool) -> CliResult<Self> {
        if unix {
            return Self::bind_unix(addr);
        }
        let listener = TcpListener::bind(addr).map_err(|err| io_error("bind failed", err))?;
        let local = listener
            .local_addr()
            .map_err(|err| io_error("bind failed", err))?;
        info!(addr = %local, "listening on tcp");
        Ok(Self::Tcp(listener))
    }

    #[cfg(unix)]
    fn bind_unix(path: &str) -> CliResult<Self> {
        let path = PathBuf::from(path);
        // Only replace leftovers from a previous run, never a regular file.
        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if !metadata.file_type().is_socket() {
                return Err(io_error(
                    "bind failed",
                    io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        "existing path is not a unix socket",
                    ),
                ));
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(|err| io_error("bind failed", err))?;
        }
        let listener = UnixListener::bind(&path).map_err(|err| io_error("bind failed", err))?;
        info!(?path, "listening on unix domain socket");
        Ok(Self::Unix { listener, path })
    }

    #[cfg(not(unix))]
    fn bind_unix(_path: &str) -> CliResult<Self> {
        Err(crate::exit::CliError::new(
            crate::exit::USAGE,
            "unix domain sockets are not supported on this platform",
        ))
    }

    /// Poll for connections instead of blocking so a Ctrl-C can be noticed.
    pub fn set_nonblocking(&self, nonblocking: bool) -> CliResult<()> {
        let result = match self {
            Self::Tcp(listener) => listener.set_nonblocking(nonblocking),
            #[cfg(unix)]
            Self::Unix { listener, .. } => listener.set_nonblocking(nonblocking),
        };
        result.map_err(|err| io_error("listener setup failed", err))
    }

    /// Accept one connection. Returns `Ok(None)` when a nonblocking
    /// listener has nothing pending.
    pub fn accept(&self) -> CliResult<Option<NetStream>> {
        let accepted: io::Result<NetStream> = match self {
            Self::Tcp(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(stream.into())
            }),
            #[cfg(unix)]
            Self::Unix { listener, .. } => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(stream.into())
            }),
        };
        match accepted {
            Ok(stream) => Ok(Some(stream)),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(err) => Err(io_error("accept failed", err)),
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Self::Unix { path, .. } = self {
            debug!(?path, "cleaning up socket file");
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Dial `addr` as a TCP address, or as a socket path when `unix` is set.
pub fn connect(addr: &str, unix: bool) -> CliResult<NetStream> {
    if unix {
        return connect_unix(addr);
    }
    let stream = TcpStream::connect(addr).map_err(|err| io_error("connect failed", err))?;
    debug!(addr, "connected over tcp");
    Ok(stream.into())
}

#[cfg(unix)]
fn connect_unix(path: &str) -> CliResult<NetStream> {
    let stream = UnixStream::connect(path).map_err(|err| io_error("connect failed", err))?;
    debug!(path, "connected to unix domain socket");
    Ok(stream.into())
}

#[cfg(not(unix))]
fn connect_unix(_path: &str) -> CliResult<NetStream> {
    Err(crate::exit::CliError::new(
        crate::exit::USAGE,
        "unix domain sockets are not supported on this platform",
    ))
}
