use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

/// One end of a connected stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// An IP socket address.
    Tcp(SocketAddr),
    /// A Unix domain socket. Unnamed sockets (e.g. from `socketpair`) have no path.
    Unix(Option<PathBuf>),
}

impl Endpoint {
    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match self {
            Endpoint::Tcp(_) => "tcp",
            Endpoint::Unix(_) => "unix",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
            Endpoint::Unix(Some(path)) => write!(f, "unix://{}", path.display()),
            Endpoint::Unix(None) => f.write_str("unix://(unnamed)"),
        }
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Endpoint::Tcp(addr)
    }
}
