use std::fmt::{Display, Formatter};
use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// A diagnostic error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A diagnostic error.
#[derive(Error, Debug)]
pub enum Error {
    /// The target hostname could not be resolved to an address.
    #[error("failed to resolve {0}")]
    ResolutionFailed(String),
    /// Raw socket access was refused by the operating system.
    ///
    /// On Linux this typically means the process lacks the `CAP_NET_RAW`
    /// capability.
    #[error("permission denied for raw socket access")]
    PermissionDenied,
    #[error("invalid packet size: {0}")]
    InvalidPacketSize(usize),
    #[error("invalid packet: {0}")]
    PacketError(#[from] nettrail_packet::error::Error),
    #[error("invalid config: {0}")]
    BadConfig(String),
    #[error("IO error: {0}")]
    IoError(#[from] IoError),
    /// A probe could not be transmitted.
    #[error("probe failed to send: {0}")]
    SendFailed(IoError),
    #[error("missing address from socket call")]
    MissingAddr,
}

/// Custom IO error result.
pub type IoResult<T> = std::result::Result<T, IoError>;

/// Custom IO error.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("Connect error for {1}: {0}")]
    Connect(io::Error, SocketAddr),
    #[error("Sendto error for {1}: {0}")]
    SendTo(io::Error, SocketAddr),
    #[error("Failed to {1}: {0}")]
    Other(io::Error, IoOperation),
}

impl IoError {
    /// Get the custom error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connect(e, _) | Self::SendTo(e, _) | Self::Other(e, _) => ErrorKind::from(e),
        }
    }

    /// The underlying OS error number, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Connect(e, _) | Self::SendTo(e, _) | Self::Other(e, _) => e.raw_os_error(),
        }
    }
}

/// Custom error kind.
///
/// This includes additional error kinds that are not part of the standard [`io::ErrorKind`].
#[derive(Debug, Eq, PartialEq)]
pub enum ErrorKind {
    InProgress,
    HostUnreachable,
    NetUnreachable,
    Std(io::ErrorKind),
}

/// Io operation.
#[derive(Debug)]
pub enum IoOperation {
    NewSocket,
    SetNonBlocking,
    Select,
    RecvFrom,
    Read,
    LocalAddr,
    SetTtl,
    SetUnicastHopsV6,
}

impl Display for IoOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewSocket => write!(f, "create new socket"),
            Self::SetNonBlocking => write!(f, "set non-blocking"),
            Self::Select => write!(f, "select"),
            Self::RecvFrom => write!(f, "recv from"),
            Self::Read => write!(f, "read"),
            Self::LocalAddr => write!(f, "local addr"),
            Self::SetTtl => write!(f, "set TTL"),
            Self::SetUnicastHopsV6 => write!(f, "set unicast hops v6"),
        }
    }
}
