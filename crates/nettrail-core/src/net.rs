use crate::error::Result;
use crate::probe::{ProbeRequest, Response};

/// Common types and helper functions.
mod common;

/// IPv4 implementation.
mod ipv4;

/// IPv6 implementation.
mod ipv6;

/// Platform specific network code.
mod platform;

/// A network socket.
pub mod socket;

/// A channel for sending and receiving probes.
pub mod channel;

/// The platform specific socket type.
pub use platform::SocketImpl;

/// An abstraction over a network interface for probing.
#[cfg_attr(test, mockall::automock)]
pub trait Network {
    /// Send a `ProbeRequest`.
    fn send_probe(&mut self, probe: ProbeRequest) -> Result<()>;

    /// Receive the next ICMP packet and return a `Response`.
    ///
    /// Returns `None` if the read times out or the packet read is not one of the types expected.
    fn recv_probe(&mut self) -> Result<Option<Response>>;
}
