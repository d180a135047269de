use crate::error::IoResult as Result;
use std::net::SocketAddr;
use std::time::Duration;

#[cfg_attr(test, mockall::automock)]
pub trait Socket
where
    Self: Sized,
{
    /// Create an IPv4 socket for sending ICMP probes.
    fn new_icmp_send_socket_ipv4() -> Result<Self>;
    /// Create an IPv6 socket for sending ICMP probes.
    fn new_icmp_send_socket_ipv6() -> Result<Self>;
    /// Create an IPv4 socket for receiving ICMP probe responses.
    fn new_recv_socket_ipv4() -> Result<Self>;
    /// Create an IPv6 socket for receiving ICMP probe responses.
    fn new_recv_socket_ipv6() -> Result<Self>;
    /// Create a (non-raw) IPv4/UDP socket for source address discovery.
    fn new_udp_dgram_socket_ipv4() -> Result<Self>;
    /// Create a (non-raw) IPv6/UDP socket for source address discovery.
    fn new_udp_dgram_socket_ipv6() -> Result<Self>;
    fn connect(&mut self, address: SocketAddr) -> Result<()>;
    fn set_ttl(&mut self, ttl: u32) -> Result<()>;
    fn set_unicast_hops_v6(&mut self, hops: u8) -> Result<()>;
    fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> Result<()>;
    /// Returns true if the socket becomes readable before the timeout, false otherwise.
    fn is_readable(&mut self, timeout: Duration) -> Result<bool>;
    fn recv_from(&mut self, buf: &mut [u8]) -> Result<(usize, Option<SocketAddr>)>;
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
    fn local_addr(&mut self) -> Result<Option<SocketAddr>>;
}
