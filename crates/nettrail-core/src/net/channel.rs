use crate::config::ChannelConfig;
use crate::error::{Error, Result};
use crate::net::common::ErrorMapper;
use crate::net::socket::Socket;
use crate::net::{ipv4::Ipv4, ipv6::Ipv6, Network};
use crate::probe::{ProbeRequest, Response};
use std::fmt::{Debug, Formatter};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::instrument;

/// The maximum size of the IP packet we allow.
pub const MAX_PACKET_SIZE: usize = 1024;

/// The port used when discovering the local source address.
///
/// No packets are sent, connecting a UDP socket only selects a route.
const DISCOVERY_PORT: u16 = 80;

/// A channel for sending and receiving ICMP probes.
pub struct Channel<S: Socket> {
    read_timeout: Duration,
    send_socket: S,
    recv_socket: S,
    family_config: FamilyConfig,
}

/// The IP family configuration for the channel.
#[derive(Debug)]
enum FamilyConfig {
    V4(Ipv4),
    V6(Ipv6),
}

impl<S: Socket> Debug for Channel<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("read_timeout", &self.read_timeout)
            .field("family_config", &self.family_config)
            .finish_non_exhaustive()
    }
}

impl<S: Socket> Channel<S> {
    /// Create a `Channel`.
    ///
    /// This operation requires the `CAP_NET_RAW` capability on Linux.
    #[instrument(skip_all, level = "trace")]
    pub fn connect(config: &ChannelConfig) -> Result<Self> {
        tracing::debug!(?config);
        if usize::from(config.packet_size.0) > MAX_PACKET_SIZE {
            return Err(Error::InvalidPacketSize(usize::from(config.packet_size.0)));
        }
        let src_addr = match config.source_addr {
            Some(addr) if addr.is_ipv4() == config.target_addr.is_ipv4() => addr,
            Some(addr) => {
                return Err(Error::BadConfig(format!(
                    "source address {addr} and target address {} must be the same IP family",
                    config.target_addr
                )));
            }
            None => discover_local_addr::<S>(config.target_addr)?,
        };
        let send_socket = make_icmp_send_socket::<S>(config.target_addr)?;
        let recv_socket = make_recv_socket::<S>(config.target_addr)?;
        let family_config = match (src_addr, config.target_addr) {
            (IpAddr::V4(_), IpAddr::V4(dest_addr)) => FamilyConfig::V4(Ipv4 {
                dest_addr,
                packet_size: config.packet_size,
                payload_pattern: config.payload_pattern,
            }),
            (IpAddr::V6(src_addr), IpAddr::V6(dest_addr)) => FamilyConfig::V6(Ipv6 {
                src_addr,
                dest_addr,
                packet_size: config.packet_size,
                payload_pattern: config.payload_pattern,
            }),
            _ => unreachable!(),
        };
        Ok(Self {
            read_timeout: config.read_timeout,
            send_socket,
            recv_socket,
            family_config,
        })
    }
}

impl<S: Socket> Network for Channel<S> {
    #[instrument(skip(self), level = "trace")]
    fn send_probe(&mut self, probe: ProbeRequest) -> Result<()> {
        tracing::debug!(?probe);
        match &self.family_config {
            FamilyConfig::V4(ipv4) => ipv4.dispatch_icmp_probe(&mut self.send_socket, probe),
            FamilyConfig::V6(ipv6) => ipv6.dispatch_icmp_probe(&mut self.send_socket, probe),
        }
    }

    #[instrument(skip_all, level = "trace")]
    fn recv_probe(&mut self) -> Result<Option<Response>> {
        if !self.recv_socket.is_readable(self.read_timeout)? {
            return Ok(None);
        }
        let resp = match &self.family_config {
            FamilyConfig::V4(ipv4) => ipv4.recv_icmp_probe(&mut self.recv_socket),
            FamilyConfig::V6(ipv6) => ipv6.recv_icmp_probe(&mut self.recv_socket),
        }?;
        if let Some(resp) = &resp {
            tracing::debug!(?resp);
        }
        Ok(resp)
    }
}

/// Discover the local address which routes to the target address.
///
/// Note that no packets are transmitted by this method.
#[instrument(level = "trace")]
fn discover_local_addr<S: Socket>(target_addr: IpAddr) -> Result<IpAddr> {
    let mut socket = match target_addr {
        IpAddr::V4(_) => S::new_udp_dgram_socket_ipv4(),
        IpAddr::V6(_) => S::new_udp_dgram_socket_ipv6(),
    }?;
    socket.connect(SocketAddr::new(target_addr, DISCOVERY_PORT))?;
    Ok(socket.local_addr()?.ok_or(Error::MissingAddr)?.ip())
}

/// Make a socket for sending raw `ICMP` packets.
#[instrument(level = "trace")]
fn make_icmp_send_socket<S: Socket>(addr: IpAddr) -> Result<S> {
    match addr {
        IpAddr::V4(_) => S::new_icmp_send_socket_ipv4(),
        IpAddr::V6(_) => S::new_icmp_send_socket_ipv6(),
    }
    .map_err(Error::IoError)
    .map_err(ErrorMapper::permission_denied)
}

/// Make a socket for receiving raw `ICMP` packets.
#[instrument(level = "trace")]
fn make_recv_socket<S: Socket>(addr: IpAddr) -> Result<S> {
    match addr {
        IpAddr::V4(_) => S::new_recv_socket_ipv4(),
        IpAddr::V6(_) => S::new_recv_socket_ipv6(),
    }
    .map_err(Error::IoError)
    .map_err(ErrorMapper::permission_denied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults;
    use crate::net::socket::MockSocket;
    use crate::types::{PacketSize, PayloadPattern};
    use std::net::Ipv4Addr;
    use std::net::Ipv6Addr;

    #[test]
    fn test_connect_invalid_packet_size() {
        let config = ChannelConfig {
            source_addr: None,
            target_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            packet_size: PacketSize(1025),
            payload_pattern: PayloadPattern(0),
            read_timeout: defaults::DEFAULT_READ_TIMEOUT,
        };
        let err = Channel::<MockSocket>::connect(&config).unwrap_err();
        assert!(matches!(err, Error::InvalidPacketSize(1025)));
    }

    #[test]
    fn test_connect_mixed_family() {
        let config = ChannelConfig {
            source_addr: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            target_addr: IpAddr::V6(Ipv6Addr::LOCALHOST),
            packet_size: defaults::DEFAULT_PACKET_SIZE,
            payload_pattern: PayloadPattern(0),
            read_timeout: defaults::DEFAULT_READ_TIMEOUT,
        };
        let err = Channel::<MockSocket>::connect(&config).unwrap_err();
        assert!(matches!(err, Error::BadConfig(_)));
    }
}
