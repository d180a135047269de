use crate::error::{Error, ErrorKind, Result};
use crate::net::channel::MAX_PACKET_SIZE;
use crate::net::common::ErrorMapper;
use crate::net::socket::Socket;
use crate::probe::{IcmpPacketCode, ProbeRequest, Response, ResponseData};
use crate::types::{PacketSize, PayloadPattern};
use nettrail_packet::checksum::icmp_ipv6_checksum;
use nettrail_packet::icmpv6::destination_unreachable::DestinationUnreachablePacket;
use nettrail_packet::icmpv6::echo_reply::EchoReplyPacket;
use nettrail_packet::icmpv6::echo_request::EchoRequestPacket;
use nettrail_packet::icmpv6::time_exceeded::TimeExceededPacket;
use nettrail_packet::icmpv6::{IcmpCode, IcmpPacket, IcmpTimeExceededCode, IcmpType};
use nettrail_packet::ipv6::Ipv6Packet;
use nettrail_packet::IpProtocol;
use std::io;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::time::SystemTime;
use tracing::instrument;

/// The maximum size of ICMP packet we allow.
const MAX_ICMP_PACKET_BUF: usize = MAX_PACKET_SIZE - Ipv6Packet::minimum_packet_size();

/// The maximum size of ICMP payload we allow.
const MAX_ICMP_PAYLOAD_BUF: usize = MAX_ICMP_PACKET_BUF - IcmpPacket::minimum_packet_size();

/// The minimum size of ICMP packets we allow.
const MIN_PACKET_SIZE_ICMP: usize =
    Ipv6Packet::minimum_packet_size() + IcmpPacket::minimum_packet_size();

/// IPv6 configuration.
#[derive(Debug)]
pub struct Ipv6 {
    pub src_addr: Ipv6Addr,
    pub dest_addr: Ipv6Addr,
    pub packet_size: PacketSize,
    pub payload_pattern: PayloadPattern,
}

impl Default for Ipv6 {
    fn default() -> Self {
        Self {
            src_addr: Ipv6Addr::UNSPECIFIED,
            dest_addr: Ipv6Addr::UNSPECIFIED,
            packet_size: PacketSize(0),
            payload_pattern: PayloadPattern(0),
        }
    }
}

impl Ipv6 {
    /// Dispatch an ICMP probe.
    ///
    /// The configured `packet_size` includes the IPv6 header and so the ICMP
    /// packet is 40 bytes smaller.
    #[instrument(skip(self, icmp_send_socket), level = "trace")]
    pub fn dispatch_icmp_probe<S: Socket>(
        &self,
        icmp_send_socket: &mut S,
        probe: ProbeRequest,
    ) -> Result<()> {
        let mut icmp_buf = [0_u8; MAX_ICMP_PACKET_BUF];
        let packet_size = usize::from(self.packet_size.0);
        if !(MIN_PACKET_SIZE_ICMP..=MAX_PACKET_SIZE).contains(&packet_size) {
            return Err(Error::InvalidPacketSize(packet_size));
        }
        let echo_request = self.make_echo_request_icmp_packet(
            &mut icmp_buf,
            probe.identifier.0,
            probe.sequence.0,
            icmp_payload_size(packet_size),
        )?;
        icmp_send_socket
            .set_unicast_hops_v6(probe.ttl.0)
            .map_err(Error::IoError)?;
        let remote_addr = SocketAddr::new(IpAddr::V6(self.dest_addr), 0);
        icmp_send_socket
            .send_to(echo_request.packet(), remote_addr)
            .map_err(Error::IoError)
            .map_err(|err| ErrorMapper::send_failed(err, ErrorKind::HostUnreachable))
            .map_err(|err| ErrorMapper::send_failed(err, ErrorKind::NetUnreachable))?;
        Ok(())
    }

    /// Receive an ICMP probe response.
    ///
    /// Raw `ICMPv6` sockets deliver the ICMP packet without the IPv6 header
    /// and so the source address is taken from the socket address instead.
    #[instrument(skip(self, recv_socket), level = "trace")]
    pub fn recv_icmp_probe<S: Socket>(&self, recv_socket: &mut S) -> Result<Option<Response>> {
        let mut buf = [0_u8; MAX_PACKET_SIZE];
        match recv_socket.recv_from(&mut buf) {
            Ok((bytes_read, addr)) => {
                let src_addr = match addr.ok_or(Error::MissingAddr)? {
                    SocketAddr::V6(addr) => *addr.ip(),
                    SocketAddr::V4(_) => return Ok(None),
                };
                match self.extract_probe_resp(&buf[..bytes_read], src_addr) {
                    Ok(resp) => Ok(resp),
                    Err(err @ Error::PacketError(_)) => {
                        tracing::debug!(?err, "discarding undecodable packet");
                        Ok(None)
                    }
                    Err(err) => Err(err),
                }
            }
            Err(err) => match err.kind() {
                ErrorKind::Std(io::ErrorKind::WouldBlock) => Ok(None),
                _ => Err(Error::IoError(err)),
            },
        }
    }

    fn extract_probe_resp(&self, buf: &[u8], src: Ipv6Addr) -> Result<Option<Response>> {
        let recv = SystemTime::now();
        let ip = IpAddr::V6(src);
        let icmp_v6 = IcmpPacket::new_view(buf)?;
        let icmp_code = icmp_v6.get_icmp_code();
        Ok(match icmp_v6.get_icmp_type() {
            IcmpType::TimeExceeded => {
                if IcmpTimeExceededCode::from(icmp_code) == IcmpTimeExceededCode::TtlExpired {
                    let packet = TimeExceededPacket::new_view(icmp_v6.packet())?;
                    let nested_ipv6 = Ipv6Packet::new_view(packet.payload())?;
                    extract_echo_request(&nested_ipv6)?.map(|(identifier, sequence)| {
                        Response::TimeExceeded(
                            ResponseData::new(recv, ip, identifier, sequence),
                            IcmpPacketCode(icmp_code.0),
                        )
                    })
                } else {
                    None
                }
            }
            IcmpType::DestinationUnreachable => {
                let packet = DestinationUnreachablePacket::new_view(icmp_v6.packet())?;
                let nested_ipv6 = Ipv6Packet::new_view(packet.payload())?;
                extract_echo_request(&nested_ipv6)?.map(|(identifier, sequence)| {
                    Response::DestinationUnreachable(
                        ResponseData::new(recv, ip, identifier, sequence),
                        IcmpPacketCode(icmp_code.0),
                    )
                })
            }
            IcmpType::EchoReply => {
                let packet = EchoReplyPacket::new_view(icmp_v6.packet())?;
                if icmp_ipv6_checksum(packet.packet(), src, self.src_addr) == packet.get_checksum()
                {
                    Some(Response::EchoReply(
                        ResponseData::new(
                            recv,
                            ip,
                            packet.get_identifier(),
                            packet.get_sequence(),
                        ),
                        IcmpPacketCode(icmp_code.0),
                    ))
                } else {
                    tracing::debug!("discarding echo reply with invalid checksum");
                    None
                }
            }
            _ => None,
        })
    }

    /// Create an ICMP `EchoRequest` packet.
    fn make_echo_request_icmp_packet<'a>(
        &self,
        icmp_buf: &'a mut [u8],
        identifier: u16,
        sequence: u16,
        payload_size: usize,
    ) -> Result<EchoRequestPacket<'a>> {
        let payload_buf = [self.payload_pattern.0; MAX_ICMP_PAYLOAD_BUF];
        let packet_size = IcmpPacket::minimum_packet_size() + payload_size;
        let mut icmp = EchoRequestPacket::new(&mut icmp_buf[..packet_size])?;
        icmp.set_icmp_type(IcmpType::EchoRequest);
        icmp.set_icmp_code(IcmpCode(0));
        icmp.set_identifier(identifier);
        icmp.set_sequence(sequence);
        icmp.set_payload(&payload_buf[..payload_size]);
        icmp.set_checksum(icmp_ipv6_checksum(
            icmp.packet(),
            self.src_addr,
            self.dest_addr,
        ));
        Ok(icmp)
    }
}

const fn icmp_payload_size(packet_size: usize) -> usize {
    let ip_header_size = Ipv6Packet::minimum_packet_size();
    let icmp_header_size = IcmpPacket::minimum_packet_size();
    packet_size - icmp_header_size - ip_header_size
}

/// Get the identifier and sequence from the original `EchoRequest` packet
/// embedded in the payload.
#[instrument(level = "trace")]
fn extract_echo_request(ipv6: &Ipv6Packet<'_>) -> Result<Option<(u16, u16)>> {
    if ipv6.get_next_header() != IpProtocol::IcmpV6 {
        return Ok(None);
    }
    let echo_request = EchoRequestPacket::new_view(ipv6.payload())?;
    if echo_request.get_icmp_type() != IcmpType::EchoRequest {
        return Ok(None);
    }
    Ok(Some((
        echo_request.get_identifier(),
        echo_request.get_sequence(),
    )))
}
