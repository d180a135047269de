use crate::error::{Error, ErrorKind, Result};
use crate::net::channel::MAX_PACKET_SIZE;
use crate::net::common::ErrorMapper;
use crate::net::socket::Socket;
use crate::probe::{IcmpPacketCode, ProbeRequest, Response, ResponseData};
use crate::types::{PacketSize, PayloadPattern};
use nettrail_packet::checksum::icmp_ipv4_checksum;
use nettrail_packet::icmpv4::destination_unreachable::DestinationUnreachablePacket;
use nettrail_packet::icmpv4::echo_reply::EchoReplyPacket;
use nettrail_packet::icmpv4::echo_request::EchoRequestPacket;
use nettrail_packet::icmpv4::time_exceeded::TimeExceededPacket;
use nettrail_packet::icmpv4::{IcmpCode, IcmpPacket, IcmpTimeExceededCode, IcmpType};
use nettrail_packet::ipv4::Ipv4Packet;
use nettrail_packet::IpProtocol;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::SystemTime;
use tracing::instrument;

/// The maximum size of ICMP packet we allow.
const MAX_ICMP_PACKET_BUF: usize = MAX_PACKET_SIZE - Ipv4Packet::minimum_packet_size();

/// The maximum size of ICMP payload we allow.
const MAX_ICMP_PAYLOAD_BUF: usize = MAX_ICMP_PACKET_BUF - IcmpPacket::minimum_packet_size();

/// The minimum size of ICMP packets we allow.
const MIN_PACKET_SIZE_ICMP: usize =
    Ipv4Packet::minimum_packet_size() + IcmpPacket::minimum_packet_size();

/// IPv4 configuration.
///
/// Unlike `Ipv6` no source address is held, the `ICMPv4` checksum does not
/// cover a pseudo header.
#[derive(Debug)]
pub struct Ipv4 {
    pub dest_addr: Ipv4Addr,
    pub packet_size: PacketSize,
    pub payload_pattern: PayloadPattern,
}

impl Default for Ipv4 {
    fn default() -> Self {
        Self {
            dest_addr: Ipv4Addr::UNSPECIFIED,
            packet_size: PacketSize(0),
            payload_pattern: PayloadPattern(0),
        }
    }
}

impl Ipv4 {
    /// Dispatch an ICMP probe.
    ///
    /// The IP header is built by the kernel, only the ICMP packet is supplied.
    /// The configured `packet_size` includes the IP header and so the ICMP
    /// packet is 20 bytes smaller.
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
            .set_ttl(u32::from(probe.ttl.0))
            .map_err(Error::IoError)?;
        let remote_addr = SocketAddr::new(IpAddr::V4(self.dest_addr), 0);
        icmp_send_socket
            .send_to(echo_request.packet(), remote_addr)
            .map_err(Error::IoError)
            .map_err(|err| ErrorMapper::send_failed(err, ErrorKind::HostUnreachable))
            .map_err(|err| ErrorMapper::send_failed(err, ErrorKind::NetUnreachable))?;
        Ok(())
    }

    /// Receive an ICMP probe response.
    ///
    /// Decode failures are logged and discarded rather than treated as fatal,
    /// the socket sees every ICMP packet delivered to this host and many will
    /// not be for us.
    #[instrument(skip(self, recv_socket), level = "trace")]
    pub fn recv_icmp_probe<S: Socket>(&self, recv_socket: &mut S) -> Result<Option<Response>> {
        let mut buf = [0_u8; MAX_PACKET_SIZE];
        match recv_socket.read(&mut buf) {
            Ok(bytes_read) => match self.extract_probe_resp(&buf[..bytes_read]) {
                Ok(resp) => Ok(resp),
                Err(err @ Error::PacketError(_)) => {
                    tracing::debug!(?err, "discarding undecodable packet");
                    Ok(None)
                }
                Err(err) => Err(err),
            },
            Err(err) => match err.kind() {
                ErrorKind::Std(io::ErrorKind::WouldBlock) => Ok(None),
                _ => Err(Error::IoError(err)),
            },
        }
    }

    #[instrument(skip(self), level = "trace")]
    fn extract_probe_resp(&self, buf: &[u8]) -> Result<Option<Response>> {
        let recv = SystemTime::now();
        let ipv4 = Ipv4Packet::new_view(buf)?;
        let src = IpAddr::V4(ipv4.get_source());
        let icmp_v4 = IcmpPacket::new_view(ipv4.payload())?;
        let icmp_code = icmp_v4.get_icmp_code();
        Ok(match icmp_v4.get_icmp_type() {
            IcmpType::TimeExceeded => {
                if IcmpTimeExceededCode::from(icmp_code) == IcmpTimeExceededCode::TtlExpired {
                    let packet = TimeExceededPacket::new_view(icmp_v4.packet())?;
                    let nested_ipv4 = Ipv4Packet::new_view(packet.payload())?;
                    extract_echo_request(&nested_ipv4)?.map(|(identifier, sequence)| {
                        Response::TimeExceeded(
                            ResponseData::new(recv, src, identifier, sequence),
                            IcmpPacketCode(icmp_code.0),
                        )
                    })
                } else {
                    None
                }
            }
            IcmpType::DestinationUnreachable => {
                let packet = DestinationUnreachablePacket::new_view(icmp_v4.packet())?;
                let nested_ipv4 = Ipv4Packet::new_view(packet.payload())?;
                extract_echo_request(&nested_ipv4)?.map(|(identifier, sequence)| {
                    Response::DestinationUnreachable(
                        ResponseData::new(recv, src, identifier, sequence),
                        IcmpPacketCode(icmp_code.0),
                    )
                })
            }
            IcmpType::EchoReply => {
                let packet = EchoReplyPacket::new_view(icmp_v4.packet())?;
                if icmp_ipv4_checksum(packet.packet()) == packet.get_checksum() {
                    Some(Response::EchoReply(
                        ResponseData::new(
                            recv,
                            src,
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
        icmp.set_checksum(icmp_ipv4_checksum(icmp.packet()));
        Ok(icmp)
    }
}

const fn icmp_payload_size(packet_size: usize) -> usize {
    let ip_header_size = Ipv4Packet::minimum_packet_size();
    let icmp_header_size = IcmpPacket::minimum_packet_size();
    packet_size - icmp_header_size - ip_header_size
}

/// Get the identifier and sequence from the original `EchoRequest` packet
/// embedded in the payload.
#[instrument(level = "trace")]
fn extract_echo_request(ipv4: &Ipv4Packet<'_>) -> Result<Option<(u16, u16)>> {
    if ipv4.get_protocol() != IpProtocol::Icmp {
        return Ok(None);
    }
    let echo_request = EchoRequestPacket::new_view(ipv4.payload())?;
    if echo_request.get_icmp_type() != IcmpType::EchoRequest {
        return Ok(None);
    }
    Ok(Some((
        echo_request.get_identifier(),
        echo_request.get_sequence(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IoResult;
    use crate::mocket_read;
    use crate::net::socket::MockSocket;
    use crate::probe::ProbeRequest;
    use crate::types::{Sequence, SessionId, TimeToLive};
    use mockall::predicate;
    use std::str::FromStr;
    use test_case::test_case;

    // Test dispatching an IPv4/ICMP probe.
    #[test]
    fn test_dispatch_icmp_probe_no_payload() -> anyhow::Result<()> {
        let probe = make_probe();
        let dest_addr = Ipv4Addr::from_str("5.6.7.8")?;
        let packet_size = PacketSize(28);
        let payload_pattern = PayloadPattern(0x00);
        let expected_send_to_buf = hex_literal::hex!("08 00 70 93 04 d2 82 9a");
        let expected_send_to_addr = SocketAddr::new(IpAddr::V4(dest_addr), 0);

        let mut mocket = MockSocket::new();
        mocket
            .expect_set_ttl()
            .with(predicate::eq(10))
            .times(1)
            .returning(|_| Ok(()));
        mocket
            .expect_send_to()
            .with(
                predicate::eq(expected_send_to_buf),
                predicate::eq(expected_send_to_addr),
            )
            .times(1)
            .returning(|_, _| Ok(()));

        let ipv4 = Ipv4 {
            dest_addr,
            packet_size,
            payload_pattern,
        };
        ipv4.dispatch_icmp_probe(&mut mocket, probe)?;
        Ok(())
    }

    #[test]
    fn test_dispatch_icmp_probe_with_payload() -> anyhow::Result<()> {
        let probe = make_probe();
        let dest_addr = Ipv4Addr::from_str("5.6.7.8")?;
        let packet_size = PacketSize(48);
        let payload_pattern = PayloadPattern(0xff);
        let expected_send_to_buf = hex_literal::hex!(
            "
            08 00 70 93 04 d2 82 9a ff ff ff ff ff ff ff ff
            ff ff ff ff ff ff ff ff ff ff ff ff
            "
        );
        let expected_send_to_addr = SocketAddr::new(IpAddr::V4(dest_addr), 0);

        let mut mocket = MockSocket::new();
        mocket
            .expect_set_ttl()
            .with(predicate::eq(10))
            .times(1)
            .returning(|_| Ok(()));
        mocket
            .expect_send_to()
            .with(
                predicate::eq(expected_send_to_buf),
                predicate::eq(expected_send_to_addr),
            )
            .times(1)
            .returning(|_, _| Ok(()));

        let ipv4 = Ipv4 {
            dest_addr,
            packet_size,
            payload_pattern,
        };
        ipv4.dispatch_icmp_probe(&mut mocket, probe)?;
        Ok(())
    }

    #[test_case(27; "below minimum")]
    #[test_case(1025; "above maximum")]
    fn test_dispatch_icmp_probe_invalid_packet_size(packet_size: u16) {
        let probe = make_probe();
        let mut mocket = MockSocket::new();
        let ipv4 = Ipv4 {
            packet_size: PacketSize(packet_size),
            ..Default::default()
        };
        let err = ipv4.dispatch_icmp_probe(&mut mocket, probe).unwrap_err();
        assert!(matches!(err, Error::InvalidPacketSize(size) if size == usize::from(packet_size)));
    }

    #[test]
    fn test_recv_icmp_probe_echo_reply() -> anyhow::Result<()> {
        let expected_read_buf = hex_literal::hex!(
            "
            45 20 00 54 00 00 00 00 3b 01 50 02 8e fb de ce
            c0 a8 01 15 00 00 09 0f 75 d7 81 19 00 00 00 00
            00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
            00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
            00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
            00 00 00 00
           "
        );
        let mut mocket = MockSocket::new();
        mocket
            .expect_read()
            .times(1)
            .returning(mocket_read!(expected_read_buf));
        let ipv4 = Ipv4::default();
        let resp = ipv4.recv_icmp_probe(&mut mocket)?.unwrap();

        let Response::EchoReply(
            ResponseData {
                addr,
                identifier,
                sequence,
                ..
            },
            icmp_code,
        ) = resp
        else {
            panic!("expected EchoReply")
        };
        assert_eq!(IpAddr::V4(Ipv4Addr::from_str("142.251.222.206")?), addr);
        assert_eq!(30167, identifier);
        assert_eq!(33049, sequence);
        assert_eq!(IcmpPacketCode(0), icmp_code);
        Ok(())
    }

    #[test]
    fn test_recv_icmp_probe_echo_reply_invalid_checksum_ignored() -> anyhow::Result<()> {
        let expected_read_buf = hex_literal::hex!(
            "
            45 20 00 54 00 00 00 00 3b 01 50 02 8e fb de ce
            c0 a8 01 15 00 00 ff ff 75 d7 81 19 00 00 00 00
            00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
            00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
            00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
            00 00 00 00
           "
        );
        let mut mocket = MockSocket::new();
        mocket
            .expect_read()
            .times(1)
            .returning(mocket_read!(expected_read_buf));
        let ipv4 = Ipv4::default();
        let resp = ipv4.recv_icmp_probe(&mut mocket)?;
        assert!(resp.is_none());
        Ok(())
    }

    #[test]
    fn test_recv_icmp_probe_time_exceeded() -> anyhow::Result<()> {
        let expected_read_buf = hex_literal::hex!(
            "
             45 20 00 70 07 d7 00 00 3b 01 e9 5d 8e fa 3d 81
             c0 a8 01 15 0b 00 f4 ff 00 00 00 00 45 60 00 54
             65 b0 40 00 01 01 e4 11 c0 a8 01 15 8e fb de ce
             08 00 01 11 75 d7 81 17 00 00 00 00 00 00 00 00
             00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
             00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
             00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
           "
        );
        let mut mocket = MockSocket::new();
        mocket
            .expect_read()
            .times(1)
            .returning(mocket_read!(expected_read_buf));
        let ipv4 = Ipv4::default();
        let resp = ipv4.recv_icmp_probe(&mut mocket)?.unwrap();

        let Response::TimeExceeded(
            ResponseData {
                addr,
                identifier,
                sequence,
                ..
            },
            icmp_code,
        ) = resp
        else {
            panic!("expected TimeExceeded")
        };
        assert_eq!(IpAddr::V4(Ipv4Addr::from_str("142.250.61.129")?), addr);
        assert_eq!(30167, identifier);
        assert_eq!(33047, sequence);
        assert_eq!(IcmpPacketCode(0), icmp_code);
        Ok(())
    }

    #[test]
    fn test_recv_icmp_probe_destination_unreachable() -> anyhow::Result<()> {
        let expected_read_buf = hex_literal::hex!(
            "
            45 20 00 38 00 00 40 00 70 01 33 ea 14 00 00 fe
            c0 a8 01 15 03 01 fc fe 00 00 00 00 45 00 00 54
            00 00 40 00 80 01 23 ee c0 a8 01 15 14 00 00 fe
            08 00 fb d9 7b 01 81 24
           "
        );
        let mut mocket = MockSocket::new();
        mocket
            .expect_read()
            .times(1)
            .returning(mocket_read!(expected_read_buf));
        let ipv4 = Ipv4::default();
        let resp = ipv4.recv_icmp_probe(&mut mocket)?.unwrap();

        let Response::DestinationUnreachable(
            ResponseData {
                addr,
                identifier,
                sequence,
                ..
            },
            icmp_code,
        ) = resp
        else {
            panic!("expected DestinationUnreachable")
        };
        assert_eq!(IpAddr::V4(Ipv4Addr::from_str("20.0.0.254")?), addr);
        assert_eq!(31489, identifier);
        assert_eq!(33060, sequence);
        assert_eq!(IcmpPacketCode(1), icmp_code);
        Ok(())
    }

    // A `TimeExceeded` response with an embedded UDP original datagram is not
    // one of ours and must be ignored.
    #[test]
    fn test_recv_icmp_probe_wrong_original_datagram_protocol_ignored() -> anyhow::Result<()> {
        let expected_read_buf = hex_literal::hex!(
            "
             45 20 00 70 07 d7 00 00 3b 01 e9 5d 8e fa 3d 81
             c0 a8 01 15 0b 00 f4 ff 00 00 00 00 45 60 00 54
             65 b0 40 00 01 11 e4 11 c0 a8 01 15 8e fb de ce
             08 00 01 11 75 d7 81 17 00 00 00 00 00 00 00 00
             00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
             00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
             00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
           "
        );
        let mut mocket = MockSocket::new();
        mocket
            .expect_read()
            .times(1)
            .returning(mocket_read!(expected_read_buf));
        let ipv4 = Ipv4::default();
        let resp = ipv4.recv_icmp_probe(&mut mocket)?;
        assert!(resp.is_none());
        Ok(())
    }

    // A truncated packet is discarded rather than treated as a fatal error.
    #[test]
    fn test_recv_icmp_probe_truncated_ignored() -> anyhow::Result<()> {
        let expected_read_buf = hex_literal::hex!("45 20 00 54 00 00 00 00 3b 01");
        let mut mocket = MockSocket::new();
        mocket
            .expect_read()
            .times(1)
            .returning(mocket_read!(expected_read_buf));
        let ipv4 = Ipv4::default();
        let resp = ipv4.recv_icmp_probe(&mut mocket)?;
        assert!(resp.is_none());
        Ok(())
    }

    #[test]
    fn test_recv_icmp_probe_would_block() -> anyhow::Result<()> {
        let mut mocket = MockSocket::new();
        mocket.expect_read().times(1).returning(|_| {
            Err(crate::error::IoError::Other(
                io::Error::from(io::ErrorKind::WouldBlock),
                crate::error::IoOperation::Read,
            ))
        });
        let ipv4 = Ipv4::default();
        let resp = ipv4.recv_icmp_probe(&mut mocket)?;
        assert!(resp.is_none());
        Ok(())
    }

    fn make_probe() -> ProbeRequest {
        ProbeRequest::new(
            Sequence(33434),
            SessionId(1234),
            TimeToLive(10),
            SystemTime::now(),
        )
    }
}
