//! Packet wire format parsing and building for ICMP diagnostics.
//!
//! The following packets are supported:
//! - `ICMPv4` (Echo Request, Echo Reply, Time Exceeded, Destination Unreachable)
//! - `ICMPv6` (Echo Request, Echo Reply, Time Exceeded, Destination Unreachable)
//! - `IPv4` and `IPv6` headers, as needed to parse raw inbound frames and the
//!   original datagram embedded in error responses
//!
//! # Endianness
//!
//! The internal representation is held in network byte order (big-endian) and
//! all accessor methods take and return data in host byte order, converting as
//! necessary for the given architecture.
//!
//! # Example
//!
//! The following example builds an `ICMPv4` echo request packet:
//!
//! ```rust
//! # fn main() -> anyhow::Result<()> {
//! use nettrail_packet::checksum::icmp_ipv4_checksum;
//! use nettrail_packet::icmpv4::echo_request::EchoRequestPacket;
//! use nettrail_packet::icmpv4::{IcmpCode, IcmpPacket, IcmpType};
//!
//! let mut buf = [0; IcmpPacket::minimum_packet_size()];
//! let mut icmp = EchoRequestPacket::new(&mut buf)?;
//! icmp.set_icmp_type(IcmpType::EchoRequest);
//! icmp.set_icmp_code(IcmpCode(0));
//! icmp.set_identifier(1234);
//! icmp.set_sequence(10);
//! icmp.set_checksum(icmp_ipv4_checksum(icmp.packet()));
//! assert_eq!(icmp.packet(), &hex_literal::hex!("08 00 f3 23 04 d2 00 0a"));
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]

mod buffer;

/// Packet errors.
pub mod error;

/// Functions for calculating network checksums.
pub mod checksum;

/// `ICMPv4` packets.
pub mod icmpv4;

/// `ICMPv6` packets.
pub mod icmpv6;

/// `IPv4` packets.
pub mod ipv4;

/// `IPv6` packets.
pub mod ipv6;

/// The IP packet next layer protocol.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum IpProtocol {
    Icmp,
    IcmpV6,
    Other(u8),
}

impl IpProtocol {
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::Icmp => 1,
            Self::IcmpV6 => 58,
            Self::Other(id) => id,
        }
    }
}

impl From<u8> for IpProtocol {
    fn from(id: u8) -> Self {
        match id {
            1 => Self::Icmp,
            58 => Self::IcmpV6,
            p => Self::Other(p),
        }
    }
}

/// Format a payload as a hexadecimal string.
#[must_use]
pub fn fmt_payload(bytes: &[u8]) -> String {
    use itertools::Itertools as _;
    format!("{:02x}", bytes.iter().format(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(1, IpProtocol::Icmp; "icmp")]
    #[test_case(58, IpProtocol::IcmpV6; "icmpv6")]
    #[test_case(17, IpProtocol::Other(17); "udp")]
    #[test_case(255, IpProtocol::Other(255); "reserved")]
    fn test_ip_protocol(id: u8, expected: IpProtocol) {
        assert_eq!(expected, IpProtocol::from(id));
        assert_eq!(id, expected.id());
    }

    #[test]
    fn test_fmt_payload() {
        assert_eq!("00 ff 10", fmt_payload(&[0x00, 0xff, 0x10]));
        assert_eq!("", fmt_payload(&[]));
    }
}
