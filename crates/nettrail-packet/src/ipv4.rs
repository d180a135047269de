use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::{fmt_payload, IpProtocol};
use std::fmt::{Debug, Formatter};
use std::net::Ipv4Addr;

const VERSION_OFFSET: usize = 0;
const IHL_OFFSET: usize = 0;
const TOTAL_LENGTH_OFFSET: usize = 2;
const TIME_TO_LIVE_OFFSET: usize = 8;
const PROTOCOL_OFFSET: usize = 9;
const CHECKSUM_OFFSET: usize = 10;
const SOURCE_OFFSET: usize = 12;
const DESTINATION_OFFSET: usize = 16;

/// Represents an IPv4 Packet.
///
/// Raw `ICMPv4` sockets deliver inbound frames with the IPv4 header attached
/// and so this view is used both to locate the ICMP payload of a received
/// frame and to re-parse the original datagram embedded in error responses.
///
/// The internal representation is held in network byte order (big-endian) and all accessor methods
/// take and return data in host byte order, converting as necessary for the given architecture.
pub struct Ipv4Packet<'a> {
    buf: Buffer<'a>,
}

impl<'a> Ipv4Packet<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        if packet.len() >= Self::minimum_packet_size() {
            Ok(Self {
                buf: Buffer::Mutable(packet),
            })
        } else {
            Err(Error::Truncated(
                String::from("Ipv4Packet"),
                Self::minimum_packet_size(),
                packet.len(),
            ))
        }
    }

    pub fn new_view(packet: &'a [u8]) -> Result<Self> {
        if packet.len() >= Self::minimum_packet_size() {
            Ok(Self {
                buf: Buffer::Immutable(packet),
            })
        } else {
            Err(Error::Truncated(
                String::from("Ipv4Packet"),
                Self::minimum_packet_size(),
                packet.len(),
            ))
        }
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        20
    }

    #[must_use]
    pub fn get_version(&self) -> u8 {
        (self.buf.u8_at(VERSION_OFFSET) & 0xf0) >> 4
    }

    /// The header length in 32 bit words.
    #[must_use]
    pub fn get_header_length(&self) -> u8 {
        self.buf.u8_at(IHL_OFFSET) & 0xf
    }

    #[must_use]
    pub fn get_total_length(&self) -> u16 {
        self.buf.u16_at(TOTAL_LENGTH_OFFSET)
    }

    #[must_use]
    pub fn get_ttl(&self) -> u8 {
        self.buf.u8_at(TIME_TO_LIVE_OFFSET)
    }

    #[must_use]
    pub fn get_protocol(&self) -> IpProtocol {
        IpProtocol::from(self.buf.u8_at(PROTOCOL_OFFSET))
    }

    #[must_use]
    pub fn get_checksum(&self) -> u16 {
        self.buf.u16_at(CHECKSUM_OFFSET)
    }

    #[must_use]
    pub fn get_source(&self) -> Ipv4Addr {
        let bytes = &self.buf.as_slice()[SOURCE_OFFSET..SOURCE_OFFSET + 4];
        Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3])
    }

    #[must_use]
    pub fn get_destination(&self) -> Ipv4Addr {
        let bytes = &self.buf.as_slice()[DESTINATION_OFFSET..DESTINATION_OFFSET + 4];
        Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3])
    }

    pub fn set_version(&mut self, val: u8) {
        let old = self.buf.u8_at(VERSION_OFFSET);
        self.buf.set_u8(VERSION_OFFSET, (old & 0xf) | ((val & 0xf) << 4));
    }

    pub fn set_header_length(&mut self, val: u8) {
        let old = self.buf.u8_at(IHL_OFFSET);
        self.buf.set_u8(IHL_OFFSET, (old & 0xf0) | (val & 0xf));
    }

    pub fn set_total_length(&mut self, val: u16) {
        self.buf.set_u16(TOTAL_LENGTH_OFFSET, val);
    }

    pub fn set_ttl(&mut self, val: u8) {
        self.buf.set_u8(TIME_TO_LIVE_OFFSET, val);
    }

    pub fn set_protocol(&mut self, val: IpProtocol) {
        self.buf.set_u8(PROTOCOL_OFFSET, val.id());
    }

    pub fn set_checksum(&mut self, val: u16) {
        self.buf.set_u16(CHECKSUM_OFFSET, val);
    }

    pub fn set_source(&mut self, val: Ipv4Addr) {
        self.buf.as_slice_mut()[SOURCE_OFFSET..SOURCE_OFFSET + 4].copy_from_slice(&val.octets());
    }

    pub fn set_destination(&mut self, val: Ipv4Addr) {
        self.buf.as_slice_mut()[DESTINATION_OFFSET..DESTINATION_OFFSET + 4]
            .copy_from_slice(&val.octets());
    }

    pub fn set_payload(&mut self, vals: &[u8]) {
        let current_offset = usize::from(self.get_header_length()) * 4;
        self.buf.as_slice_mut()[current_offset..current_offset + vals.len()].copy_from_slice(vals);
    }

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }

    /// The bytes which follow the header, options included in the offset.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        let start = std::cmp::max(
            usize::from(self.get_header_length()) * 4,
            Self::minimum_packet_size(),
        );
        if self.buf.as_slice().len() <= start {
            return &[];
        }
        &self.buf.as_slice()[start..]
    }
}

impl Debug for Ipv4Packet<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ipv4Packet")
            .field("version", &self.get_version())
            .field("header_length", &self.get_header_length())
            .field("total_length", &self.get_total_length())
            .field("ttl", &self.get_ttl())
            .field("protocol", &self.get_protocol())
            .field("checksum", &self.get_checksum())
            .field("source", &self.get_source())
            .field("destination", &self.get_destination())
            .field("payload", &fmt_payload(self.payload()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_version() {
        let mut buf = [0_u8; Ipv4Packet::minimum_packet_size()];
        let mut packet = Ipv4Packet::new(&mut buf).unwrap();
        packet.set_version(4);
        assert_eq!(4, packet.get_version());
        assert_eq!([0x40], packet.packet()[..1]);
        packet.set_version(15);
        assert_eq!(15, packet.get_version());
        assert_eq!([0xF0], packet.packet()[..1]);
    }

    #[test]
    fn test_header_length() {
        let mut buf = [0_u8; Ipv4Packet::minimum_packet_size()];
        let mut packet = Ipv4Packet::new(&mut buf).unwrap();
        packet.set_version(4);
        packet.set_header_length(5);
        assert_eq!(4, packet.get_version());
        assert_eq!(5, packet.get_header_length());
        assert_eq!([0x45], packet.packet()[..1]);
    }

    #[test]
    fn test_ttl() {
        let mut buf = [0_u8; Ipv4Packet::minimum_packet_size()];
        let mut packet = Ipv4Packet::new(&mut buf).unwrap();
        packet.set_ttl(0);
        assert_eq!(0, packet.get_ttl());
        assert_eq!([0x00], packet.packet()[8..9]);
        packet.set_ttl(64);
        assert_eq!(64, packet.get_ttl());
        assert_eq!([0x40], packet.packet()[8..9]);
        packet.set_ttl(255);
        assert_eq!(255, packet.get_ttl());
        assert_eq!([0xFF], packet.packet()[8..9]);
    }

    #[test]
    fn test_protocol() {
        let mut buf = [0_u8; Ipv4Packet::minimum_packet_size()];
        let mut packet = Ipv4Packet::new(&mut buf).unwrap();
        packet.set_protocol(IpProtocol::Icmp);
        assert_eq!(IpProtocol::Icmp, packet.get_protocol());
        assert_eq!([0x01], packet.packet()[9..10]);
        packet.set_protocol(IpProtocol::Other(123));
        assert_eq!(IpProtocol::Other(123), packet.get_protocol());
        assert_eq!([0x7B], packet.packet()[9..10]);
    }

    #[test]
    fn test_source() {
        let mut buf = [0_u8; Ipv4Packet::minimum_packet_size()];
        let mut packet = Ipv4Packet::new(&mut buf).unwrap();
        packet.set_source(Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(Ipv4Addr::new(192, 168, 1, 1), packet.get_source());
        assert_eq!([0xC0, 0xA8, 0x01, 0x01], packet.packet()[12..=15]);
    }

    #[test]
    fn test_destination() {
        let mut buf = [0_u8; Ipv4Packet::minimum_packet_size()];
        let mut packet = Ipv4Packet::new(&mut buf).unwrap();
        packet.set_destination(Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(Ipv4Addr::new(10, 0, 0, 1), packet.get_destination());
        assert_eq!([0x0A, 0x00, 0x00, 0x01], packet.packet()[16..=19]);
    }

    #[test]
    fn test_view() {
        let buf = hex!("45 00 0f fc 38 c0 00 00 40 01 2e 3b 0a 00 00 02 0a 00 00 01");
        let packet = Ipv4Packet::new_view(&buf).unwrap();
        assert_eq!(4, packet.get_version());
        assert_eq!(5, packet.get_header_length());
        assert_eq!(4092, packet.get_total_length());
        assert_eq!(64, packet.get_ttl());
        assert_eq!(IpProtocol::Icmp, packet.get_protocol());
        assert_eq!(0x2e3b, packet.get_checksum());
        assert_eq!(Ipv4Addr::new(10, 0, 0, 2), packet.get_source());
        assert_eq!(Ipv4Addr::new(10, 0, 0, 1), packet.get_destination());
        assert!(packet.payload().is_empty());
    }

    #[test]
    fn test_payload_skips_options() {
        let mut buf = [0_u8; 28];
        buf[..2].copy_from_slice(&hex!("46 00"));
        buf[24..].copy_from_slice(&hex!("08 00 aa bb"));
        let packet = Ipv4Packet::new_view(&buf).unwrap();
        assert_eq!(6, packet.get_header_length());
        assert_eq!(&hex!("08 00 aa bb"), packet.payload());
    }

    #[test]
    fn test_new_view_insufficient_buffer() {
        const SIZE: usize = Ipv4Packet::minimum_packet_size();
        let buf = [0_u8; SIZE - 1];
        let err = Ipv4Packet::new_view(&buf).unwrap_err();
        assert_eq!(
            Error::Truncated(String::from("Ipv4Packet"), SIZE, SIZE - 1),
            err
        );
    }
}
