use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::{fmt_payload, IpProtocol};
use std::fmt::{Debug, Formatter};
use std::net::Ipv6Addr;

const VERSION_OFFSET: usize = 0;
const PAYLOAD_LENGTH_OFFSET: usize = 4;
const NEXT_HEADER_OFFSET: usize = 6;
const HOP_LIMIT_OFFSET: usize = 7;
const SOURCE_ADDRESS_OFFSET: usize = 8;
const DESTINATION_ADDRESS_OFFSET: usize = 24;

/// Represents an IPv6 Packet.
///
/// Raw `ICMPv6` sockets deliver frames without the IPv6 header, so this view
/// is only needed to re-parse the original datagram embedded in `ICMPv6`
/// error responses.
///
/// The internal representation is held in network byte order (big-endian) and all accessor methods
/// take and return data in host byte order, converting as necessary for the given architecture.
pub struct Ipv6Packet<'a> {
    buf: Buffer<'a>,
}

impl<'a> Ipv6Packet<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        if packet.len() >= Self::minimum_packet_size() {
            Ok(Self {
                buf: Buffer::Mutable(packet),
            })
        } else {
            Err(Error::Truncated(
                String::from("Ipv6Packet"),
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
                String::from("Ipv6Packet"),
                Self::minimum_packet_size(),
                packet.len(),
            ))
        }
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        40
    }

    #[must_use]
    pub fn get_version(&self) -> u8 {
        (self.buf.u8_at(VERSION_OFFSET) & 0xf0) >> 4
    }

    #[must_use]
    pub fn get_payload_length(&self) -> u16 {
        self.buf.u16_at(PAYLOAD_LENGTH_OFFSET)
    }

    #[must_use]
    pub fn get_next_header(&self) -> IpProtocol {
        IpProtocol::from(self.buf.u8_at(NEXT_HEADER_OFFSET))
    }

    #[must_use]
    pub fn get_hop_limit(&self) -> u8 {
        self.buf.u8_at(HOP_LIMIT_OFFSET)
    }

    #[must_use]
    pub fn get_source_address(&self) -> Ipv6Addr {
        let mut bytes = [0_u8; 16];
        bytes.copy_from_slice(&self.buf.as_slice()[SOURCE_ADDRESS_OFFSET..SOURCE_ADDRESS_OFFSET + 16]);
        Ipv6Addr::from(bytes)
    }

    #[must_use]
    pub fn get_destination_address(&self) -> Ipv6Addr {
        let mut bytes = [0_u8; 16];
        bytes.copy_from_slice(
            &self.buf.as_slice()[DESTINATION_ADDRESS_OFFSET..DESTINATION_ADDRESS_OFFSET + 16],
        );
        Ipv6Addr::from(bytes)
    }

    pub fn set_version(&mut self, val: u8) {
        let old = self.buf.u8_at(VERSION_OFFSET);
        self.buf.set_u8(VERSION_OFFSET, (old & 0xf) | ((val & 0xf) << 4));
    }

    pub fn set_payload_length(&mut self, val: u16) {
        self.buf.set_u16(PAYLOAD_LENGTH_OFFSET, val);
    }

    pub fn set_next_header(&mut self, val: IpProtocol) {
        self.buf.set_u8(NEXT_HEADER_OFFSET, val.id());
    }

    pub fn set_hop_limit(&mut self, val: u8) {
        self.buf.set_u8(HOP_LIMIT_OFFSET, val);
    }

    pub fn set_source_address(&mut self, val: Ipv6Addr) {
        self.buf.as_slice_mut()[SOURCE_ADDRESS_OFFSET..SOURCE_ADDRESS_OFFSET + 16]
            .copy_from_slice(&val.octets());
    }

    pub fn set_destination_address(&mut self, val: Ipv6Addr) {
        self.buf.as_slice_mut()[DESTINATION_ADDRESS_OFFSET..DESTINATION_ADDRESS_OFFSET + 16]
            .copy_from_slice(&val.octets());
    }

    pub fn set_payload(&mut self, vals: &[u8]) {
        let current_offset = Self::minimum_packet_size();
        self.buf.as_slice_mut()[current_offset..current_offset + vals.len()].copy_from_slice(vals);
    }

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        let start = Self::minimum_packet_size();
        let end = std::cmp::min(
            start + usize::from(self.get_payload_length()),
            self.buf.as_slice().len(),
        );
        if self.buf.as_slice().len() <= start {
            return &[];
        }
        &self.buf.as_slice()[start..end]
    }
}

impl Debug for Ipv6Packet<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ipv6Packet")
            .field("version", &self.get_version())
            .field("payload_length", &self.get_payload_length())
            .field("next_header", &self.get_next_header())
            .field("hop_limit", &self.get_hop_limit())
            .field("source_address", &self.get_source_address())
            .field("destination_address", &self.get_destination_address())
            .field("payload", &fmt_payload(self.payload()))
            .finish()
    }
}
