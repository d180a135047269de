use crate::buffer::Buffer;
use crate::error::{Error, Result};
use std::fmt::{Debug, Formatter};

/// The type of `ICMPv6` packet.
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub enum IcmpType {
    EchoRequest,
    EchoReply,
    DestinationUnreachable,
    TimeExceeded,
    Other(u8),
}

impl IcmpType {
    #[must_use]
    pub const fn id(&self) -> u8 {
        match self {
            Self::EchoRequest => 128,
            Self::EchoReply => 129,
            Self::DestinationUnreachable => 1,
            Self::TimeExceeded => 3,
            Self::Other(id) => *id,
        }
    }
}

impl From<u8> for IcmpType {
    fn from(val: u8) -> Self {
        match val {
            128 => Self::EchoRequest,
            129 => Self::EchoReply,
            1 => Self::DestinationUnreachable,
            3 => Self::TimeExceeded,
            id => Self::Other(id),
        }
    }
}

/// The `ICMPv6` code.
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub struct IcmpCode(pub u8);

impl From<u8> for IcmpCode {
    fn from(val: u8) -> Self {
        Self(val)
    }
}

/// The code for `TimeExceeded` `ICMPv6` packet type.
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub enum IcmpTimeExceededCode {
    /// Hop limit exceeded in transit.
    TtlExpired,
    /// Fragment reassembly time exceeded.
    FragmentReassembly,
    /// An unknown code.
    Unknown(u8),
}

impl From<IcmpCode> for IcmpTimeExceededCode {
    fn from(val: IcmpCode) -> Self {
        match val {
            IcmpCode(0) => Self::TtlExpired,
            IcmpCode(1) => Self::FragmentReassembly,
            IcmpCode(id) => Self::Unknown(id),
        }
    }
}

const TYPE_OFFSET: usize = 0;
const CODE_OFFSET: usize = 1;
const CHECKSUM_OFFSET: usize = 2;

/// Represents an ICMP packet.
///
/// The internal representation is held in network byte order (big-endian) and all accessor methods
/// take and return data in host byte order, converting as necessary for the given architecture.
pub struct IcmpPacket<'a> {
    buf: Buffer<'a>,
}

impl<'a> IcmpPacket<'a> {
    pub fn new(packet: &'a mut [u8]) -> Result<Self> {
        if packet.len() >= Self::minimum_packet_size() {
            Ok(Self {
                buf: Buffer::Mutable(packet),
            })
        } else {
            Err(Error::Truncated(
                String::from("IcmpPacket"),
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
                String::from("IcmpPacket"),
                Self::minimum_packet_size(),
                packet.len(),
            ))
        }
    }

    #[must_use]
    pub const fn minimum_packet_size() -> usize {
        8
    }

    #[must_use]
    pub fn get_icmp_type(&self) -> IcmpType {
        IcmpType::from(self.buf.u8_at(TYPE_OFFSET))
    }

    #[must_use]
    pub fn get_icmp_code(&self) -> IcmpCode {
        IcmpCode::from(self.buf.u8_at(CODE_OFFSET))
    }

    #[must_use]
    pub fn get_checksum(&self) -> u16 {
        self.buf.u16_at(CHECKSUM_OFFSET)
    }

    pub fn set_icmp_type(&mut self, val: IcmpType) {
        self.buf.set_u8(TYPE_OFFSET, val.id());
    }

    pub fn set_icmp_code(&mut self, val: IcmpCode) {
        self.buf.set_u8(CODE_OFFSET, val.0);
    }

    pub fn set_checksum(&mut self, val: u16) {
        self.buf.set_u16(CHECKSUM_OFFSET, val);
    }

    #[must_use]
    pub fn packet(&self) -> &[u8] {
        self.buf.as_slice()
    }
}

impl Debug for IcmpPacket<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IcmpPacket")
            .field("icmp_type", &self.get_icmp_type())
            .field("icmp_code", &self.get_icmp_code())
            .field("checksum", &self.get_checksum())
            .finish()
    }
}


pub mod echo_request {
    use crate::buffer::Buffer;
    use crate::error::{Error, Result};
    use crate::fmt_payload;
    use crate::icmpv6::{IcmpCode, IcmpType};
    use std::fmt::{Debug, Formatter};

    const TYPE_OFFSET: usize = 0;
    const CODE_OFFSET: usize = 1;
    const CHECKSUM_OFFSET: usize = 2;
    const IDENTIFIER_OFFSET: usize = 4;
    const SEQUENCE_OFFSET: usize = 6;

    /// Represents an `ICMPv6` `EchoRequest` packet.
    ///
    /// The internal representation is held in network byte order (big-endian) and all accessor
    /// methods take and return data in host byte order, converting as necessary for the given
    /// architecture.
    pub struct EchoRequestPacket<'a> {
        buf: Buffer<'a>,
    }

    impl<'a> EchoRequestPacket<'a> {
        pub fn new(packet: &'a mut [u8]) -> Result<Self> {
            if packet.len() >= Self::minimum_packet_size() {
                Ok(Self {
                    buf: Buffer::Mutable(packet),
                })
            } else {
                Err(Error::Truncated(
                    String::from("EchoRequestPacket"),
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
                    String::from("EchoRequestPacket"),
                    Self::minimum_packet_size(),
                    packet.len(),
                ))
            }
        }

        #[must_use]
        pub const fn minimum_packet_size() -> usize {
            8
        }

        #[must_use]
        pub fn get_icmp_type(&self) -> IcmpType {
            IcmpType::from(self.buf.u8_at(TYPE_OFFSET))
        }

        #[must_use]
        pub fn get_icmp_code(&self) -> IcmpCode {
            IcmpCode::from(self.buf.u8_at(CODE_OFFSET))
        }

        #[must_use]
        pub fn get_checksum(&self) -> u16 {
            self.buf.u16_at(CHECKSUM_OFFSET)
        }

        #[must_use]
        pub fn get_identifier(&self) -> u16 {
            self.buf.u16_at(IDENTIFIER_OFFSET)
        }

        #[must_use]
        pub fn get_sequence(&self) -> u16 {
            self.buf.u16_at(SEQUENCE_OFFSET)
        }

        pub fn set_icmp_type(&mut self, val: IcmpType) {
            self.buf.set_u8(TYPE_OFFSET, val.id());
        }

        pub fn set_icmp_code(&mut self, val: IcmpCode) {
            self.buf.set_u8(CODE_OFFSET, val.0);
        }

        pub fn set_checksum(&mut self, val: u16) {
            self.buf.set_u16(CHECKSUM_OFFSET, val);
        }

        pub fn set_identifier(&mut self, val: u16) {
            self.buf.set_u16(IDENTIFIER_OFFSET, val);
        }

        pub fn set_sequence(&mut self, val: u16) {
            self.buf.set_u16(SEQUENCE_OFFSET, val);
        }

        pub fn set_payload(&mut self, vals: &[u8]) {
            let current_offset = Self::minimum_packet_size();
            self.buf.as_slice_mut()[current_offset..current_offset + vals.len()]
                .copy_from_slice(vals);
        }

        #[must_use]
        pub fn packet(&self) -> &[u8] {
            self.buf.as_slice()
        }

        #[must_use]
        pub fn payload(&self) -> &[u8] {
            &self.buf.as_slice()[Self::minimum_packet_size()..]
        }
    }

    impl Debug for EchoRequestPacket<'_> {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("EchoRequestPacket")
                .field("icmp_type", &self.get_icmp_type())
                .field("icmp_code", &self.get_icmp_code())
                .field("checksum", &self.get_checksum())
                .field("identifier", &self.get_identifier())
                .field("sequence", &self.get_sequence())
                .field("payload", &fmt_payload(self.payload()))
                .finish()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::checksum::icmp_ipv6_checksum;
        use hex_literal::hex;
        use std::net::Ipv6Addr;

        #[test]
        fn test_identifier() {
            let mut buf = [0_u8; EchoRequestPacket::minimum_packet_size()];
            let mut packet = EchoRequestPacket::new(&mut buf).unwrap();
            packet.set_identifier(0);
            assert_eq!(0, packet.get_identifier());
            assert_eq!([0x00, 0x00], packet.packet()[4..=5]);
            packet.set_identifier(1999);
            assert_eq!(1999, packet.get_identifier());
            assert_eq!([0x07, 0xCF], packet.packet()[4..=5]);
            packet.set_identifier(u16::MAX);
            assert_eq!(u16::MAX, packet.get_identifier());
            assert_eq!([0xFF, 0xFF], packet.packet()[4..=5]);
        }

        #[test]
        fn test_sequence() {
            let mut buf = [0_u8; EchoRequestPacket::minimum_packet_size()];
            let mut packet = EchoRequestPacket::new(&mut buf).unwrap();
            packet.set_sequence(0);
            assert_eq!(0, packet.get_sequence());
            assert_eq!([0x00, 0x00], packet.packet()[6..=7]);
            packet.set_sequence(1999);
            assert_eq!(1999, packet.get_sequence());
            assert_eq!([0x07, 0xCF], packet.packet()[6..=7]);
            packet.set_sequence(u16::MAX);
            assert_eq!(u16::MAX, packet.get_sequence());
            assert_eq!([0xFF, 0xFF], packet.packet()[6..=7]);
        }

        #[test]
        fn test_build() {
            let localhost = Ipv6Addr::LOCALHOST;
            let mut buf = [0_u8; EchoRequestPacket::minimum_packet_size()];
            let mut packet = EchoRequestPacket::new(&mut buf).unwrap();
            packet.set_icmp_type(IcmpType::EchoRequest);
            packet.set_icmp_code(IcmpCode(0));
            packet.set_identifier(1);
            packet.set_sequence(1);
            packet.set_checksum(icmp_ipv6_checksum(packet.packet(), localhost, localhost));
            assert_eq!(packet.packet(), &hex!("80 00 7f b9 00 01 00 01"));
        }

        #[test]
        fn test_view() {
            let buf = hex!("80 00 16 7c 60 9b 82 9a");
            let packet = EchoRequestPacket::new_view(&buf).unwrap();
            assert_eq!(IcmpType::EchoRequest, packet.get_icmp_type());
            assert_eq!(IcmpCode(0), packet.get_icmp_code());
            assert_eq!(5756, packet.get_checksum());
            assert_eq!(24731, packet.get_identifier());
            assert_eq!(33434, packet.get_sequence());
            assert!(packet.payload().is_empty());
        }

        #[test]
        fn test_new_view_insufficient_buffer() {
            const SIZE: usize = EchoRequestPacket::minimum_packet_size();
            let buf = [0_u8; SIZE - 1];
            let err = EchoRequestPacket::new_view(&buf).unwrap_err();
            assert_eq!(
                Error::Truncated(String::from("EchoRequestPacket"), SIZE, SIZE - 1),
                err
            );
        }
    }
}

pub mod echo_reply {
    use crate::buffer::Buffer;
    use crate::error::{Error, Result};
    use crate::fmt_payload;
    use crate::icmpv6::{IcmpCode, IcmpType};
    use std::fmt::{Debug, Formatter};

    const TYPE_OFFSET: usize = 0;
    const CODE_OFFSET: usize = 1;
    const CHECKSUM_OFFSET: usize = 2;
    const IDENTIFIER_OFFSET: usize = 4;
    const SEQUENCE_OFFSET: usize = 6;

    /// Represents an ICMP `EchoReply` packet.
    ///
    /// The internal representation is held in network byte order (big-endian) and all accessor
    /// methods take and return data in host byte order, converting as necessary for the given
    /// architecture.
    pub struct EchoReplyPacket<'a> {
        buf: Buffer<'a>,
    }

    impl<'a> EchoReplyPacket<'a> {
        pub fn new(packet: &'a mut [u8]) -> Result<Self> {
            if packet.len() >= Self::minimum_packet_size() {
                Ok(Self {
                    buf: Buffer::Mutable(packet),
                })
            } else {
                Err(Error::Truncated(
                    String::from("EchoReplyPacket"),
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
                    String::from("EchoReplyPacket"),
                    Self::minimum_packet_size(),
                    packet.len(),
                ))
            }
        }

        #[must_use]
        pub const fn minimum_packet_size() -> usize {
            8
        }

        #[must_use]
        pub fn get_icmp_type(&self) -> IcmpType {
            IcmpType::from(self.buf.u8_at(TYPE_OFFSET))
        }

        #[must_use]
        pub fn get_icmp_code(&self) -> IcmpCode {
            IcmpCode::from(self.buf.u8_at(CODE_OFFSET))
        }

        #[must_use]
        pub fn get_checksum(&self) -> u16 {
            self.buf.u16_at(CHECKSUM_OFFSET)
        }

        #[must_use]
        pub fn get_identifier(&self) -> u16 {
            self.buf.u16_at(IDENTIFIER_OFFSET)
        }

        #[must_use]
        pub fn get_sequence(&self) -> u16 {
            self.buf.u16_at(SEQUENCE_OFFSET)
        }

        pub fn set_icmp_type(&mut self, val: IcmpType) {
            self.buf.set_u8(TYPE_OFFSET, val.id());
        }

        pub fn set_icmp_code(&mut self, val: IcmpCode) {
            self.buf.set_u8(CODE_OFFSET, val.0);
        }

        pub fn set_checksum(&mut self, val: u16) {
            self.buf.set_u16(CHECKSUM_OFFSET, val);
        }

        pub fn set_identifier(&mut self, val: u16) {
            self.buf.set_u16(IDENTIFIER_OFFSET, val);
        }

        pub fn set_sequence(&mut self, val: u16) {
            self.buf.set_u16(SEQUENCE_OFFSET, val);
        }

        pub fn set_payload(&mut self, vals: &[u8]) {
            let current_offset = Self::minimum_packet_size();
            self.buf.as_slice_mut()[current_offset..current_offset + vals.len()]
                .copy_from_slice(vals);
        }

        #[must_use]
        pub fn packet(&self) -> &[u8] {
            self.buf.as_slice()
        }

        #[must_use]
        pub fn payload(&self) -> &[u8] {
            &self.buf.as_slice()[Self::minimum_packet_size()..]
        }
    }

    impl Debug for EchoReplyPacket<'_> {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("EchoReplyPacket")
                .field("icmp_type", &self.get_icmp_type())
                .field("icmp_code", &self.get_icmp_code())
                .field("checksum", &self.get_checksum())
                .field("identifier", &self.get_identifier())
                .field("sequence", &self.get_sequence())
                .field("payload", &fmt_payload(self.payload()))
                .finish()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use hex_literal::hex;

        #[test]
        fn test_identifier() {
            let mut buf = [0_u8; EchoReplyPacket::minimum_packet_size()];
            let mut packet = EchoReplyPacket::new(&mut buf).unwrap();
            packet.set_identifier(0);
            assert_eq!(0, packet.get_identifier());
            assert_eq!([0x00, 0x00], packet.packet()[4..=5]);
            packet.set_identifier(1999);
            assert_eq!(1999, packet.get_identifier());
            assert_eq!([0x07, 0xCF], packet.packet()[4..=5]);
            packet.set_identifier(u16::MAX);
            assert_eq!(u16::MAX, packet.get_identifier());
            assert_eq!([0xFF, 0xFF], packet.packet()[4..=5]);
        }

        #[test]
        fn test_sequence() {
            let mut buf = [0_u8; EchoReplyPacket::minimum_packet_size()];
            let mut packet = EchoReplyPacket::new(&mut buf).unwrap();
            packet.set_sequence(0);
            assert_eq!(0, packet.get_sequence());
            assert_eq!([0x00, 0x00], packet.packet()[6..=7]);
            packet.set_sequence(1999);
            assert_eq!(1999, packet.get_sequence());
            assert_eq!([0x07, 0xCF], packet.packet()[6..=7]);
            packet.set_sequence(u16::MAX);
            assert_eq!(u16::MAX, packet.get_sequence());
            assert_eq!([0xFF, 0xFF], packet.packet()[6..=7]);
        }

        #[test]
        fn test_view() {
            let buf = hex!("81 00 1e 70 60 9b 80 f4");
            let packet = EchoReplyPacket::new_view(&buf).unwrap();
            assert_eq!(IcmpType::EchoReply, packet.get_icmp_type());
            assert_eq!(IcmpCode(0), packet.get_icmp_code());
            assert_eq!(7792, packet.get_checksum());
            assert_eq!(24731, packet.get_identifier());
            assert_eq!(33012, packet.get_sequence());
            assert!(packet.payload().is_empty());
        }

        #[test]
        fn test_new_view_insufficient_buffer() {
            const SIZE: usize = EchoReplyPacket::minimum_packet_size();
            let buf = [0_u8; SIZE - 1];
            let err = EchoReplyPacket::new_view(&buf).unwrap_err();
            assert_eq!(
                Error::Truncated(String::from("EchoReplyPacket"), SIZE, SIZE - 1),
                err
            );
        }
    }
}

pub mod time_exceeded {
    use crate::buffer::Buffer;
    use crate::error::{Error, Result};
    use crate::fmt_payload;
    use crate::icmpv6::{IcmpCode, IcmpType};
    use std::fmt::{Debug, Formatter};

    const TYPE_OFFSET: usize = 0;
    const CODE_OFFSET: usize = 1;
    const CHECKSUM_OFFSET: usize = 2;

    /// Represents an ICMP `TimeExceeded` packet.
    ///
    /// The payload is the original datagram whose hop limit expired in
    /// transit, which is re-parsed to recover the identifier and sequence of
    /// the probe.
    pub struct TimeExceededPacket<'a> {
        buf: Buffer<'a>,
    }

    impl<'a> TimeExceededPacket<'a> {
        pub fn new(packet: &'a mut [u8]) -> Result<Self> {
            if packet.len() >= Self::minimum_packet_size() {
                Ok(Self {
                    buf: Buffer::Mutable(packet),
                })
            } else {
                Err(Error::Truncated(
                    String::from("TimeExceededPacket"),
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
                    String::from("TimeExceededPacket"),
                    Self::minimum_packet_size(),
                    packet.len(),
                ))
            }
        }

        #[must_use]
        pub const fn minimum_packet_size() -> usize {
            8
        }

        #[must_use]
        pub fn get_icmp_type(&self) -> IcmpType {
            IcmpType::from(self.buf.u8_at(TYPE_OFFSET))
        }

        #[must_use]
        pub fn get_icmp_code(&self) -> IcmpCode {
            IcmpCode::from(self.buf.u8_at(CODE_OFFSET))
        }

        #[must_use]
        pub fn get_checksum(&self) -> u16 {
            self.buf.u16_at(CHECKSUM_OFFSET)
        }

        pub fn set_icmp_type(&mut self, val: IcmpType) {
            self.buf.set_u8(TYPE_OFFSET, val.id());
        }

        pub fn set_icmp_code(&mut self, val: IcmpCode) {
            self.buf.set_u8(CODE_OFFSET, val.0);
        }

        pub fn set_checksum(&mut self, val: u16) {
            self.buf.set_u16(CHECKSUM_OFFSET, val);
        }

        pub fn set_payload(&mut self, vals: &[u8]) {
            let current_offset = Self::minimum_packet_size();
            self.buf.as_slice_mut()[current_offset..current_offset + vals.len()]
                .copy_from_slice(vals);
        }

        #[must_use]
        pub fn packet(&self) -> &[u8] {
            self.buf.as_slice()
        }

        #[must_use]
        pub fn payload(&self) -> &[u8] {
            &self.buf.as_slice()[Self::minimum_packet_size()..]
        }
    }

    impl Debug for TimeExceededPacket<'_> {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("TimeExceededPacket")
                .field("icmp_type", &self.get_icmp_type())
                .field("icmp_code", &self.get_icmp_code())
                .field("checksum", &self.get_checksum())
                .field("payload", &fmt_payload(self.payload()))
                .finish()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use hex_literal::hex;

        #[test]
        fn test_view() {
            let buf = hex!("03 00 f4 ee 00 00 00 00");
            let packet = TimeExceededPacket::new_view(&buf).unwrap();
            assert_eq!(IcmpType::TimeExceeded, packet.get_icmp_type());
            assert_eq!(IcmpCode(0), packet.get_icmp_code());
            assert_eq!(62702, packet.get_checksum());
            assert!(packet.payload().is_empty());
        }

        #[test]
        fn test_new_view_insufficient_buffer() {
            const SIZE: usize = TimeExceededPacket::minimum_packet_size();
            let buf = [0_u8; SIZE - 1];
            let err = TimeExceededPacket::new_view(&buf).unwrap_err();
            assert_eq!(
                Error::Truncated(String::from("TimeExceededPacket"), SIZE, SIZE - 1),
                err
            );
        }
    }
}

pub mod destination_unreachable {
    use crate::buffer::Buffer;
    use crate::error::{Error, Result};
    use crate::fmt_payload;
    use crate::icmpv6::{IcmpCode, IcmpType};
    use std::fmt::{Debug, Formatter};

    const TYPE_OFFSET: usize = 0;
    const CODE_OFFSET: usize = 1;
    const CHECKSUM_OFFSET: usize = 2;

    /// Represents an ICMP `DestinationUnreachable` packet.
    ///
    /// The payload is the original datagram which could not be delivered,
    /// which is re-parsed to recover the identifier and sequence of the probe.
    pub struct DestinationUnreachablePacket<'a> {
        buf: Buffer<'a>,
    }

    impl<'a> DestinationUnreachablePacket<'a> {
        pub fn new(packet: &'a mut [u8]) -> Result<Self> {
            if packet.len() >= Self::minimum_packet_size() {
                Ok(Self {
                    buf: Buffer::Mutable(packet),
                })
            } else {
                Err(Error::Truncated(
                    String::from("DestinationUnreachablePacket"),
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
                    String::from("DestinationUnreachablePacket"),
                    Self::minimum_packet_size(),
                    packet.len(),
                ))
            }
        }

        #[must_use]
        pub const fn minimum_packet_size() -> usize {
            8
        }

        #[must_use]
        pub fn get_icmp_type(&self) -> IcmpType {
            IcmpType::from(self.buf.u8_at(TYPE_OFFSET))
        }

        #[must_use]
        pub fn get_icmp_code(&self) -> IcmpCode {
            IcmpCode::from(self.buf.u8_at(CODE_OFFSET))
        }

        #[must_use]
        pub fn get_checksum(&self) -> u16 {
            self.buf.u16_at(CHECKSUM_OFFSET)
        }

        pub fn set_icmp_type(&mut self, val: IcmpType) {
            self.buf.set_u8(TYPE_OFFSET, val.id());
        }

        pub fn set_icmp_code(&mut self, val: IcmpCode) {
            self.buf.set_u8(CODE_OFFSET, val.0);
        }

        pub fn set_checksum(&mut self, val: u16) {
            self.buf.set_u16(CHECKSUM_OFFSET, val);
        }

        pub fn set_payload(&mut self, vals: &[u8]) {
            let current_offset = Self::minimum_packet_size();
            self.buf.as_slice_mut()[current_offset..current_offset + vals.len()]
                .copy_from_slice(vals);
        }

        #[must_use]
        pub fn packet(&self) -> &[u8] {
            self.buf.as_slice()
        }

        #[must_use]
        pub fn payload(&self) -> &[u8] {
            &self.buf.as_slice()[Self::minimum_packet_size()..]
        }
    }

    impl Debug for DestinationUnreachablePacket<'_> {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("DestinationUnreachablePacket")
                .field("icmp_type", &self.get_icmp_type())
                .field("icmp_code", &self.get_icmp_code())
                .field("checksum", &self.get_checksum())
                .field("payload", &fmt_payload(self.payload()))
                .finish()
        }
    }

}
