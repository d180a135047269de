//! Checksum implementations for `ICMP` over IPv4 and IPv6.
//!
//! This code is derived from [`libpnet`] which is available under the Apache 2.0 license.
//!
//! [`libpnet`]: https://github.com/libpnet/libpnet

use crate::IpProtocol;
use std::net::Ipv6Addr;

/// Calculate the checksum for an `Ipv4` `ICMP` packet.
///
/// The checksum word of the packet itself is skipped during summation and so
/// the same function serves both building (checksum field zeroed) and
/// verification (recompute and compare against the stored value).
#[must_use]
pub fn icmp_ipv4_checksum(data: &[u8]) -> u16 {
    checksum(data, 1)
}

/// Calculate the checksum for an `Ipv6` `ICMP` packet.
///
/// The `ICMPv6` checksum covers the IPv6 pseudo-header of source address,
/// destination address, payload length and next-header protocol.
#[must_use]
pub fn icmp_ipv6_checksum(data: &[u8], src_addr: Ipv6Addr, dest_addr: Ipv6Addr) -> u16 {
    ipv6_checksum(data, 1, src_addr, dest_addr, IpProtocol::IcmpV6)
}

fn checksum(data: &[u8], ignore_word: usize) -> u16 {
    if data.is_empty() {
        return 0;
    }
    let sum = sum_be_words(data, ignore_word);
    finalize_checksum(sum)
}

fn ipv6_checksum(
    data: &[u8],
    ignore_word: usize,
    source: Ipv6Addr,
    destination: Ipv6Addr,
    next_level_protocol: IpProtocol,
) -> u16 {
    let mut sum = 0u32;
    sum += ipv6_word_sum(source);
    sum += ipv6_word_sum(destination);
    sum += u32::from(next_level_protocol.id());
    sum += data.len() as u32;
    sum += sum_be_words(data, ignore_word);
    finalize_checksum(sum)
}

fn ipv6_word_sum(ip: Ipv6Addr) -> u32 {
    ip.segments().iter().map(|x| u32::from(*x)).sum()
}

fn sum_be_words(data: &[u8], ignore_word: usize) -> u32 {
    if data.is_empty() {
        return 0;
    }
    let len = data.len();
    let mut cur_data = data;
    let mut sum = 0u32;
    let mut i = 0;
    while cur_data.len() >= 2 {
        if i != ignore_word {
            sum += u32::from(u16::from_be_bytes([cur_data[0], cur_data[1]]));
        }
        cur_data = &cur_data[2..];
        i += 1;
    }
    if i != ignore_word && len & 1 != 0 {
        sum += u32::from(data[len - 1]) << 8;
    }
    sum
}

const fn finalize_checksum(mut sum: u32) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum >> 16) + (sum & 0xFFFF);
    }
    !sum as u16
}
