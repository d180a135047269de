use crate::types::{Sequence, SessionId, TimeToLive};
use std::net::IpAddr;
use std::time::SystemTime;

/// Represents an ICMP echo probe.
///
/// A `ProbeRequest` is a packet sent across the network either to measure the
/// round trip time to a target host (ping) or to solicit a response from an
/// intermediate router (traceroute).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeRequest {
    /// The sequence of the probe, unique within a session.
    pub sequence: Sequence,
    /// The session identifier.
    pub identifier: SessionId,
    /// The TTL of the probe.
    pub ttl: TimeToLive,
    /// Timestamp when the probe was sent.
    pub sent: SystemTime,
}

impl ProbeRequest {
    #[must_use]
    pub const fn new(
        sequence: Sequence,
        identifier: SessionId,
        ttl: TimeToLive,
        sent: SystemTime,
    ) -> Self {
        Self {
            sequence,
            identifier,
            ttl,
            sent,
        }
    }
}

/// The response to a probe.
#[derive(Debug, Clone)]
pub enum Response {
    EchoReply(ResponseData, IcmpPacketCode),
    TimeExceeded(ResponseData, IcmpPacketCode),
    DestinationUnreachable(ResponseData, IcmpPacketCode),
}

impl Response {
    /// The response data common to all response types.
    #[must_use]
    pub const fn data(&self) -> &ResponseData {
        match self {
            Self::EchoReply(data, _)
            | Self::TimeExceeded(data, _)
            | Self::DestinationUnreachable(data, _) => data,
        }
    }
}

/// The data in a probe response.
///
/// The identifier and sequence are those of the original echo request, either
/// read from an `EchoReply` directly or recovered from the original datagram
/// embedded in a `TimeExceeded` or `DestinationUnreachable` response.
#[derive(Debug, Clone, Copy)]
pub struct ResponseData {
    /// Timestamp of the probe response.
    pub recv: SystemTime,
    /// The `IpAddr` that responded to the probe.
    pub addr: IpAddr,
    /// The identifier of the original echo request.
    pub identifier: u16,
    /// The sequence of the original echo request.
    pub sequence: u16,
}

impl ResponseData {
    #[must_use]
    pub const fn new(recv: SystemTime, addr: IpAddr, identifier: u16, sequence: u16) -> Self {
        Self {
            recv,
            addr,
            identifier,
            sequence,
        }
    }
}

/// The code of an ICMP response packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpPacketCode(pub u8);
