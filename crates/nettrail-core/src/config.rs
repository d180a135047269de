use crate::types::{PacketSize, PayloadPattern, SessionId, TimeToLive};
use std::net::IpAddr;
use std::time::Duration;

/// Default values for configuration.
pub mod defaults {
    use crate::types::{PacketSize, PayloadPattern, TimeToLive};
    use std::time::Duration;

    /// The default number of ping probes to send.
    pub const DEFAULT_PING_COUNT: usize = 4;

    /// The default interval between ping probes.
    pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(1);

    /// The default period to wait for a probe response.
    pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

    /// The default TTL for ping probes.
    pub const DEFAULT_PING_TTL: TimeToLive = TimeToLive(64);

    /// The default first TTL for traceroute.
    pub const DEFAULT_FIRST_TTL: TimeToLive = TimeToLive(1);

    /// The default maximum number of traceroute hops.
    pub const DEFAULT_MAX_HOPS: TimeToLive = TimeToLive(30);

    /// The default period to wait for a response at each traceroute hop.
    pub const DEFAULT_HOP_TIMEOUT: Duration = Duration::from_secs(1);

    /// The default socket read timeout.
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(10);

    /// The default size of IP packets to send, headers included.
    pub const DEFAULT_PACKET_SIZE: PacketSize = PacketSize(84);

    /// The default byte value used to fill the probe payload.
    pub const DEFAULT_PAYLOAD_PATTERN: PayloadPattern = PayloadPattern(0);
}

/// The maximum TTL allowed for any probe.
pub const MAX_TTL: TimeToLive = TimeToLive(254);

/// Configuration for the network channel.
#[derive(Debug, Clone, Copy)]
pub struct ChannelConfig {
    pub source_addr: Option<IpAddr>,
    pub target_addr: IpAddr,
    pub packet_size: PacketSize,
    pub payload_pattern: PayloadPattern,
    pub read_timeout: Duration,
}

impl ChannelConfig {
    #[must_use]
    pub const fn new(target_addr: IpAddr) -> Self {
        Self {
            source_addr: None,
            target_addr,
            packet_size: defaults::DEFAULT_PACKET_SIZE,
            payload_pattern: defaults::DEFAULT_PAYLOAD_PATTERN,
            read_timeout: defaults::DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Configuration for a ping session.
#[derive(Debug, Clone, Copy)]
pub struct PingConfig {
    pub target_addr: IpAddr,
    pub identifier: SessionId,
    pub count: usize,
    pub interval: Duration,
    pub probe_timeout: Duration,
    pub ttl: TimeToLive,
}

/// Configuration for a traceroute session.
#[derive(Debug, Clone, Copy)]
pub struct TracerouteConfig {
    pub target_addr: IpAddr,
    pub identifier: SessionId,
    pub first_ttl: TimeToLive,
    pub max_hops: TimeToLive,
    pub hop_timeout: Duration,
}
