use crate::config::{defaults, ChannelConfig, PingConfig, TracerouteConfig, MAX_TTL};
use crate::dns;
use crate::error::{Error, Result};
use crate::net::channel::Channel;
use crate::net::SocketImpl;
use crate::ping::Ping;
use crate::trace::Traceroute;
use crate::types::{CancelToken, PacketSize, PayloadPattern, SessionId, TimeToLive};
use std::net::IpAddr;
use std::time::Duration;

/// Build a ping or traceroute session.
///
/// This is a convenience builder to simplify the creation of a session
/// against a single target.  The target may be a hostname or an IPv4 or IPv6
/// address and is resolved once, when the session is built.
///
/// # Examples
///
/// ```no_run
/// # fn main() -> anyhow::Result<()> {
/// use nettrail_core::Builder;
///
/// let report = Builder::new("example.com").count(3).build_ping()?.run()?;
/// println!("{:?}", report.statistics);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Builder {
    target: String,
    source_addr: Option<IpAddr>,
    packet_size: PacketSize,
    payload_pattern: PayloadPattern,
    read_timeout: Duration,
    identifier: Option<SessionId>,
    count: usize,
    interval: Duration,
    probe_timeout: Duration,
    ttl: TimeToLive,
    first_ttl: TimeToLive,
    max_hops: TimeToLive,
    hop_timeout: Duration,
}

impl Builder {
    /// Create a session builder for a given target.
    #[must_use]
    pub fn new<T: Into<String>>(target: T) -> Self {
        Self {
            target: target.into(),
            source_addr: None,
            packet_size: defaults::DEFAULT_PACKET_SIZE,
            payload_pattern: defaults::DEFAULT_PAYLOAD_PATTERN,
            read_timeout: defaults::DEFAULT_READ_TIMEOUT,
            identifier: None,
            count: defaults::DEFAULT_PING_COUNT,
            interval: defaults::DEFAULT_PING_INTERVAL,
            probe_timeout: defaults::DEFAULT_PROBE_TIMEOUT,
            ttl: defaults::DEFAULT_PING_TTL,
            first_ttl: defaults::DEFAULT_FIRST_TTL,
            max_hops: defaults::DEFAULT_MAX_HOPS,
            hop_timeout: defaults::DEFAULT_HOP_TIMEOUT,
        }
    }

    /// Set the source address.
    ///
    /// If not set then the source address will be discovered based on the
    /// target address.
    #[must_use]
    pub fn source_addr(self, source_addr: Option<IpAddr>) -> Self {
        Self {
            source_addr,
            ..self
        }
    }

    /// Set the total size of IP packets to send, headers included.
    #[must_use]
    pub fn packet_size(self, packet_size: u16) -> Self {
        Self {
            packet_size: PacketSize(packet_size),
            ..self
        }
    }

    /// Set the byte value used to fill the probe payload.
    #[must_use]
    pub fn payload_pattern(self, payload_pattern: u8) -> Self {
        Self {
            payload_pattern: PayloadPattern(payload_pattern),
            ..self
        }
    }

    /// Set the socket read timeout.
    #[must_use]
    pub fn read_timeout(self, read_timeout: Duration) -> Self {
        Self {
            read_timeout,
            ..self
        }
    }

    /// Set the session identifier.
    ///
    /// Carried as the ICMP echo identifier on every probe.  If not set then
    /// the process id is used.  Concurrent sessions must use distinct
    /// identifiers for responses to correlate unambiguously.
    #[must_use]
    pub fn identifier(self, identifier: u16) -> Self {
        Self {
            identifier: Some(SessionId(identifier)),
            ..self
        }
    }

    /// Set the number of ping probes to send.
    #[must_use]
    pub fn count(self, count: usize) -> Self {
        Self { count, ..self }
    }

    /// Set the interval between ping probes.
    #[must_use]
    pub fn interval(self, interval: Duration) -> Self {
        Self { interval, ..self }
    }

    /// Set the period to wait for each probe response.
    #[must_use]
    pub fn probe_timeout(self, probe_timeout: Duration) -> Self {
        Self {
            probe_timeout,
            ..self
        }
    }

    /// Set the TTL for ping probes.
    #[must_use]
    pub fn ttl(self, ttl: u8) -> Self {
        Self {
            ttl: TimeToLive(ttl),
            ..self
        }
    }

    /// Set the first TTL for traceroute.
    #[must_use]
    pub fn first_ttl(self, first_ttl: u8) -> Self {
        Self {
            first_ttl: TimeToLive(first_ttl),
            ..self
        }
    }

    /// Set the maximum number of traceroute hops.
    #[must_use]
    pub fn max_hops(self, max_hops: u8) -> Self {
        Self {
            max_hops: TimeToLive(max_hops),
            ..self
        }
    }

    /// Set the period to wait for a response at each traceroute hop.
    #[must_use]
    pub fn hop_timeout(self, hop_timeout: Duration) -> Self {
        Self {
            hop_timeout,
            ..self
        }
    }

    /// Build a ping session.
    ///
    /// Resolves the target and opens the ICMP channel, which requires the
    /// `CAP_NET_RAW` capability on Linux.
    ///
    /// # Errors
    ///
    /// Returns `Error::BadConfig` if the configuration is invalid and
    /// `Error::ResolutionFailed` if the target cannot be resolved.
    pub fn build_ping(self) -> Result<Ping<Channel<SocketImpl>>> {
        if self.count < 1 {
            return Err(Error::BadConfig(format!("count {} < 1", self.count)));
        }
        if self.ttl < TimeToLive(1) || self.ttl > MAX_TTL {
            return Err(Error::BadConfig(format!(
                "ttl {} not in range 1..={}",
                self.ttl.0, MAX_TTL.0
            )));
        }
        let (target_addr, channel) = self.connect_channel()?;
        let config = PingConfig {
            target_addr,
            identifier: self.session_identifier(),
            count: self.count,
            interval: self.interval,
            probe_timeout: self.probe_timeout,
            ttl: self.ttl,
        };
        Ok(Ping::new(channel, config, CancelToken::new()))
    }

    /// Build a traceroute session.
    ///
    /// Resolves the target and opens the ICMP channel, which requires the
    /// `CAP_NET_RAW` capability on Linux.
    ///
    /// # Errors
    ///
    /// Returns `Error::BadConfig` if the configuration is invalid and
    /// `Error::ResolutionFailed` if the target cannot be resolved.
    pub fn build_traceroute(self) -> Result<Traceroute<Channel<SocketImpl>>> {
        if self.first_ttl < TimeToLive(1) || self.first_ttl > MAX_TTL {
            return Err(Error::BadConfig(format!(
                "first_ttl {} not in range 1..={}",
                self.first_ttl.0, MAX_TTL.0
            )));
        }
        if self.max_hops > MAX_TTL {
            return Err(Error::BadConfig(format!(
                "max_hops {} > {}",
                self.max_hops.0, MAX_TTL.0
            )));
        }
        if self.first_ttl > self.max_hops {
            return Err(Error::BadConfig(format!(
                "first_ttl {} > max_hops {}",
                self.first_ttl.0, self.max_hops.0
            )));
        }
        let (target_addr, channel) = self.connect_channel()?;
        let config = TracerouteConfig {
            target_addr,
            identifier: self.session_identifier(),
            first_ttl: self.first_ttl,
            max_hops: self.max_hops,
            hop_timeout: self.hop_timeout,
        };
        Ok(Traceroute::new(channel, config, CancelToken::new()))
    }

    fn connect_channel(&self) -> Result<(IpAddr, Channel<SocketImpl>)> {
        let target_addr = dns::resolve(&self.target)?;
        let config = ChannelConfig {
            source_addr: self.source_addr,
            target_addr,
            packet_size: self.packet_size,
            payload_pattern: self.payload_pattern,
            read_timeout: self.read_timeout,
        };
        Ok((target_addr, Channel::connect(&config)?))
    }

    fn session_identifier(&self) -> SessionId {
        self.identifier
            .unwrap_or_else(|| SessionId(std::process::id() as u16))
    }
}
