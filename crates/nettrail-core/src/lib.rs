//! Nettrail - an ICMP ping and traceroute library.
//!
//! This crate provides the network diagnostic core used by the standalone
//! Nettrail application.  It measures round trip latency and loss to a target
//! (ping) and discovers the routed path towards a target hop by hop
//! (traceroute), for both IPv4 and IPv6 targets.
//!
//! Probes are ICMP `EchoRequest` packets sent over raw sockets and so the
//! `CAP_NET_RAW` capability (or root) is required on Linux.
//!
//! # Examples
//!
//! The following example pings a target with default configuration and
//! prints the resulting statistics:
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use nettrail_core::Builder;
//!
//! let report = Builder::new("example.com").build_ping()?.run()?;
//! println!("{:?}", report.statistics);
//! # Ok(())
//! # }
//! ```
//!
//! The following example traces the path to a target and prints each hop:
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use nettrail_core::Builder;
//!
//! let report = Builder::new("example.com").max_hops(16).build_traceroute()?.run()?;
//! for hop in &report.hops {
//!     println!("{:?}", hop);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # See Also
//!
//! - [`Builder`] - Build a [`Ping`] or [`Traceroute`] session.
//! - [`Ping::run`] - Run a ping session on the current thread.
//! - [`Traceroute::run`] - Run a traceroute session on the current thread.
#![deny(unsafe_code)]

/// Build a ping or traceroute session.
mod builder;

/// Session configuration.
pub mod config;

/// Target resolution.
mod dns;

/// Error types.
pub mod error;

/// The network channel.
mod net;

/// The ping engine.
mod ping;

/// Probe requests and responses.
mod probe;

/// Session reports and statistics.
mod report;

/// The traceroute engine.
mod trace;

/// Common types.
mod types;

pub use builder::Builder;
pub use config::{defaults, ChannelConfig, PingConfig, TracerouteConfig, MAX_TTL};
pub use dns::resolve;
pub use error::{Error, Result};
pub use net::{channel::Channel, Network, SocketImpl};
pub use ping::Ping;
pub use probe::{IcmpPacketCode, ProbeRequest, Response, ResponseData};
pub use report::{Hop, PingReport, PingResult, PingStatistics, ProbeOutcome, TracerouteReport};
pub use trace::Traceroute;
pub use types::{
    CancelToken, PacketSize, PayloadPattern, Sequence, SessionId, TimeToLive,
};
