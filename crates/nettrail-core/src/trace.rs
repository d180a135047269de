use crate::config::TracerouteConfig;
use crate::error::{Error, Result};
use crate::net::Network;
use crate::probe::{ProbeRequest, Response};
use crate::report::{Hop, TracerouteReport};
use crate::types::{CancelToken, Sequence, TimeToLive};
use std::fmt::{Debug, Formatter};
use std::net::IpAddr;
use std::time::{Duration, Instant, SystemTime};
use tracing::instrument;

/// A single correlated hop response.
struct HopResponse {
    addr: IpAddr,
    rtt: Duration,
    terminal: bool,
}

/// A traceroute session.
///
/// Sends one ICMP echo probe per TTL, starting at `first_ttl` and walking
/// towards `max_hops`.  A `TimeExceeded` response identifies the router at
/// that hop, an `EchoReply` from the target itself is terminal.
pub struct Traceroute<N: Network> {
    network: N,
    config: TracerouteConfig,
    cancel: CancelToken,
}

impl<N: Network> Traceroute<N> {
    pub const fn new(network: N, config: TracerouteConfig, cancel: CancelToken) -> Self {
        Self {
            network,
            config,
            cancel,
        }
    }

    /// A clone of the cancellation token for this session.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the traceroute session to completion.
    ///
    /// Exhausting `max_hops` without reaching the target is not an error,
    /// the report is returned with `reached` unset.
    #[instrument(skip_all, level = "trace")]
    pub fn run(&mut self) -> Result<TracerouteReport> {
        let mut hops = Vec::new();
        let mut reached = false;
        let mut sequence = Sequence(1);
        for ttl in self.config.first_ttl.0..=self.config.max_hops.0 {
            if self.cancel.is_cancelled() {
                break;
            }
            let probe = ProbeRequest::new(
                sequence,
                self.config.identifier,
                TimeToLive(ttl),
                SystemTime::now(),
            );
            match self.network.send_probe(probe) {
                Ok(()) => match self.await_hop(probe)? {
                    Some(resp) => {
                        hops.push(Hop {
                            ttl: TimeToLive(ttl),
                            addr: Some(resp.addr),
                            rtt: Some(resp.rtt),
                            terminal: resp.terminal,
                        });
                        if resp.terminal {
                            reached = true;
                            break;
                        }
                    }
                    None => hops.push(Hop {
                        ttl: TimeToLive(ttl),
                        addr: None,
                        rtt: None,
                        terminal: false,
                    }),
                },
                Err(Error::SendFailed(err)) if ttl > self.config.first_ttl.0 => {
                    tracing::debug!(?err, "probe failed to send");
                    hops.push(Hop {
                        ttl: TimeToLive(ttl),
                        addr: None,
                        rtt: None,
                        terminal: false,
                    });
                }
                Err(err) => return Err(err),
            }
            sequence = sequence.successor();
        }
        Ok(TracerouteReport {
            target: self.config.target_addr,
            hops,
            reached,
        })
    }

    /// Wait for the response to a hop probe, discarding responses which do
    /// not correlate.
    ///
    /// A `TimeExceeded` response identifies an intermediate router.  An
    /// `EchoReply` is terminal only when it comes from the target address, a
    /// `DestinationUnreachable` identifies a hop but never terminates the
    /// walk.
    #[instrument(skip_all, level = "trace")]
    fn await_hop(&mut self, probe: ProbeRequest) -> Result<Option<HopResponse>> {
        let deadline = Instant::now() + self.config.hop_timeout;
        while Instant::now() < deadline {
            if self.cancel.is_cancelled() {
                return Ok(None);
            }
            let Some(resp) = self.network.recv_probe()? else {
                continue;
            };
            let data = *resp.data();
            if data.identifier != probe.identifier.0 {
                tracing::debug!(identifier = data.identifier, "ignoring foreign response");
                continue;
            }
            if data.sequence != probe.sequence.0 {
                tracing::debug!(sequence = data.sequence, "unexpected sequence");
                continue;
            }
            let rtt = data.recv.duration_since(probe.sent).unwrap_or_default();
            let terminal = match resp {
                Response::EchoReply(..) => data.addr == self.config.target_addr,
                Response::TimeExceeded(..) | Response::DestinationUnreachable(..) => false,
            };
            return Ok(Some(HopResponse {
                addr: data.addr,
                rtt,
                terminal,
            }));
        }
        Ok(None)
    }
}

impl<N: Network> Debug for Traceroute<N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Traceroute")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::MockNetwork;
    use crate::probe::{IcmpPacketCode, ResponseData};
    use crate::types::SessionId;
    use std::net::Ipv4Addr;

    const TARGET: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3));
    const ROUTER_1: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    const ROUTER_2: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
    const IDENTIFIER: SessionId = SessionId(86);

    fn config(first_ttl: u8, max_hops: u8) -> TracerouteConfig {
        TracerouteConfig {
            target_addr: TARGET,
            identifier: IDENTIFIER,
            first_ttl: TimeToLive(first_ttl),
            max_hops: TimeToLive(max_hops),
            hop_timeout: Duration::from_millis(10),
        }
    }

    fn time_exceeded(addr: IpAddr, sequence: u16) -> Response {
        Response::TimeExceeded(
            ResponseData::new(SystemTime::now(), addr, IDENTIFIER.0, sequence),
            IcmpPacketCode(0),
        )
    }

    fn echo_reply(addr: IpAddr, sequence: u16) -> Response {
        Response::EchoReply(
            ResponseData::new(SystemTime::now(), addr, IDENTIFIER.0, sequence),
            IcmpPacketCode(0),
        )
    }

    #[test]
    fn test_traceroute_reaches_target() -> anyhow::Result<()> {
        let mut network = MockNetwork::new();
        network.expect_send_probe().times(3).returning(|_| Ok(()));
        let mut hop = 0;
        network.expect_recv_probe().returning(move || {
            hop += 1;
            Ok(Some(match hop {
                1 => time_exceeded(ROUTER_1, 1),
                2 => time_exceeded(ROUTER_2, 2),
                _ => echo_reply(TARGET, 3),
            }))
        });
        let mut traceroute = Traceroute::new(network, config(1, 30), CancelToken::new());
        let report = traceroute.run()?;
        assert!(report.reached);
        assert_eq!(3, report.hops.len());
        assert_eq!(Some(ROUTER_1), report.hops[0].addr);
        assert_eq!(Some(ROUTER_2), report.hops[1].addr);
        assert_eq!(Some(TARGET), report.hops[2].addr);
        assert_eq!(TimeToLive(3), report.hops[2].ttl);
        assert!(report.hops[2].terminal);
        assert!(report.hops[..2].iter().all(|hop| !hop.terminal));
        Ok(())
    }

    #[test]
    fn test_traceroute_exhausts_max_hops() -> anyhow::Result<()> {
        let mut network = MockNetwork::new();
        network.expect_send_probe().times(3).returning(|_| Ok(()));
        network.expect_recv_probe().returning(|| Ok(None));
        let mut traceroute = Traceroute::new(network, config(1, 3), CancelToken::new());
        let report = traceroute.run()?;
        assert!(!report.reached);
        assert_eq!(3, report.hops.len());
        assert!(report.hops.iter().all(|hop| hop.addr.is_none()));
        assert!(report.hops.iter().all(|hop| !hop.terminal));
        Ok(())
    }

    #[test]
    fn test_traceroute_silent_hop_then_target() -> anyhow::Result<()> {
        let mut network = MockNetwork::new();
        network.expect_send_probe().times(2).returning(|_| Ok(()));
        let mut hop = 0;
        network.expect_recv_probe().returning(move || {
            hop += 1;
            if hop == 1 {
                Ok(None)
            } else {
                Ok(Some(echo_reply(TARGET, 2)))
            }
        });
        let mut traceroute = Traceroute::new(network, config(1, 30), CancelToken::new());
        let report = traceroute.run()?;
        assert!(report.reached);
        assert_eq!(2, report.hops.len());
        assert_eq!(None, report.hops[0].addr);
        assert_eq!(Some(TARGET), report.hops[1].addr);
        Ok(())
    }

    #[test]
    fn test_traceroute_destination_unreachable_not_terminal() -> anyhow::Result<()> {
        let mut network = MockNetwork::new();
        network.expect_send_probe().times(2).returning(|_| Ok(()));
        let mut hop = 0;
        network.expect_recv_probe().returning(move || {
            hop += 1;
            if hop == 1 {
                Ok(Some(Response::DestinationUnreachable(
                    ResponseData::new(SystemTime::now(), ROUTER_1, IDENTIFIER.0, 1),
                    IcmpPacketCode(1),
                )))
            } else {
                Ok(Some(echo_reply(TARGET, 2)))
            }
        });
        let mut traceroute = Traceroute::new(network, config(1, 2), CancelToken::new());
        let report = traceroute.run()?;
        assert!(report.reached);
        assert_eq!(Some(ROUTER_1), report.hops[0].addr);
        assert!(!report.hops[0].terminal);
        assert!(report.hops[1].terminal);
        Ok(())
    }

    #[test]
    fn test_traceroute_starts_at_first_ttl() -> anyhow::Result<()> {
        let mut network = MockNetwork::new();
        network
            .expect_send_probe()
            .times(1)
            .withf(|probe| probe.ttl == TimeToLive(5))
            .returning(|_| Ok(()));
        network
            .expect_recv_probe()
            .returning(|| Ok(Some(echo_reply(TARGET, 1))));
        let mut traceroute = Traceroute::new(network, config(5, 30), CancelToken::new());
        let report = traceroute.run()?;
        assert!(report.reached);
        assert_eq!(TimeToLive(5), report.hops[0].ttl);
        Ok(())
    }

    #[test]
    fn test_traceroute_cancelled_before_start() -> anyhow::Result<()> {
        let network = MockNetwork::new();
        let mut traceroute = Traceroute::new(network, config(1, 30), CancelToken::new());
        traceroute.cancel_token().cancel();
        let report = traceroute.run()?;
        assert!(report.hops.is_empty());
        assert!(!report.reached);
        Ok(())
    }

    // Cancelling mid-wait must unblock the hop wait well before the hop
    // timeout and return the hops accumulated so far.
    #[test]
    fn test_traceroute_cancelled_while_awaiting_hop() -> anyhow::Result<()> {
        let mut network = MockNetwork::new();
        network.expect_send_probe().times(1).returning(|_| Ok(()));
        let cancel = CancelToken::new();
        let recv_cancel = cancel.clone();
        network.expect_recv_probe().returning(move || {
            recv_cancel.cancel();
            Ok(None)
        });
        let config = TracerouteConfig {
            hop_timeout: Duration::from_secs(10),
            ..config(1, 30)
        };
        let mut traceroute = Traceroute::new(network, config, cancel);
        let started = Instant::now();
        let report = traceroute.run()?;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(1, report.hops.len());
        assert!(!report.reached);
        Ok(())
    }
}
