use crate::config::PingConfig;
use crate::error::{Error, Result};
use crate::net::Network;
use crate::probe::{ProbeRequest, Response};
use crate::report::{PingReport, PingResult, PingStatistics, ProbeOutcome};
use crate::types::{CancelToken, Sequence};
use std::fmt::{Debug, Formatter};
use std::time::{Instant, SystemTime};
use tracing::instrument;

/// How often the cancellation signal is checked while waiting.
const CANCEL_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(10);

/// A ping session.
///
/// Sends a fixed number of ICMP echo probes to a single target at a fixed
/// TTL, correlates the replies by identifier and sequence and aggregates
/// latency and loss statistics.
pub struct Ping<N: Network> {
    network: N,
    config: PingConfig,
    cancel: CancelToken,
}

impl<N: Network> Ping<N> {
    pub const fn new(network: N, config: PingConfig, cancel: CancelToken) -> Self {
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

    /// Run the ping session to completion.
    ///
    /// A send failure on the first probe is fatal, a later send failure is
    /// recorded as loss.  Cancellation stops the run and the statistics are
    /// computed over the probes completed so far.
    #[instrument(skip_all, level = "trace")]
    pub fn run(&mut self) -> Result<PingReport> {
        let mut results = Vec::with_capacity(self.config.count);
        let mut anomalies = 0;
        let mut sequence = Sequence(1);
        for attempt in 0..self.config.count {
            if self.cancel.is_cancelled() {
                break;
            }
            let probe = ProbeRequest::new(
                sequence,
                self.config.identifier,
                self.config.ttl,
                SystemTime::now(),
            );
            let started = Instant::now();
            match self.network.send_probe(probe) {
                Ok(()) => {
                    let outcome = self.await_reply(probe, started, &mut anomalies)?;
                    results.push(PingResult { sequence, outcome });
                }
                Err(Error::SendFailed(err)) if attempt > 0 => {
                    tracing::debug!(?err, "probe failed to send");
                    results.push(PingResult {
                        sequence,
                        outcome: ProbeOutcome::NoReply,
                    });
                }
                Err(err) => return Err(err),
            }
            sequence = sequence.successor();
            if attempt + 1 < self.config.count {
                self.wait_interval(started);
            }
        }
        let statistics = PingStatistics::from_results(&results, anomalies);
        Ok(PingReport {
            target: self.config.target_addr,
            results,
            statistics,
        })
    }

    /// Wait for the reply to a probe, discarding responses which do not
    /// correlate.
    ///
    /// A response carrying a foreign identifier belongs to another process
    /// and is ignored.  A response carrying our identifier but an unexpected
    /// sequence is a late or duplicate reply and is counted as an anomaly.
    #[instrument(skip_all, level = "trace")]
    fn await_reply(
        &mut self,
        probe: ProbeRequest,
        started: Instant,
        anomalies: &mut usize,
    ) -> Result<ProbeOutcome> {
        let deadline = started + self.config.probe_timeout;
        while Instant::now() < deadline {
            if self.cancel.is_cancelled() {
                return Ok(ProbeOutcome::NoReply);
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
                *anomalies += 1;
                continue;
            }
            match resp {
                Response::EchoReply(..) => {
                    let rtt = data.recv.duration_since(probe.sent).unwrap_or_default();
                    return Ok(ProbeOutcome::Reply {
                        addr: data.addr,
                        rtt,
                    });
                }
                Response::TimeExceeded(..) | Response::DestinationUnreachable(..) => {
                    tracing::debug!(?resp, "probe did not reach the target");
                    return Ok(ProbeOutcome::NoReply);
                }
            }
        }
        Ok(ProbeOutcome::NoReply)
    }

    /// Sleep out the remainder of the probe interval, polling for
    /// cancellation.
    fn wait_interval(&self, started: Instant) {
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            let elapsed = started.elapsed();
            if elapsed >= self.config.interval {
                return;
            }
            let remaining = self.config.interval - elapsed;
            std::thread::sleep(remaining.min(CANCEL_POLL_INTERVAL));
        }
    }
}

impl<N: Network> Debug for Ping<N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ping")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
