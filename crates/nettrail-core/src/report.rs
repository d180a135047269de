use crate::types::{Sequence, TimeToLive};
use std::net::IpAddr;
use std::time::Duration;

/// The outcome of a single ping probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// An echo reply was received within the timeout.
    Reply { addr: IpAddr, rtt: Duration },
    /// No reply was received within the timeout.
    NoReply,
}

/// The result of a single ping probe, in sequence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingResult {
    pub sequence: Sequence,
    pub outcome: ProbeOutcome,
}

/// Statistics for a completed ping session.
///
/// Recomputed from the full set of results, latency figures cover received
/// samples only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingStatistics {
    /// The number of probes sent.
    pub sent: usize,
    /// The number of probes for which an echo reply was received.
    pub received: usize,
    /// The number of out-of-order, duplicate or otherwise unexpected replies.
    pub anomalies: usize,
    /// The minimum round trip time.
    pub min: Option<Duration>,
    /// The maximum round trip time.
    pub max: Option<Duration>,
    /// The mean round trip time.
    pub avg: Option<Duration>,
    /// The population standard deviation of the round trip time.
    pub stddev: Option<Duration>,
}

impl PingStatistics {
    /// Compute statistics over a set of ping results.
    #[must_use]
    pub fn from_results(results: &[PingResult], anomalies: usize) -> Self {
        let sent = results.len();
        let rtts: Vec<f64> = results
            .iter()
            .filter_map(|result| match result.outcome {
                ProbeOutcome::Reply { rtt, .. } => Some(rtt.as_secs_f64()),
                ProbeOutcome::NoReply => None,
            })
            .collect();
        let received = rtts.len();
        if received == 0 {
            return Self {
                sent,
                received,
                anomalies,
                min: None,
                max: None,
                avg: None,
                stddev: None,
            };
        }
        let min = rtts.iter().copied().fold(f64::INFINITY, f64::min);
        let max = rtts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = rtts.iter().sum::<f64>() / received as f64;
        let variance = rtts.iter().map(|rtt| (rtt - avg).powi(2)).sum::<f64>() / received as f64;
        Self {
            sent,
            received,
            anomalies,
            min: Some(Duration::from_secs_f64(min)),
            max: Some(Duration::from_secs_f64(max)),
            avg: Some(Duration::from_secs_f64(avg)),
            stddev: Some(Duration::from_secs_f64(variance.sqrt())),
        }
    }

    /// The fraction of probes which went unanswered, between 0 and 1.
    #[must_use]
    pub fn loss_ratio(&self) -> f64 {
        if self.sent == 0 {
            0.0
        } else {
            1.0 - self.received as f64 / self.sent as f64
        }
    }
}

/// A completed ping session.
#[derive(Debug, Clone)]
pub struct PingReport {
    /// The address probed.
    pub target: IpAddr,
    /// The per-probe results, in sequence order.
    pub results: Vec<PingResult>,
    /// Statistics over the results.
    pub statistics: PingStatistics,
}

/// A single hop discovered by a traceroute session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hop {
    /// The TTL of the probe for this hop.
    pub ttl: TimeToLive,
    /// The address which responded, if any.
    pub addr: Option<IpAddr>,
    /// The round trip time to this hop, if any.
    pub rtt: Option<Duration>,
    /// Whether this hop is the target itself responding with an echo reply.
    pub terminal: bool,
}

/// A completed traceroute session.
#[derive(Debug, Clone)]
pub struct TracerouteReport {
    /// The address traced.
    pub target: IpAddr,
    /// The hops discovered, in TTL order.
    pub hops: Vec<Hop>,
    /// Whether the target itself responded within the hop budget.
    pub reached: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn reply(sequence: u16, rtt_ms: u64) -> PingResult {
        PingResult {
            sequence: Sequence(sequence),
            outcome: ProbeOutcome::Reply {
                addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
                rtt: Duration::from_millis(rtt_ms),
            },
        }
    }

    fn no_reply(sequence: u16) -> PingResult {
        PingResult {
            sequence: Sequence(sequence),
            outcome: ProbeOutcome::NoReply,
        }
    }

    #[test]
    fn test_statistics_all_replies() {
        let results = [reply(1, 100), reply(2, 200), reply(3, 300)];
        let stats = PingStatistics::from_results(&results, 0);
        assert_eq!(3, stats.sent);
        assert_eq!(3, stats.received);
        assert_eq!(0, stats.anomalies);
        assert_eq!(Some(Duration::from_millis(100)), stats.min);
        assert_eq!(Some(Duration::from_millis(300)), stats.max);
        assert_eq!(Some(Duration::from_millis(200)), stats.avg);
        let stddev = stats.stddev.unwrap().as_secs_f64();
        assert!((stddev - 0.081_649_658_092_772_6).abs() < 1e-9);
        assert!((stats.loss_ratio() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_statistics_partial_loss() {
        let results = [reply(1, 100), no_reply(2), reply(3, 300), no_reply(4)];
        let stats = PingStatistics::from_results(&results, 0);
        assert_eq!(4, stats.sent);
        assert_eq!(2, stats.received);
        assert_eq!(Some(Duration::from_millis(100)), stats.min);
        assert_eq!(Some(Duration::from_millis(300)), stats.max);
        assert_eq!(Some(Duration::from_millis(200)), stats.avg);
        assert!((stats.loss_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_statistics_all_lost() {
        let results = [no_reply(1), no_reply(2), no_reply(3), no_reply(4)];
        let stats = PingStatistics::from_results(&results, 0);
        assert_eq!(4, stats.sent);
        assert_eq!(0, stats.received);
        assert_eq!(None, stats.min);
        assert_eq!(None, stats.max);
        assert_eq!(None, stats.avg);
        assert_eq!(None, stats.stddev);
        assert!((stats.loss_ratio() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_statistics_empty() {
        let stats = PingStatistics::from_results(&[], 0);
        assert_eq!(0, stats.sent);
        assert_eq!(0, stats.received);
        assert!((stats.loss_ratio() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_statistics_single_reply() {
        let results = [reply(1, 250)];
        let stats = PingStatistics::from_results(&results, 0);
        assert_eq!(Some(Duration::from_millis(250)), stats.min);
        assert_eq!(Some(Duration::from_millis(250)), stats.max);
        assert_eq!(Some(Duration::from_millis(250)), stats.avg);
        assert_eq!(Some(Duration::ZERO), stats.stddev);
    }
}
