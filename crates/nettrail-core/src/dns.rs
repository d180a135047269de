use crate::error::{Error, Result};
use std::net::IpAddr;
use std::str::FromStr;
use tracing::instrument;

/// Resolve a target host to an `IpAddr`.
///
/// The target may be an IPv4 or IPv6 address literal or a hostname.  For a
/// hostname the first resolved address is used.
#[instrument(level = "trace")]
pub fn resolve(target: &str) -> Result<IpAddr> {
    if let Ok(addr) = IpAddr::from_str(target) {
        return Ok(addr);
    }
    dns_lookup::lookup_host(target)
        .map_err(|_| Error::ResolutionFailed(String::from(target)))?
        .into_iter()
        .next()
        .ok_or_else(|| Error::ResolutionFailed(String::from(target)))
}
