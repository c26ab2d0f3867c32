//! Hostname resolution through an explicit, caller-supplied DNS server list.
//!
//! Private clouds often expose the settings registry only through an internal
//! resolver that is not in the VM's default resolver configuration, so the
//! system resolver is never consulted here: the hickory resolver is built
//! from exactly the nameservers declared in user data.

use std::net::IpAddr;

use hickory_resolver::Resolver;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};

use crate::error::KeelError;

/// Resolution seam. The production implementation talks DNS; tests register
/// `(servers, host) -> address` records on a stub.
pub trait DnsResolver {
    fn lookup_host(&self, dns_servers: &[String], host: &str) -> Result<String, KeelError>;
}

/// hickory-resolver backed implementation. A fresh resolver is constructed
/// per lookup — the server list comes from the document being resolved, not
/// from process state.
pub struct HickoryResolver;

impl DnsResolver for HickoryResolver {
    fn lookup_host(&self, dns_servers: &[String], host: &str) -> Result<String, KeelError> {
        // Already an address, nothing to resolve.
        if host.parse::<IpAddr>().is_ok() {
            return Ok(host.to_string());
        }

        let server_ips: Vec<IpAddr> = dns_servers
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();
        if server_ips.is_empty() {
            return Err(KeelError::ResolutionFailed {
                endpoint: host.to_string(),
                message: format!("no usable nameserver address in {dns_servers:?}"),
            });
        }

        let name_servers = NameServerConfigGroup::from_ips_clear(&server_ips, 53, true);
        let config = ResolverConfig::from_parts(None, Vec::new(), name_servers);
        let resolver =
            Resolver::new(config, ResolverOpts::default()).map_err(|e| KeelError::ResolutionFailed {
                endpoint: host.to_string(),
                message: e.to_string(),
            })?;

        let lookup = resolver
            .lookup_ip(host)
            .map_err(|e| KeelError::ResolutionFailed {
                endpoint: host.to_string(),
                message: e.to_string(),
            })?;

        lookup
            .iter()
            .next()
            .map(|ip| ip.to_string())
            .ok_or_else(|| KeelError::ResolutionFailed {
                endpoint: host.to_string(),
                message: format!("no address records for {host}"),
            })
    }
}

// ── endpoint substitution ─────────────────────────────────

/// Resolve the host component of `endpoint` through `dns_servers` and
/// substitute the resolved address back in.
///
/// An empty server list returns the endpoint unchanged — no resolution is
/// attempted. A declared override is binding: resolver failure propagates,
/// never a silent fallback to the unresolved name.
pub fn resolve_endpoint(
    resolver: &dyn DnsResolver,
    dns_servers: &[String],
    endpoint: &str,
) -> Result<String, KeelError> {
    if dns_servers.is_empty() {
        return Ok(endpoint.to_string());
    }

    let (start, end) = host_span(endpoint);
    let host = &endpoint[start..end];
    let resolved = resolver.lookup_host(dns_servers, host)?;
    Ok(format!(
        "{}{}{}",
        &endpoint[..start],
        resolved,
        &endpoint[end..]
    ))
}

/// Byte span of the host component: after any `scheme://`, before the first
/// `:port` or `/path`.
fn host_span(endpoint: &str) -> (usize, usize) {
    let start = match endpoint.find("://") {
        Some(i) => i + 3,
        None => 0,
    };
    let rest = &endpoint[start..];
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let host_end = rest[..authority_end]
        .find(':')
        .unwrap_or(authority_end);
    (start, start + host_end)
}
