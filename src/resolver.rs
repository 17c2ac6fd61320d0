use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::net::ToSocketAddrs;

use url::Host;

use crate::error::ResolveError;

pub fn lookup(target: &str) -> Result<Ipv4Addr, ResolveError> {
    let ip = match Host::parse(target).map_err(ResolveError::HostParseFailed)? {
        Host::Domain(dmn) => (dmn.as_str(), 0 /* dummy port */)
            .to_socket_addrs()
            .map_err(ResolveError::ResolverFailed)?
            .find_map(|saddr| match saddr {
                SocketAddr::V4(sip) => Some(*sip.ip()),
                SocketAddr::V6(_) => None,
            })
            .ok_or_else(|| ResolveError::DomainLookupFailed(target.into()))?,
        Host::Ipv4(ip) => ip,
        Host::Ipv6(_) => return Err(ResolveError::OnlyIpv4TargetSupported),
    };

    log::debug!("Target `{}` resolved to `{}`", target, ip);

    Ok(ip)
}
