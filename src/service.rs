use std::{collections::HashMap, fs};

use once_cell::sync::Lazy;

use crate::scan::Protocol;

/// Returned when no service is registered for a port.
pub const UNKNOWN: &str = "Unknown";

const SERVICES_PATH: &str = "/etc/services";

// Used when the system registry can't be read.
const WELL_KNOWN: &[(u16, Protocol, &str)] = &[
    (20, Protocol::Tcp, "ftp-data"),
    (21, Protocol::Tcp, "ftp"),
    (22, Protocol::Tcp, "ssh"),
    (23, Protocol::Tcp, "telnet"),
    (25, Protocol::Tcp, "smtp"),
    (53, Protocol::Tcp, "domain"),
    (53, Protocol::Udp, "domain"),
    (67, Protocol::Udp, "bootps"),
    (68, Protocol::Udp, "bootpc"),
    (69, Protocol::Udp, "tftp"),
    (80, Protocol::Tcp, "http"),
    (88, Protocol::Tcp, "kerberos"),
    (88, Protocol::Udp, "kerberos"),
    (110, Protocol::Tcp, "pop3"),
    (123, Protocol::Udp, "ntp"),
    (137, Protocol::Udp, "netbios-ns"),
    (138, Protocol::Udp, "netbios-dgm"),
    (139, Protocol::Tcp, "netbios-ssn"),
    (143, Protocol::Tcp, "imap2"),
    (161, Protocol::Udp, "snmp"),
    (162, Protocol::Udp, "snmp-trap"),
    (389, Protocol::Tcp, "ldap"),
    (443, Protocol::Tcp, "https"),
    (443, Protocol::Udp, "https"),
    (445, Protocol::Tcp, "microsoft-ds"),
    (465, Protocol::Tcp, "submissions"),
    (500, Protocol::Udp, "isakmp"),
    (514, Protocol::Udp, "syslog"),
    (587, Protocol::Tcp, "submission"),
    (636, Protocol::Tcp, "ldaps"),
    (993, Protocol::Tcp, "imaps"),
    (995, Protocol::Tcp, "pop3s"),
    (1194, Protocol::Udp, "openvpn"),
    (1900, Protocol::Udp, "ssdp"),
    (3306, Protocol::Tcp, "mysql"),
    (3389, Protocol::Tcp, "ms-wbt-server"),
    (5353, Protocol::Udp, "mdns"),
    (5432, Protocol::Tcp, "postgresql"),
    (5900, Protocol::Tcp, "rfb"),
    (6379, Protocol::Tcp, "redis"),
    (8080, Protocol::Tcp, "http-alt"),
];

type Registry = HashMap<(u16, Protocol), String>;

static REGISTRY: Lazy<Registry> = Lazy::new(|| match fs::read_to_string(SERVICES_PATH) {
    Ok(raw) => {
        let registry = parse(&raw);
        log::debug!(
            "Loaded {} service names from `{}`",
            registry.len(),
            SERVICES_PATH
        );
        registry
    }
    Err(e) => {
        log::debug!(
            "Failed to read `{}` ({}), using built-in service names",
            SERVICES_PATH,
            e
        );
        WELL_KNOWN
            .iter()
            .map(|&(port, proto, name)| ((port, proto), name.to_owned()))
            .collect()
    }
});

/// Service name registered for `port` over `proto`, or [`UNKNOWN`].
pub fn resolve(port: u16, proto: Protocol) -> &'static str {
    REGISTRY
        .get(&(port, proto))
        .map_or(UNKNOWN, String::as_str)
}

/// Parses the `services(5)` format: `name port/proto [aliases...] [# comment]`.
///
/// The first name listed for a port and protocol wins, like `getservbyport`.
fn parse(raw: &str) -> Registry {
    let mut registry = Registry::new();

    for line in raw.lines() {
        let line = line.split('#').next().unwrap_or_default();
        let mut fields = line.split_whitespace();
        let (Some(name), Some(entry)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Some((port, proto)) = entry.split_once('/') else {
            continue;
        };
        let proto = match proto.to_ascii_lowercase().as_str() {
            "tcp" => Protocol::Tcp,
            "udp" => Protocol::Udp,
            _ => continue,
        };
        let Ok(port) = port.parse::<u16>() else {
            continue;
        };

        registry
            .entry((port, proto))
            .or_insert_with(|| name.to_owned());
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# Network services, Internet style
tcpmux          1/tcp                           # TCP port service multiplexer
ssh             22/tcp                          # SSH Remote Login Protocol
domain          53/tcp
domain          53/udp
http            80/tcp          www             # WorldWideWeb HTTP
www-alt         80/tcp
sctp-thing      80/sctp
broken          nope/tcp
";

    #[test]
    fn parses_names_per_protocol() {
        let registry = parse(SAMPLE);

        assert_eq!(registry.get(&(22, Protocol::Tcp)).unwrap(), "ssh");
        assert_eq!(registry.get(&(53, Protocol::Udp)).unwrap(), "domain");
        assert!(registry.get(&(22, Protocol::Udp)).is_none());
    }

    #[test]
    fn first_entry_wins() {
        assert_eq!(parse(SAMPLE).get(&(80, Protocol::Tcp)).unwrap(), "http");
    }

    #[test]
    fn skips_comments_and_malformed_lines() {
        assert_eq!(parse(SAMPLE).len(), 5);
    }

    #[test]
    fn unregistered_port_is_unknown() {
        // Port 0 is reserved and never listed.
        assert_eq!(resolve(0, Protocol::Tcp), UNKNOWN);
    }
}
