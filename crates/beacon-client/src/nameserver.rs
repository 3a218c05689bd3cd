//! Nameserver descriptors, canned server sets, and discovery of the
//! system's configured resolvers.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

use beacon_types::protocol::types::{DomainName, RecordTypeWithData, ResourceRecord};

/// Whether a nameserver is known to speak DNS-over-HTTPS.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DohSupport {
    Yes,
    No,
    Unknown,
}

/// An upstream recursive or authoritative nameserver.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Nameserver {
    pub address: IpAddr,

    /// Tri-state DoH capability: `Unknown` servers get probed when
    /// the resolution mode wants HTTPS, `No` servers are never
    /// probed.
    pub doh: DohSupport,

    /// DNS search suffix associated with this server, used to
    /// complete short names.
    pub search_suffix: Option<DomainName>,
}

impl Nameserver {
    pub fn new(address: IpAddr) -> Self {
        Self {
            address,
            doh: DohSupport::Unknown,
            search_suffix: None,
        }
    }

    fn doh_capable(address: IpAddr) -> Self {
        Self {
            address,
            doh: DohSupport::Yes,
            search_suffix: None,
        }
    }
}

impl From<IpAddr> for Nameserver {
    fn from(address: IpAddr) -> Self {
        Self::new(address)
    }
}

/// Cloudflare public DNS, DoH capable.
pub fn cloudflare() -> Vec<Nameserver> {
    vec![
        Nameserver::doh_capable(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1))),
        Nameserver::doh_capable(IpAddr::V4(Ipv4Addr::new(1, 0, 0, 1))),
    ]
}

/// Google public DNS, DoH capable.
pub fn google() -> Vec<Nameserver> {
    vec![
        Nameserver::doh_capable(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))),
        Nameserver::doh_capable(IpAddr::V4(Ipv4Addr::new(8, 8, 4, 4))),
    ]
}

/// The root nameservers, a through m, for iterative resolution
/// without any local configuration.
pub fn root_hints() -> Vec<Nameserver> {
    const V4: [Ipv4Addr; 13] = [
        Ipv4Addr::new(198, 41, 0, 4),
        Ipv4Addr::new(170, 247, 170, 2),
        Ipv4Addr::new(192, 33, 4, 12),
        Ipv4Addr::new(199, 7, 91, 13),
        Ipv4Addr::new(192, 203, 230, 10),
        Ipv4Addr::new(192, 5, 5, 241),
        Ipv4Addr::new(192, 112, 36, 4),
        Ipv4Addr::new(198, 97, 190, 53),
        Ipv4Addr::new(192, 36, 148, 17),
        Ipv4Addr::new(192, 58, 128, 30),
        Ipv4Addr::new(193, 0, 14, 129),
        Ipv4Addr::new(199, 7, 83, 42),
        Ipv4Addr::new(202, 12, 27, 33),
    ];

    V4.into_iter()
        .map(|address| Nameserver::new(IpAddr::V4(address)))
        .collect()
}

/// Build a nameserver set from parsed hints records, taking the
/// address records and ignoring everything else.
pub fn from_hints(records: &[ResourceRecord]) -> Vec<Nameserver> {
    let mut nameservers = Vec::new();
    for record in records {
        let address = match &record.rtype_with_data {
            RecordTypeWithData::A { address } => IpAddr::V4(*address),
            RecordTypeWithData::AAAA { address } => IpAddr::V6(*address),
            _ => continue,
        };
        let nameserver = Nameserver::new(address);
        if !nameservers.contains(&nameserver) {
            nameservers.push(nameserver);
        }
    }
    nameservers
}

/// The system's configured resolvers, from `/etc/resolv.conf`, with
/// the first search suffix attached for short-name completion.  Falls
/// back to the root hints when nothing is configured, so a resolver
/// always has somewhere to start.
pub fn system() -> Vec<Nameserver> {
    match std::fs::read_to_string("/etc/resolv.conf") {
        Ok(text) => {
            let nameservers = parse_resolv_conf(&text);
            if nameservers.is_empty() {
                tracing::debug!("no system nameservers found, using root hints");
                root_hints()
            } else {
                nameservers
            }
        }
        Err(error) => {
            tracing::debug!(?error, "could not read resolver configuration");
            root_hints()
        }
    }
}

/// Read a hints file from disk and build a nameserver set from it.
pub async fn from_hints_file(path: &Path) -> Option<Vec<Nameserver>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => match beacon_types::hints::parse_hints(&text) {
            Ok(records) => Some(from_hints(&records)),
            Err(error) => {
                tracing::warn!(?path, %error, "could not parse hints file");
                None
            }
        },
        Err(error) => {
            tracing::warn!(?path, ?error, "could not read hints file");
            None
        }
    }
}

fn parse_resolv_conf(text: &str) -> Vec<Nameserver> {
    let mut addresses = Vec::new();
    let mut suffix = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        let mut columns = line.split_whitespace();
        match columns.next() {
            Some("nameserver") => {
                if let Some(address) = columns.next().and_then(|c| c.parse::<IpAddr>().ok()) {
                    if !addresses.contains(&address) {
                        addresses.push(address);
                    }
                }
            }
            Some("search" | "domain") => {
                if suffix.is_none() {
                    suffix = columns.next().and_then(DomainName::parse);
                }
            }
            _ => (),
        }
    }

    addresses
        .into_iter()
        .map(|address| Nameserver {
            address,
            doh: DohSupport::Unknown,
            search_suffix: suffix.clone(),
        })
        .collect()
}

/// Whether this address belongs to a private, link-local, or loopback
/// range: the only ranges a private-namespace question may be sent
/// to.
pub fn is_private_address(address: IpAddr) -> bool {
    match address {
        IpAddr::V4(ip) => {
            let [a, b, _, _] = ip.octets();
            ip.is_loopback()
                || a == 10
                || (a == 172 && (16..=31).contains(&b))
                || (a == 192 && b == 168)
                || (a == 169 && b == 254)
        }
        IpAddr::V6(ip) => {
            let segments = ip.segments();
            ip.is_loopback()
                || segments[0] & 0xfe00 == 0xfc00 // unique local, fc00::/7
                || segments[0] & 0xffc0 == 0xfec0 // site local, fec0::/10
                || segments[0] & 0xffc0 == 0xfe80 // link local, fe80::/10
        }
    }
}

#[cfg(test)]
mod tests {
    use beacon_types::protocol::types::test_util::*;

    use super::*;

    #[test]
    fn presets_are_doh_capable() {
        assert!(cloudflare().iter().all(|ns| ns.doh == DohSupport::Yes));
        assert!(google().iter().all(|ns| ns.doh == DohSupport::Yes));
        assert_eq!(
            IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)),
            cloudflare()[0].address
        );
        assert_eq!(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), google()[0].address);
    }

    #[test]
    fn root_hints_cover_all_thirteen() {
        let roots = root_hints();
        assert_eq!(13, roots.len());
        assert!(roots.iter().all(|ns| ns.doh == DohSupport::Unknown));
    }

    #[test]
    fn from_hints_takes_addresses() {
        let records = [
            ns_record(".", "a.root-servers.net."),
            a_record("a.root-servers.net.", Ipv4Addr::new(198, 41, 0, 4)),
            aaaa_record("a.root-servers.net.", "2001:503:ba3e::2:30".parse().unwrap()),
        ];

        let nameservers = from_hints(&records);
        assert_eq!(2, nameservers.len());
        assert_eq!(IpAddr::V4(Ipv4Addr::new(198, 41, 0, 4)), nameservers[0].address);
    }

    #[test]
    fn parse_resolv_conf_lines() {
        let text = "
# local resolver
nameserver 192.168.1.1
nameserver 192.168.1.1
nameserver fd00::1
search lan.example invalid..
";
        let nameservers = parse_resolv_conf(text);
        assert_eq!(2, nameservers.len());
        assert_eq!(
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)),
            nameservers[0].address
        );
        assert_eq!(
            Some(domain("lan.example.")),
            nameservers[0].search_suffix
        );
    }

    #[test]
    fn private_ranges_v4() {
        for private in [
            "127.0.0.1",
            "10.0.0.1",
            "172.16.0.1",
            "172.31.255.255",
            "192.168.1.1",
            "169.254.10.10",
        ] {
            assert!(
                is_private_address(private.parse().unwrap()),
                "{private} should be private"
            );
        }

        for public in ["8.8.8.8", "1.1.1.1", "172.32.0.1", "192.169.0.1"] {
            assert!(
                !is_private_address(public.parse().unwrap()),
                "{public} should be public"
            );
        }
    }

    #[test]
    fn private_ranges_v6() {
        for private in ["::1", "fd00::1", "fc00::1", "fe80::1", "fec0::1"] {
            assert!(
                is_private_address(private.parse().unwrap()),
                "{private} should be private"
            );
        }

        for public in ["2001:4860:4860::8888", "2606:4700:4700::1111"] {
            assert!(
                !is_private_address(public.parse().unwrap()),
                "{public} should be public"
            );
        }
    }
}
