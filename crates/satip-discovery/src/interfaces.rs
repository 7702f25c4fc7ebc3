//! Local network interface enumeration

use network_interface::{Addr, NetworkInterface as SystemInterface, NetworkInterfaceConfig};
use satip_core::NetworkInterface;
use std::net::Ipv4Addr;
use tracing::{debug, warn};

/// Source of the interfaces a discovery pass walks through
pub trait InterfaceSource {
    fn interfaces(&self) -> Vec<NetworkInterface>;
}

/// Interfaces reported by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn interfaces(&self) -> Vec<NetworkInterface> {
        list_interfaces()
    }
}

impl InterfaceSource for Vec<NetworkInterface> {
    fn interfaces(&self) -> Vec<NetworkInterface> {
        self.clone()
    }
}

/// List local interfaces that have an IPv4 address bound.
///
/// Interfaces without IPv4 are skipped. Failing to query the system at all
/// yields an empty list.
pub fn list_interfaces() -> Vec<NetworkInterface> {
    let system = match SystemInterface::show() {
        Ok(system) => system,
        Err(e) => {
            warn!(error = %e, "Failed to enumerate network interfaces");
            return Vec::new();
        }
    };

    let interfaces = resolve_ipv4(
        system
            .iter()
            .map(|iface| (iface.name.as_str(), iface.addr.as_slice())),
    );
    debug!("Found {} interfaces with IPv4", interfaces.len());
    interfaces
}

/// Keep only interfaces named in `allow`; an empty allow-list keeps all
pub fn filter_interfaces(interfaces: Vec<NetworkInterface>, allow: &[String]) -> Vec<NetworkInterface> {
    if allow.is_empty() {
        return interfaces;
    }
    interfaces
        .into_iter()
        .filter(|iface| allow.iter().any(|name| *name == iface.name))
        .collect()
}

/// Pick the first IPv4 address of each interface, keeping system order.
///
/// Some platforms report an interface once per address, so entries are
/// merged by name before resolving.
fn resolve_ipv4<'a>(
    entries: impl IntoIterator<Item = (&'a str, &'a [Addr])>,
) -> Vec<NetworkInterface> {
    let mut merged: Vec<(&str, Option<Ipv4Addr>)> = Vec::new();

    for (name, addrs) in entries {
        let ip = addrs.iter().find_map(|addr| match addr {
            Addr::V4(v4) => Some(v4.ip),
            Addr::V6(_) => None,
        });
        match merged.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => {
                if existing.is_none() {
                    *existing = ip;
                }
            }
            None => merged.push((name, ip)),
        }
    }

    merged
        .into_iter()
        .filter_map(|(name, ip)| match ip {
            Some(ip) => Some(NetworkInterface::new(name, ip)),
            None => {
                warn!(interface = %name, "No IPv4 address bound, skipping interface");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use network_interface::{V4IfAddr, V6IfAddr};
    use std::net::Ipv6Addr;

    fn v4(ip: Ipv4Addr) -> Addr {
        Addr::V4(V4IfAddr {
            ip,
            broadcast: None,
            netmask: None,
        })
    }

    fn v6(ip: Ipv6Addr) -> Addr {
        Addr::V6(V6IfAddr {
            ip,
            broadcast: None,
            netmask: None,
        })
    }

    #[test]
    fn test_resolve_skips_interfaces_without_ipv4() {
        let lo = [v4(Ipv4Addr::LOCALHOST)];
        let wg = [v6(Ipv6Addr::LOCALHOST)];
        let eth = [v6(Ipv6Addr::LOCALHOST), v4(Ipv4Addr::new(10, 0, 0, 5))];
        let down: [Addr; 0] = [];

        let interfaces = resolve_ipv4([
            ("lo", &lo[..]),
            ("wg0", &wg[..]),
            ("eth0", &eth[..]),
            ("eth1", &down[..]),
        ]);

        assert_eq!(
            interfaces,
            vec![
                NetworkInterface::new("lo", Ipv4Addr::LOCALHOST),
                NetworkInterface::new("eth0", Ipv4Addr::new(10, 0, 0, 5)),
            ]
        );
    }

    #[test]
    fn test_resolve_merges_entries_per_address() {
        let first = [v6(Ipv6Addr::LOCALHOST)];
        let second = [v4(Ipv4Addr::new(192, 168, 1, 2))];
        let third = [v4(Ipv4Addr::new(192, 168, 1, 3))];

        let interfaces = resolve_ipv4([
            ("en0", &first[..]),
            ("en0", &second[..]),
            ("en0", &third[..]),
        ]);

        assert_eq!(
            interfaces,
            vec![NetworkInterface::new("en0", Ipv4Addr::new(192, 168, 1, 2))]
        );
    }

    #[test]
    fn test_filter_interfaces() {
        let all = vec![
            NetworkInterface::new("eth0", Ipv4Addr::new(10, 0, 0, 5)),
            NetworkInterface::new("eth1", Ipv4Addr::new(10, 1, 0, 5)),
        ];

        assert_eq!(filter_interfaces(all.clone(), &[]), all);
        assert_eq!(
            filter_interfaces(all, &["eth1".to_string()]),
            vec![NetworkInterface::new("eth1", Ipv4Addr::new(10, 1, 0, 5))]
        );
    }
}
