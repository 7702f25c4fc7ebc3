//! Device types for discovered SAT>IP servers

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// Tuner counts keyed by delivery system identifier (e.g. "DVBS2")
pub type FrontendCapabilities = BTreeMap<String, u32>;

/// A local network interface with a usable IPv4 address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    /// Interface name as reported by the OS (e.g. "eth0")
    pub name: String,
    /// IPv4 address bound to the interface
    pub ip: Ipv4Addr,
}

impl NetworkInterface {
    pub fn new(name: impl Into<String>, ip: Ipv4Addr) -> Self {
        Self {
            name: name.into(),
            ip,
        }
    }
}

impl std::fmt::Display for NetworkInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.ip)
    }
}

/// A SAT>IP server found during one discovery run.
///
/// Fields are declared in alphabetical order so the serialized object has
/// sorted keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// IPv4 address of the local interface the advertisement arrived on
    pub detected_via_host_ip: Ipv4Addr,
    /// Tuner counts per delivery system
    pub frontends: FrontendCapabilities,
    /// Human-readable friendly name from the descriptor
    pub name: String,
    /// Descriptor location advertised by the device
    pub url: String,
}

impl DeviceRecord {
    /// Create a record with no name and no frontends
    pub fn empty(url: impl Into<String>, detected_via_host_ip: Ipv4Addr) -> Self {
        Self {
            detected_via_host_ip,
            frontends: FrontendCapabilities::new(),
            name: String::new(),
            url: url.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_record() {
        let record = DeviceRecord::empty("http://10.0.0.9/desc.xml", Ipv4Addr::new(10, 0, 0, 5));
        assert!(record.name.is_empty());
        assert!(record.frontends.is_empty());
    }

    #[test]
    fn test_serialized_keys_are_sorted() {
        let mut record = DeviceRecord::empty("http://10.0.0.9/desc.xml", Ipv4Addr::new(10, 0, 0, 5));
        record.name = "TunerBox".to_string();
        record.frontends.insert("DVBT".to_string(), 2);
        record.frontends.insert("DVBS2".to_string(), 4);

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"detected_via_host_ip":"10.0.0.5","frontends":{"DVBS2":4,"DVBT":2},"name":"TunerBox","url":"http://10.0.0.9/desc.xml"}"#
        );
    }

    #[test]
    fn test_interface_display() {
        let iface = NetworkInterface::new("eth0", Ipv4Addr::new(192, 168, 1, 10));
        assert_eq!(iface.to_string(), "eth0 (192.168.1.10)");
    }
}
