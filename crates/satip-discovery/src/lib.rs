//! SAT>IP Discovery - SSDP discovery of SAT>IP servers
//!
//! One discovery pass walks every local IPv4 interface:
//! - an M-SEARCH request is multicast from a socket bound to the interface
//! - `LOCATION` headers of the answers are collected and deduplicated
//! - each new location's descriptor is fetched over HTTP and parsed

pub mod fetch;
pub mod interfaces;
pub mod scanner;
pub mod ssdp;
pub mod transport;

pub use fetch::{DescriptorFetcher, FetchError, HttpFetcher};
pub use interfaces::{filter_interfaces, list_interfaces, InterfaceSource, SystemInterfaces};
pub use scanner::{DeviceError, DeviceErrorPolicy, DiscoveryError, DiscoveryScanner, ScannerConfig};
pub use ssdp::{extract_locations, SearchRequest};
pub use transport::{SearchSession, SearchTransport, UdpSearchTransport};
