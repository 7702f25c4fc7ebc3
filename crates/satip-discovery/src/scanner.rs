//! Discovery scanner that walks all interfaces once

use satip_core::{parse_descriptor, DescriptorError, DeviceRecord, NetworkInterface};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::fetch::{DescriptorFetcher, FetchError, HttpFetcher};
use crate::interfaces::{filter_interfaces, InterfaceSource, SystemInterfaces};
use crate::ssdp::{
    extract_locations, SearchRequest, DEFAULT_MX, DEFAULT_USER_AGENT, SATIP_SEARCH_TARGET,
    SSDP_MULTICAST_ADDR, SSDP_PORT,
};
use crate::transport::{SearchSession, SearchTransport, UdpSearchTransport};

/// What to do when a device's descriptor cannot be fetched or parsed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceErrorPolicy {
    /// Log the failure and continue with the next device
    #[default]
    Skip,
    /// End the whole run with the failure
    Abort,
}

/// Scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// SSDP multicast group
    pub multicast_address: Ipv4Addr,
    /// SSDP port, used for the destination and the local bind
    pub port: u16,
    /// `ST` header of the search request
    pub search_target: String,
    /// `USER-AGENT` header of the search request
    pub user_agent: String,
    /// `MX` header of the search request
    pub mx: u8,
    /// Idle time after which an interface's search ends, in milliseconds
    pub receive_timeout_ms: u64,
    /// Descriptor fetch timeout in milliseconds
    pub fetch_timeout_ms: u64,
    /// Interface names to search on (empty = all)
    pub interfaces: Vec<String>,
    /// Handling of per-device failures
    pub device_error_policy: DeviceErrorPolicy,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            multicast_address: SSDP_MULTICAST_ADDR,
            port: SSDP_PORT,
            search_target: SATIP_SEARCH_TARGET.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            mx: DEFAULT_MX,
            receive_timeout_ms: 1000,
            fetch_timeout_ms: 2000,
            interfaces: Vec::new(),
            device_error_policy: DeviceErrorPolicy::Skip,
        }
    }
}

impl ScannerConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Build the M-SEARCH request sent on every interface
    pub fn search_request(&self) -> SearchRequest {
        SearchRequest {
            destination: SocketAddrV4::new(self.multicast_address, self.port),
            mx: self.mx,
            search_target: self.search_target.clone(),
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Failure to describe a single device
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Failed to search on {interface} ({ip}): {source}")]
    SocketSetup {
        interface: String,
        ip: Ipv4Addr,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to describe device at {url}: {source}")]
    Device {
        url: String,
        #[source]
        source: DeviceError,
    },
}

/// One-shot SAT>IP discovery over all local interfaces
pub struct DiscoveryScanner<I = SystemInterfaces, T = UdpSearchTransport, F = HttpFetcher> {
    config: ScannerConfig,
    interfaces: I,
    transport: T,
    fetcher: F,
}

impl DiscoveryScanner {
    /// Create a scanner using the system interfaces, UDP and HTTP
    pub fn new(config: ScannerConfig) -> Result<Self, FetchError> {
        let transport = UdpSearchTransport::new(config.receive_timeout());
        let fetcher = HttpFetcher::new(config.fetch_timeout())?;
        Ok(Self::with_parts(config, SystemInterfaces, transport, fetcher))
    }
}

impl<I, T, F> DiscoveryScanner<I, T, F>
where
    I: InterfaceSource,
    T: SearchTransport,
    F: DescriptorFetcher,
{
    /// Create a scanner from explicit interface, transport and fetch backends
    pub fn with_parts(config: ScannerConfig, interfaces: I, transport: T, fetcher: F) -> Self {
        Self {
            config,
            interfaces,
            transport,
            fetcher,
        }
    }

    /// Run a single discovery pass.
    ///
    /// Interfaces are searched one after another in enumeration order, and
    /// devices are returned in the order their locations were first seen.
    /// A location is fetched at most once per pass, whichever interface it
    /// shows up on. Interfaces that cannot be searched are skipped; device
    /// failures follow [`DeviceErrorPolicy`].
    pub async fn scan_once(&self) -> Result<Vec<DeviceRecord>, DiscoveryError> {
        let interfaces = filter_interfaces(self.interfaces.interfaces(), &self.config.interfaces);
        let request = self.config.search_request();

        info!(
            interfaces = interfaces.len(),
            target = %request.search_target,
            "Starting SAT>IP discovery"
        );

        let mut seen = HashSet::new();
        let mut devices = Vec::new();

        for interface in &interfaces {
            match self
                .scan_interface(interface, &request, &mut seen, &mut devices)
                .await
            {
                Ok(()) => {}
                Err(e @ DiscoveryError::SocketSetup { .. }) => {
                    warn!(error = %e, "Skipping interface");
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "Discovery complete: {} devices at {} locations",
            devices.len(),
            seen.len()
        );
        Ok(devices)
    }

    async fn scan_interface(
        &self,
        interface: &NetworkInterface,
        request: &SearchRequest,
        seen: &mut HashSet<String>,
        devices: &mut Vec<DeviceRecord>,
    ) -> Result<(), DiscoveryError> {
        debug!(interface = %interface.name, ip = %interface.ip, "Searching interface");

        let mut session = self
            .transport
            .start_search(interface, request)
            .await
            .map_err(|source| DiscoveryError::SocketSetup {
                interface: interface.name.clone(),
                ip: interface.ip,
                source,
            })?;

        while let Some(datagram) = session.next_response().await {
            let text = String::from_utf8_lossy(&datagram);

            for url in extract_locations(&text) {
                if !seen.insert(url.clone()) {
                    trace!(url = %url, "Location already seen");
                    continue;
                }

                match self.describe(&url, interface.ip).await {
                    Ok(device) => {
                        info!(
                            name = %device.name,
                            url = %device.url,
                            interface = %interface.name,
                            "Found SAT>IP server"
                        );
                        devices.push(device);
                    }
                    Err(source) => match self.config.device_error_policy {
                        DeviceErrorPolicy::Skip => {
                            warn!(url = %url, error = %source, "Skipping device");
                        }
                        DeviceErrorPolicy::Abort => {
                            return Err(DiscoveryError::Device { url, source });
                        }
                    },
                }
            }
        }

        Ok(())
    }

    async fn describe(&self, url: &str, host_ip: Ipv4Addr) -> Result<DeviceRecord, DeviceError> {
        let body = self.fetcher.fetch(url).await?;
        Ok(parse_descriptor(&body, url, host_ip)?)
    }
}
