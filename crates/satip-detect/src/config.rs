//! Configuration loading

use anyhow::{Context, Result};
use satip_discovery::scanner::{DeviceErrorPolicy, ScannerConfig};
use satip_discovery::ssdp::{
    DEFAULT_MX, DEFAULT_USER_AGENT, SATIP_SEARCH_TARGET, SSDP_MULTICAST_ADDR, SSDP_PORT,
};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// SSDP multicast group
    #[serde(default = "default_multicast_address")]
    pub multicast_address: Ipv4Addr,
    /// SSDP port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Search target sent in the `ST` header
    #[serde(default = "default_search_target")]
    pub search_target: String,
    /// `USER-AGENT` of the search request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Maximum response delay hint in seconds
    #[serde(default = "default_mx")]
    pub mx: u8,
    /// Idle receive timeout per interface in milliseconds
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,
    /// Descriptor fetch timeout in milliseconds
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    /// Interfaces to search on (empty = all)
    #[serde(default)]
    pub interfaces: Vec<String>,
    /// Abort the run on the first device that cannot be described
    #[serde(default)]
    pub strict: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            multicast_address: default_multicast_address(),
            port: default_port(),
            search_target: default_search_target(),
            user_agent: default_user_agent(),
            mx: default_mx(),
            receive_timeout_ms: default_receive_timeout_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            interfaces: Vec::new(),
            strict: false,
        }
    }
}

fn default_multicast_address() -> Ipv4Addr {
    SSDP_MULTICAST_ADDR
}

fn default_port() -> u16 {
    SSDP_PORT
}

fn default_search_target() -> String {
    SATIP_SEARCH_TARGET.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_mx() -> u8 {
    DEFAULT_MX
}

fn default_receive_timeout_ms() -> u64 {
    1000
}

fn default_fetch_timeout_ms() -> u64 {
    2000
}

impl Config {
    /// Convert to ScannerConfig
    pub fn to_scanner_config(&self) -> ScannerConfig {
        let d = &self.discovery;
        ScannerConfig {
            multicast_address: d.multicast_address,
            port: d.port,
            search_target: d.search_target.clone(),
            user_agent: d.user_agent.clone(),
            mx: d.mx,
            receive_timeout_ms: d.receive_timeout_ms,
            fetch_timeout_ms: d.fetch_timeout_ms,
            interfaces: d.interfaces.clone(),
            device_error_policy: if d.strict {
                DeviceErrorPolicy::Abort
            } else {
                DeviceErrorPolicy::Skip
            },
        }
    }
}

/// Load configuration from file, falling back to defaults if it does not exist
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}
