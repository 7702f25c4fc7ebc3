//! SSDP M-SEARCH request and response handling

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddrV4};

/// SSDP multicast group
pub const SSDP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
/// SSDP port, used both as destination and as local bind port
pub const SSDP_PORT: u16 = 1900;
/// Search target answered by SAT>IP servers
pub const SATIP_SEARCH_TARGET: &str = "urn:ses-com:device:SatIPServer:1";
/// Default maximum response delay hint in seconds
pub const DEFAULT_MX: u8 = 1;
/// Default `USER-AGENT` header value
pub const DEFAULT_USER_AGENT: &str = "satip-detect";

/// Header carrying the descriptor URL in a search response
const LOCATION_HEADER: &str = "LOCATION:";

/// An SSDP M-SEARCH request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Multicast destination of the request
    pub destination: SocketAddrV4,
    /// Maximum response delay hint in seconds
    pub mx: u8,
    /// `ST` header
    pub search_target: String,
    /// `USER-AGENT` header
    pub user_agent: String,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            destination: SocketAddrV4::new(SSDP_MULTICAST_ADDR, SSDP_PORT),
            mx: DEFAULT_MX,
            search_target: SATIP_SEARCH_TARGET.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl SearchRequest {
    /// Render the request as a datagram, terminated by an empty line
    pub fn to_bytes(&self) -> Vec<u8> {
        [
            "M-SEARCH * HTTP/1.1".to_string(),
            format!("HOST: {}", self.destination),
            "MAN: \"ssdp:discover\"".to_string(),
            format!("MX: {}", self.mx),
            format!("ST: {}", self.search_target),
            format!("USER-AGENT: {}", self.user_agent),
            String::new(),
            String::new(),
        ]
        .join("\r\n")
        .into_bytes()
    }
}

/// Extract every `LOCATION` URL from a search response, in line order
pub fn extract_locations(datagram: &str) -> Vec<String> {
    datagram
        .split("\r\n")
        .filter(|line| line.contains(LOCATION_HEADER))
        .map(|line| line.replace(LOCATION_HEADER, "").trim().to_string())
        .filter(|url| !url.is_empty())
        .collect()
}
