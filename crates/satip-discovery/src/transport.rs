//! UDP transport for SSDP searches
//!
//! One socket is opened per interface, bound to the interface address on the
//! SSDP port. The socket lives as long as its [`SearchSession`] and is closed
//! when the session is dropped.

use satip_core::NetworkInterface;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::ssdp::SearchRequest;

/// Receive buffer size for search responses; longer datagrams are truncated
const RECV_BUFFER_SIZE: usize = 2048;

/// An in-progress search on one interface
#[allow(async_fn_in_trait)]
pub trait SearchSession {
    /// Next response datagram, or `None` once the interface went quiet
    async fn next_response(&mut self) -> Option<Vec<u8>>;
}

/// Opens search sessions on local interfaces
#[allow(async_fn_in_trait)]
pub trait SearchTransport {
    type Session: SearchSession;

    /// Bind to the interface and send the search request
    async fn start_search(
        &self,
        interface: &NetworkInterface,
        request: &SearchRequest,
    ) -> std::io::Result<Self::Session>;
}

/// SSDP over real UDP sockets
#[derive(Debug, Clone)]
pub struct UdpSearchTransport {
    receive_timeout: Duration,
}

impl UdpSearchTransport {
    /// Create a transport that ends a session after `receive_timeout` of silence
    pub fn new(receive_timeout: Duration) -> Self {
        Self { receive_timeout }
    }
}

impl SearchTransport for UdpSearchTransport {
    type Session = UdpSearchSession;

    async fn start_search(
        &self,
        interface: &NetworkInterface,
        request: &SearchRequest,
    ) -> std::io::Result<UdpSearchSession> {
        let std_socket = create_search_socket(interface.ip, request.destination.port())?;
        let socket = UdpSocket::from_std(std_socket)?;

        trace!(
            interface = %interface.name,
            destination = %request.destination,
            "Sending M-SEARCH"
        );
        socket
            .send_to(&request.to_bytes(), SocketAddr::V4(request.destination))
            .await?;

        Ok(UdpSearchSession {
            socket,
            receive_timeout: self.receive_timeout,
            buf: vec![0u8; RECV_BUFFER_SIZE],
        })
    }
}

/// Search session backed by a bound UDP socket
pub struct UdpSearchSession {
    socket: UdpSocket,
    receive_timeout: Duration,
    buf: Vec<u8>,
}

impl SearchSession for UdpSearchSession {
    async fn next_response(&mut self) -> Option<Vec<u8>> {
        match timeout(self.receive_timeout, self.socket.recv_from(&mut self.buf)).await {
            Ok(Ok((0, _))) => None,
            Ok(Ok((len, from))) => {
                if len == self.buf.len() {
                    debug!(from = %from, len = len, "Search response filled the receive buffer, trailing headers may be lost");
                }
                trace!(from = %from, len = len, "Received search response");
                Some(self.buf[..len].to_vec())
            }
            Ok(Err(e)) => {
                debug!(error = %e, "Search receive failed");
                None
            }
            Err(_) => {
                trace!("Search receive timed out");
                None
            }
        }
    }
}

/// Create a non-blocking UDP socket bound to `ip:port` for multicast search.
///
/// `SO_REUSEPORT` lets the search coexist with other SSDP listeners on the
/// host. It is not available everywhere, so failing to set it is ignored.
pub fn create_search_socket(ip: Ipv4Addr, port: u16) -> std::io::Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

    socket.set_broadcast(true)?;
    socket.set_reuse_address(true)?;

    #[cfg(unix)]
    {
        if let Err(e) = socket.set_reuse_port(true) {
            trace!(error = %e, "SO_REUSEPORT unsupported, continuing without it");
        }
    }

    socket.set_multicast_if_v4(&ip)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddrV4::new(ip, port).into())?;

    Ok(socket.into())
}
