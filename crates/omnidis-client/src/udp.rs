use crate::error::TransportError;
use crate::transport::Transport;
use async_trait::async_trait;
use bytes::Bytes;
use omnidis_core::config::NetworkConfig;
use omnidis_core::ConfigError;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// Maximum UDP payload without IP fragmentation (1500 MTU - 20 IP - 8 UDP)
const MAX_UDP_PACKET_SIZE: usize = 1472;

/// Configuration of the UDP transport
#[derive(Debug, Clone)]
pub struct UdpTransportConfig {
    /// Multicast group, broadcast or unicast destination
    pub destination: SocketAddr,
    /// Local bind address (port 0 = ephemeral)
    pub local_addr: SocketAddr,
    /// Interface used for outgoing multicast and group membership
    pub interface: Ipv4Addr,
    /// Multicast TTL
    pub multicast_ttl: u32,
    /// Deliver our own multicast datagrams to local listeners
    pub multicast_loop: bool,
    /// Upper bound on a single send
    pub write_timeout: Duration,
    /// Socket send buffer size (None = OS default)
    pub send_buffer_size: Option<usize>,
}

impl Default for UdpTransportConfig {
    fn default() -> Self {
        Self::from_network(&NetworkConfig::default()).unwrap_or_else(|_| Self {
            destination: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(239, 239, 239, 239)), 20000),
            local_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            interface: Ipv4Addr::UNSPECIFIED,
            multicast_ttl: 1,
            multicast_loop: true,
            write_timeout: Duration::from_secs(1),
            send_buffer_size: None,
        })
    }
}

impl UdpTransportConfig {
    /// Builds the transport configuration from the `network` section.
    pub fn from_network(network: &NetworkConfig) -> Result<Self, ConfigError> {
        let interface = network.interface_addr()?;

        Ok(Self {
            destination: SocketAddr::new(network.group_addr()?, network.port),
            local_addr: SocketAddr::new(IpAddr::V4(interface), 0),
            interface,
            multicast_ttl: network.ttl,
            multicast_loop: network.loopback,
            write_timeout: Duration::from_secs(1),
            send_buffer_size: None,
        })
    }
}

/// Connectionless UDP transport for multicast, broadcast or unicast DIS.
///
/// The socket is bound and configured once in [`UdpTransport::bind`]; every
/// [`Transport::send`] is a single `send_to`.
#[derive(Debug)]
pub struct UdpTransport {
    config: UdpTransportConfig,
    socket: UdpSocket,
    /// Set while this socket holds multicast group membership
    joined: AtomicBool,
}

impl UdpTransport {
    /// Binds and configures the socket.
    #[instrument(skip(config), fields(destination = %config.destination))]
    pub async fn bind(config: UdpTransportConfig) -> Result<Self, TransportError> {
        let local_addr = config.local_addr;
        info!("Binding UDP socket to {}", local_addr);

        let socket2 = socket2::Socket::new(
            if local_addr.is_ipv4() {
                socket2::Domain::IPV4
            } else {
                socket2::Domain::IPV6
            },
            socket2::Type::DGRAM,
            Some(socket2::Protocol::UDP),
        )?;

        socket2.set_reuse_address(true)?;

        // Best-effort, the OS may clamp the value
        if let Some(size) = config.send_buffer_size {
            let _ = socket2.set_send_buffer_size(size);
        }

        match config.destination.ip() {
            IpAddr::V4(group) if group.is_multicast() => {
                socket2.set_multicast_if_v4(&config.interface)?;
                socket2.set_multicast_ttl_v4(config.multicast_ttl)?;
                socket2.set_multicast_loop_v4(config.multicast_loop)?;
            }
            IpAddr::V4(_) => {
                // Directed broadcast addresses cannot be told apart from
                // unicast without the netmask
                socket2.set_broadcast(true)?;
            }
            IpAddr::V6(group) if group.is_multicast() => {
                socket2.set_multicast_loop_v6(config.multicast_loop)?;
            }
            IpAddr::V6(_) => {}
        }

        socket2.set_nonblocking(true)?;
        socket2.bind(&local_addr.into())?;

        let socket = UdpSocket::from_std(socket2.into())?;

        let joined = match config.destination.ip() {
            IpAddr::V4(group) if group.is_multicast() => {
                match socket.join_multicast_v4(group, config.interface) {
                    Ok(()) => {
                        info!("Joined IPv4 multicast group {}", group);
                        true
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            "Failed to join multicast group {}; sending without membership",
                            group
                        );
                        false
                    }
                }
            }
            _ => false,
        };

        info!(
            "UDP transport bound to {} (destination: {})",
            socket.local_addr()?,
            config.destination
        );

        Ok(Self {
            config,
            socket,
            joined: AtomicBool::new(joined),
        })
    }

    pub fn destination(&self) -> SocketAddr {
        self.config.destination
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    /// Whether the socket currently holds multicast group membership.
    pub fn is_member(&self) -> bool {
        self.joined.load(Ordering::Acquire)
    }

    /// Leaves the multicast group joined in [`UdpTransport::bind`].
    ///
    /// A no-op when no group was joined or it was already left.
    pub fn leave(&self) -> Result<(), TransportError> {
        if !self.joined.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let IpAddr::V4(group) = self.config.destination.ip() else {
            return Ok(());
        };
        self.socket.leave_multicast_v4(group, self.config.interface)?;
        debug!("Left multicast group {}", group);
        Ok(())
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&self, pdu: Bytes) -> Result<(), TransportError> {
        if pdu.len() > MAX_UDP_PACKET_SIZE {
            warn!(
                size = pdu.len(),
                max_size = MAX_UDP_PACKET_SIZE,
                "UDP packet exceeds recommended size, may be fragmented or dropped"
            );
        }

        let sent = timeout(
            self.config.write_timeout,
            self.socket.send_to(&pdu, self.config.destination),
        )
        .await
        .map_err(|_| TransportError::Timeout {
            timeout_ms: self.config.write_timeout.as_millis() as u64,
        })??;

        if sent != pdu.len() {
            return Err(TransportError::PartialSend {
                expected: pdu.len(),
                actual: sent,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_packet_size() {
        assert!(MAX_UDP_PACKET_SIZE <= 1500);
        assert!(MAX_UDP_PACKET_SIZE >= 144);
    }

    #[test]
    fn test_config_from_network() {
        let network = NetworkConfig {
            group: "224.10.10.10".to_string(),
            port: 9999,
            ttl: 4,
            loopback: false,
            ..Default::default()
        };

        let config = UdpTransportConfig::from_network(&network).unwrap();
        assert_eq!(config.destination, "224.10.10.10:9999".parse().unwrap());
        assert_eq!(config.multicast_ttl, 4);
        assert!(!config.multicast_loop);
        assert_eq!(config.local_addr.port(), 0);
    }

    #[test]
    fn test_default_destination() {
        let config = UdpTransportConfig::default();
        assert_eq!(config.destination, "239.239.239.239:20000".parse().unwrap());
    }

    #[tokio::test]
    async fn test_unicast_send() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let config = UdpTransportConfig {
            destination: receiver.local_addr().unwrap(),
            local_addr: "127.0.0.1:0".parse().unwrap(),
            interface: Ipv4Addr::LOCALHOST,
            ..Default::default()
        };
        let transport = UdpTransport::bind(config).await.unwrap();

        transport
            .send(Bytes::from_static(&[6, 1, 1, 1]))
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let (len, from) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &[6, 1, 1, 1]);
        assert_eq!(from, transport.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_leave_without_membership() {
        let config = UdpTransportConfig {
            destination: "127.0.0.1:20000".parse().unwrap(),
            local_addr: "127.0.0.1:0".parse().unwrap(),
            interface: Ipv4Addr::LOCALHOST,
            ..Default::default()
        };
        let transport = UdpTransport::bind(config).await.unwrap();

        assert!(!transport.is_member());
        assert!(transport.leave().is_ok());
    }

    #[tokio::test]
    async fn test_leave_releases_membership_once() {
        let config = UdpTransportConfig {
            local_addr: "0.0.0.0:0".parse().unwrap(),
            ..Default::default()
        };
        let transport = UdpTransport::bind(config).await.unwrap();

        // Hosts without a multicast route never join; both paths end unjoined
        if transport.is_member() {
            transport.leave().unwrap();
        }
        assert!(!transport.is_member());
        assert!(transport.leave().is_ok());
    }
}
