//! Bitcoin peer addressing and advertised capabilities.

use bitcoin::p2p::address::AddrV2;
use bitcoin::p2p::ServiceFlags;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Minimum protocol version for basic compatibility with modern bitcoin nodes.
pub const MIN_PROTOCOL_VERSION: u32 = 70001;
/// Minimum protocol version that supports AddrV2 messages (BIP155).
///
/// Bitcoin Core implemented this in version 0.21.0 with protocol version 70016.
pub const ADDRV2_MIN_PROTOCOL_VERSION: u32 = 70016;

/// Represents the service state of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerServices {
    /// Known services with specific ServiceFlags.
    Known(ServiceFlags),
    /// Unknown services state.
    Unknown,
}

/// Represents the protocol version of a peer.
///
/// * **70001** - BIP 0031, absolute minimum for modern nodes.
/// * **70015** - BIP 0141/BIP 0143/BIP 0147, SegWit support.
/// * **70016** - BIP 0155, addrv2 messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerProtocolVersion {
    /// Known protocol version.
    Known(u32),
    /// Unknown protocol version.
    Unknown,
}

impl PeerProtocolVersion {
    /// Returns the protocol version value if known, or a default value if unknown.
    pub fn unwrap_or(self, default: u32) -> u32 {
        match self {
            PeerProtocolVersion::Known(v) => v,
            PeerProtocolVersion::Unknown => default,
        }
    }
}

impl fmt::Display for PeerProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerProtocolVersion::Known(v) => write!(f, "{v}"),
            PeerProtocolVersion::Unknown => write!(f, "unknown"),
        }
    }
}

/// Represents a bitcoin peer on the network.
///
/// Peers are either crawl targets handed in by a coordinator or entries of
/// an address list gossiped by another peer. Gossiped entries can carry any
/// BIP-155 address kind, only IP addresses can be dialed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Peer {
    /// The peer's network address.
    pub address: AddrV2,
    /// The port number the peer is listening on.
    pub port: u16,
    /// The service flags advertised by or for the peer.
    pub services: PeerServices,
    /// The protocol version of the peer.
    pub version: PeerProtocolVersion,
}

impl Peer {
    /// Create a new peer with unknown services and version.
    pub fn new(address: AddrV2, port: u16) -> Self {
        Peer {
            address,
            port,
            services: PeerServices::Unknown,
            version: PeerProtocolVersion::Unknown,
        }
    }

    /// Create a new peer with services learned from an address message.
    pub fn with_services(address: AddrV2, port: u16, services: ServiceFlags) -> Self {
        Peer {
            address,
            port,
            services: PeerServices::Known(services),
            version: PeerProtocolVersion::Unknown,
        }
    }

    /// Checks if the peer advertises the specified service.
    pub fn has_service(&self, service: ServiceFlags) -> bool {
        match self.services {
            PeerServices::Known(flags) => flags.has(service),
            PeerServices::Unknown => false,
        }
    }

    /// The socket address of the peer, if its address is an IP address.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match &self.address {
            AddrV2::Ipv4(ipv4) => Some(SocketAddr::new(IpAddr::V4(*ipv4), self.port)),
            AddrV2::Ipv6(ipv6) => Some(SocketAddr::new(IpAddr::V6(*ipv6), self.port)),
            _ => None,
        }
    }
}

impl From<SocketAddr> for Peer {
    fn from(socket_addr: SocketAddr) -> Self {
        let address = match socket_addr.ip() {
            IpAddr::V4(ipv4) => AddrV2::Ipv4(ipv4),
            IpAddr::V6(ipv6) => AddrV2::Ipv6(ipv6),
        };
        Peer::new(address, socket_addr.port())
    }
}

/// Formats as `host:port`, bracketing IPv6 hosts.
impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.socket_addr() {
            Some(socket_addr) => write!(f, "{socket_addr}"),
            None => write!(f, "{:?}:{}", self.address, self.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_display_joins_host_and_port() {
        let v4 = Peer::new(AddrV2::Ipv4(Ipv4Addr::new(203, 0, 113, 5)), 8333);
        assert_eq!(v4.to_string(), "203.0.113.5:8333");

        let v6 = Peer::new(AddrV2::Ipv6(Ipv6Addr::LOCALHOST), 18333);
        assert_eq!(v6.to_string(), "[::1]:18333");
    }

    #[test]
    fn test_socket_addr_requires_ip() {
        let tor = Peer::new(AddrV2::TorV3([7u8; 32]), 8333);
        assert!(tor.socket_addr().is_none());

        let socket: SocketAddr = "198.51.100.9:8333".parse().unwrap();
        assert_eq!(Peer::from(socket).socket_addr(), Some(socket));
    }

    #[test]
    fn test_has_service() {
        let peer = Peer::with_services(
            AddrV2::Ipv4(Ipv4Addr::LOCALHOST),
            8333,
            ServiceFlags::NETWORK | ServiceFlags::WITNESS,
        );
        assert!(peer.has_service(ServiceFlags::WITNESS));
        assert!(!peer.has_service(ServiceFlags::BLOOM));

        let unknown = Peer::new(AddrV2::Ipv4(Ipv4Addr::LOCALHOST), 8333);
        assert!(!unknown.has_service(ServiceFlags::NETWORK));
    }
}
