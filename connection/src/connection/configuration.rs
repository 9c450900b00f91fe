//! Connection configuration types and constants.

use crate::peer::PeerProtocolVersion;
use crate::user_agent::UserAgent;
use bitcoin::p2p::address::AddrV2;
use bitcoin::p2p::{Magic, ServiceFlags};
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Default user agent advertised by dnsseed connections.
pub fn default_user_agent() -> UserAgent {
    UserAgent::from_name_version("dnsseed", env!("CARGO_PKG_VERSION"))
}

/// Non-listening address used in version messages.
///
/// This address signals to peers that we are not accepting incoming connections
/// and should not be advertised to other nodes.
pub const NON_LISTENING_ADDRESS: AddrV2 = AddrV2::Ipv4(Ipv4Addr::new(0, 0, 0, 0));
pub const NON_LISTENING_PORT: u16 = 0;

/// Default timeout for the transport dial.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration used to build a connection.
///
/// The network is carried as its [`Magic`] so every connection states which
/// network it speaks instead of consulting shared chain parameters.
#[derive(Debug, Clone)]
pub struct ConnectionConfiguration {
    /// Network magic framing every message.
    pub magic: Magic,
    /// Protocol version advertised in the version message.
    pub protocol_version: PeerProtocolVersion,
    /// Custom user agent advertised for connection. Defaults to [`default_user_agent`] if None.
    pub user_agent: Option<UserAgent>,
    /// Service flags advertised by this node.
    pub services: ServiceFlags,
    /// Address advertised as the sender in version messages.
    pub sender_address: AddrV2,
    /// Port for the sender address.
    pub sender_port: u16,
    /// Block height advertised in version messages.
    pub start_height: i32,
    /// Whether to relay transactions to this peer.
    pub relay: bool,
    /// Whether to signal `sendaddrv2` (BIP-155) during the handshake.
    pub enable_addrv2: bool,
    /// Timeout for the transport dial.
    pub connection_timeout: Duration,
}

impl ConnectionConfiguration {
    /// Creates a new configuration for a non-listening node.
    ///
    /// Advertises no services, a non-listening address, a zero start height and
    /// no transaction relay. Suitable for crawlers that only query peers.
    ///
    /// # Arguments
    ///
    /// * `protocol_version` - The protocol version to advertise. Defaults to
    ///   [`MIN_PROTOCOL_VERSION`](crate::MIN_PROTOCOL_VERSION) if Unknown.
    /// * `magic` - Network magic of the network to crawl.
    /// * `user_agent` - Optional custom user agent.
    pub fn non_listening(
        protocol_version: PeerProtocolVersion,
        magic: Magic,
        user_agent: Option<UserAgent>,
    ) -> Self {
        Self {
            magic,
            protocol_version,
            user_agent,
            services: ServiceFlags::NONE,
            sender_address: NON_LISTENING_ADDRESS,
            sender_port: NON_LISTENING_PORT,
            start_height: 0,
            relay: false,
            enable_addrv2: true,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }

    /// Set the timeout for the transport dial.
    ///
    /// # Example
    ///
    /// ```
    /// use bitcoin::p2p::Magic;
    /// use dnsseed_connection::{ConnectionConfiguration, PeerProtocolVersion};
    /// use std::time::Duration;
    ///
    /// let config = ConnectionConfiguration::non_listening(
    ///     PeerProtocolVersion::Known(70015),
    ///     Magic::BITCOIN,
    ///     None,
    /// )
    /// .with_connection_timeout(Duration::from_secs(3));
    /// assert_eq!(config.connection_timeout, Duration::from_secs(3));
    /// ```
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Enable or disable `sendaddrv2` signaling.
    pub fn with_addrv2(mut self, enable: bool) -> Self {
        self.enable_addrv2 = enable;
        self
    }

    /// The user agent placed in the version message.
    pub fn advertised_user_agent(&self) -> UserAgent {
        self.user_agent.clone().unwrap_or_else(default_user_agent)
    }
}

impl fmt::Display for ConnectionConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            concat!(
                "ConnectionConfiguration {{ magic: {}, protocol: {}, user_agent: \"{}\", ",
                "services: {}, addrv2: {}, relay: {} }}"
            ),
            self.magic,
            self.protocol_version,
            self.advertised_user_agent(),
            self.services,
            self.enable_addrv2,
            self.relay
        )
    }
}
