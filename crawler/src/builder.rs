//! Builder pattern for configuring and creating crawler instances.

use crate::capacity::{CapacitySignal, PeerCountGauge};
use crate::crawler::Crawler;
use crate::engine::Timeouts;
use bitcoin::p2p::Magic;
use bitcoin::Network;
use dnsseed_connection::{
    ConnectionConfiguration, PeerProtocolVersion, UserAgent, UserAgentError,
    DEFAULT_CONNECTION_TIMEOUT,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default protocol version for crawler connections.
const DEFAULT_PROTOCOL_VERSION: PeerProtocolVersion = PeerProtocolVersion::Known(70016);

/// Errors that can occur during crawler configuration.
#[derive(Debug, Clone)]
pub enum CrawlerBuilderError {
    /// User agent doesn't follow the required format.
    InvalidUserAgent(UserAgentError),
}

impl fmt::Display for CrawlerBuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlerBuilderError::InvalidUserAgent(err) => {
                write!(f, "Invalid user agent: {err}")
            }
        }
    }
}

impl std::error::Error for CrawlerBuilderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CrawlerBuilderError::InvalidUserAgent(err) => Some(err),
        }
    }
}

/// Builder for creating a customized [`Crawler`] instance.
///
/// # Example
///
/// ```
/// # fn main() -> Result<(), dnsseed_crawler::CrawlerBuilderError> {
/// use bitcoin::Network;
/// use dnsseed_crawler::{CrawlerBuilder, PeerCountGauge};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// // Create a basic crawler for the Bitcoin mainnet
/// let basic_crawler = CrawlerBuilder::new(Network::Bitcoin).build();
/// assert_eq!(basic_crawler.handshake_timeout(), Duration::from_secs(5));
///
/// // Stop asking for addresses once the coordinator knows 1000 peers
/// let gauge = PeerCountGauge::new(1000);
/// let custom_crawler = CrawlerBuilder::new(Network::Testnet)
///     .with_user_agent("/my-seeder:1.0/")?
///     .with_protocol_version(70015)
///     .with_addr_timeout(Duration::from_secs(10))
///     .with_capacity(Arc::new(gauge.clone()))
///     .build();
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CrawlerBuilder {
    /// Network magic used to frame messages.
    magic: Magic,
    /// Custom user agent advertised for connection.
    user_agent: Option<UserAgent>,
    /// Protocol version to advertise in connections.
    protocol_version: PeerProtocolVersion,
    /// Handshake and address deadlines.
    timeouts: Timeouts,
    /// Deadline for the TCP dial.
    connection_timeout: Duration,
    /// Whether to announce `sendaddrv2` to peers that support it.
    addrv2: bool,
    /// The coordinator's peer count.
    capacity: Arc<dyn CapacitySignal>,
}

impl CrawlerBuilder {
    /// Create a new crawler builder for the specified network.
    ///
    /// # Arguments
    ///
    /// * `network` - The bitcoin network to crawl, determines the message magic.
    pub fn new(network: Network) -> Self {
        CrawlerBuilder {
            magic: network.magic(),
            user_agent: None,
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            timeouts: Timeouts::default(),
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            addrv2: true,
            capacity: Arc::new(PeerCountGauge::unbounded()),
        }
    }

    /// Set a custom user agent string for the crawler.
    ///
    /// The user agent identifies the crawler to other peers on the network.
    /// It must follow Bitcoin Core's convention: "/Name:Version/".
    ///
    /// # Returns
    ///
    /// * `Ok(Self)` - The builder for method chaining if validation succeeds.
    /// * `Err(CrawlerBuilderError)` - If the user agent format is invalid.
    pub fn with_user_agent<S: Into<String>>(
        mut self,
        user_agent: S,
    ) -> Result<Self, CrawlerBuilderError> {
        let user_agent =
            UserAgent::new(user_agent.into()).map_err(CrawlerBuilderError::InvalidUserAgent)?;
        self.user_agent = Some(user_agent);
        Ok(self)
    }

    /// Set the protocol version to advertise in connections.
    pub fn with_protocol_version(mut self, version: u32) -> Self {
        self.protocol_version = PeerProtocolVersion::Known(version);
        self
    }

    /// Override the network magic, e.g. for a custom signet.
    pub fn with_magic(mut self, magic: Magic) -> Self {
        self.magic = magic;
        self
    }

    /// Set how long a dialed peer has to complete the handshake (defaults to 5 seconds).
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.handshake = timeout;
        self
    }

    /// Set how long to wait for an address list after `getaddr` (defaults to 6 seconds).
    ///
    /// Peers that stay silent still count as listening, they just contribute no addresses.
    pub fn with_addr_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.addr = timeout;
        self
    }

    /// Set the TCP dial timeout (defaults to 10 seconds).
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Enable or disable `sendaddrv2` negotiation (enabled by default).
    pub fn with_addrv2(mut self, enable: bool) -> Self {
        self.addrv2 = enable;
        self
    }

    /// Share the coordinator's peer count with the crawler.
    ///
    /// Without one the crawler always asks for addresses.
    pub fn with_capacity(mut self, capacity: Arc<dyn CapacitySignal>) -> Self {
        self.capacity = capacity;
        self
    }

    /// Build the crawler with the configured options.
    pub fn build(self) -> Crawler {
        let configuration = ConnectionConfiguration::non_listening(
            self.protocol_version,
            self.magic,
            self.user_agent,
        )
        .with_connection_timeout(self.connection_timeout)
        .with_addrv2(self.addrv2);
        Crawler::new(configuration, self.timeouts, self.capacity)
    }
}
