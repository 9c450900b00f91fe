//! Crawl targets and the result reported for each of them.

use crate::engine::Interrogation;
use crate::error::CrawlError;
use bitcoin::p2p::address::AddrV2;
use bitcoin::p2p::ServiceFlags;
use dnsseed_connection::Peer;
use std::fmt;
use std::net::SocketAddr;

/// The address a crawl task contacts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CrawlTarget {
    pub address: AddrV2,
    pub port: u16,
}

impl CrawlTarget {
    pub fn new(address: AddrV2, port: u16) -> Self {
        CrawlTarget { address, port }
    }

    pub(crate) fn peer(&self) -> Peer {
        Peer::new(self.address.clone(), self.port)
    }
}

impl From<SocketAddr> for CrawlTarget {
    fn from(socket_addr: SocketAddr) -> Self {
        let peer = Peer::from(socket_addr);
        CrawlTarget::new(peer.address, peer.port)
    }
}

/// Gossiped peers are fed back to the coordinator as new targets.
impl From<Peer> for CrawlTarget {
    fn from(peer: Peer) -> Self {
        CrawlTarget::new(peer.address, peer.port)
    }
}

/// Formats as `host:port`.
impl fmt::Display for CrawlTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.peer().fmt(f)
    }
}

/// Outcome of crawling one target.
///
/// `version`, `services`, `last_block` and `user_agent` are only filled in when
/// the handshake completed, they stay zero/empty otherwise. `addresses` is
/// empty unless the peer answered the address request in time.
#[derive(Debug)]
pub struct CrawlResult {
    /// The target as `host:port`.
    pub node: String,
    /// Protocol version the peer advertised.
    pub version: i32,
    /// Services the peer advertised.
    pub services: ServiceFlags,
    /// Best block height the peer advertised.
    pub last_block: i32,
    /// User agent the peer advertised.
    pub user_agent: String,
    /// Peers gossiped by the target, in the order received.
    pub addresses: Vec<Peer>,
    /// Set when the crawl failed before the handshake completed.
    pub error: Option<CrawlError>,
}

impl CrawlResult {
    /// An unpopulated result for `target`.
    pub fn new(target: &CrawlTarget) -> Self {
        CrawlResult {
            node: target.to_string(),
            version: 0,
            services: ServiceFlags::NONE,
            last_block: 0,
            user_agent: String::new(),
            addresses: Vec::new(),
            error: None,
        }
    }

    pub(crate) fn from_outcome(
        target: &CrawlTarget,
        outcome: Result<Interrogation, CrawlError>,
    ) -> Self {
        let mut result = CrawlResult::new(target);
        match outcome {
            Ok(interrogation) => {
                let version = interrogation.version;
                result.version = i32::try_from(version.version).unwrap_or(i32::MAX);
                result.services = version.services;
                result.last_block = version.start_height;
                result.user_agent = version.user_agent;
                result.addresses = interrogation.addresses;
            }
            Err(err) => result.error = Some(err),
        }
        result
    }

    /// True if the target completed the handshake.
    pub fn is_listening(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Display for CrawlResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(err) => write!(f, "{} failed: {err}", self.node),
            None => write!(
                f,
                "{} {} (version: {}, services: {}, height: {}), {} addresses",
                self.node,
                self.user_agent,
                self.version,
                self.services,
                self.last_block,
                self.addresses.len()
            ),
        }
    }
}
