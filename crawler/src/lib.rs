//! Peer discovery crawl tasks for a bitcoin DNS seeder.
//!
//! A coordinator hands each candidate address to [`Crawler::spawn`] and drains
//! the results channel. Every task dials its target, completes the version
//! handshake, asks for the peer's address list and reports one
//! [`CrawlResult`], bounded by the handshake and address timeouts so that a
//! single misbehaving peer cannot stall the crawl.

mod builder;
mod capacity;
mod connection;
mod crawler;
mod engine;
mod error;
mod result;

pub use builder::{CrawlerBuilder, CrawlerBuilderError};
pub use capacity::{CapacitySignal, PeerCountGauge};
pub use crawler::Crawler;
pub use engine::{DEFAULT_ADDR_TIMEOUT, DEFAULT_HANDSHAKE_TIMEOUT};
pub use error::{CrawlError, CrawlErrorKind};
pub use result::{CrawlResult, CrawlTarget};

// Re-exports.
pub use dnsseed_connection::{
    ConnectionError, Peer, PeerProtocolVersion, PeerServices, PeerVersion, UserAgent,
};
