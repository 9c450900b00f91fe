//! Outbound bitcoin p2p connections for crawling a network.
//!
//! Covers dialing a peer, the version handshake and plaintext (v1) message
//! framing. Message encoding comes from the `bitcoin` crate.

mod connection;
mod peer;
mod transport;
mod user_agent;

pub use connection::{
    default_user_agent, AsyncConnection, Connection, ConnectionConfiguration, ConnectionError,
    OutboundSession, PeerVersion, DEFAULT_CONNECTION_TIMEOUT, NON_LISTENING_ADDRESS,
    NON_LISTENING_PORT,
};
pub use peer::{
    Peer, PeerProtocolVersion, PeerServices, ADDRV2_MIN_PROTOCOL_VERSION, MIN_PROTOCOL_VERSION,
};
pub use transport::{
    Transport, TransportError, TransportReader, TransportWriter, MAX_PAYLOAD_SIZE,
};
pub use user_agent::{UserAgent, UserAgentError};
