//! Bitcoin p2p protocol connection.
//!
//! Establishing a connection happens in two steps so callers can tell the
//! failures apart and put their own deadline on the handshake.
//!
//! 1. [`OutboundSession::new`] checks that the peer can be dialed at all.
//! 2. [`OutboundSession::connect`] dials TCP, bounded by the configured connection timeout.
//!
//! The returned [`Connection`] then runs the version handshake with
//! [`AsyncConnection::handshake`].
//!
//! # Examples
//!
//! ```no_run
//! use bitcoin::p2p::message::NetworkMessage;
//! use bitcoin::p2p::Magic;
//! use dnsseed_connection::{ConnectionConfiguration, OutboundSession, Peer, PeerProtocolVersion};
//! use std::net::SocketAddr;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let target: SocketAddr = "127.0.0.1:8333".parse()?;
//! let config = ConnectionConfiguration::non_listening(
//!     PeerProtocolVersion::Known(70016),
//!     Magic::BITCOIN,
//!     None,
//! );
//!
//! let session = OutboundSession::new(Peer::from(target), config)?;
//! let mut connection = session.connect().await?;
//! let version = connection.handshake().await?;
//! println!("Peer runs {}", version.user_agent);
//!
//! connection.send(NetworkMessage::GetAddr).await?;
//! let response = connection.receive().await?;
//! println!("Received: {response:?}");
//! connection.disconnect().await?;
//! # Ok(())
//! # }
//! ```

mod configuration;
mod error;
mod handshake;
mod io;

pub use configuration::{
    default_user_agent, ConnectionConfiguration, DEFAULT_CONNECTION_TIMEOUT,
    NON_LISTENING_ADDRESS, NON_LISTENING_PORT,
};
pub use error::ConnectionError;
pub use handshake::PeerVersion;
pub use io::AsyncConnection;

use crate::peer::Peer;
use crate::transport::Transport;
use log::debug;
use std::net::SocketAddr;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// A TCP-based connection to a bitcoin peer.
pub type Connection = AsyncConnection<OwnedReadHalf, OwnedWriteHalf>;

/// An outbound connection attempt which has not touched the network yet.
#[derive(Debug, Clone)]
pub struct OutboundSession {
    peer: Peer,
    socket_addr: SocketAddr,
    configuration: ConnectionConfiguration,
}

impl OutboundSession {
    /// Prepare a connection attempt to `peer`.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::UnsupportedAddressType`] if the peer's address is not
    /// an IP address (Tor, I2P and CJDNS peers can't be dialed directly).
    pub fn new(
        peer: Peer,
        configuration: ConnectionConfiguration,
    ) -> Result<Self, ConnectionError> {
        let socket_addr = peer
            .socket_addr()
            .ok_or(ConnectionError::UnsupportedAddressType)?;
        Ok(Self {
            peer,
            socket_addr,
            configuration,
        })
    }

    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    /// Dial the peer.
    ///
    /// No protocol messages are exchanged, the handshake is left to the caller.
    pub async fn connect(self) -> Result<Connection, ConnectionError> {
        let stream = match tokio::time::timeout(
            self.configuration.connection_timeout,
            TcpStream::connect(self.socket_addr),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(ConnectionError::Io(e)),
            Err(_) => return Err(ConnectionError::Timeout),
        };
        // No delay is helpful for the small packets of the bitcoin p2p protocol.
        stream.set_nodelay(true)?;
        debug!("Connected to {}", self.peer);

        let (reader, writer) = stream.into_split();
        let transport = Transport::new(self.configuration.magic, reader, writer);
        Ok(AsyncConnection::new(self.peer, self.configuration, transport))
    }
}
