//! I/O layer for connection handling.
//!
//! [`AsyncConnection`] works with any `AsyncRead`/`AsyncWrite` pair, delegating
//! message framing to the transport layer.

use super::configuration::ConnectionConfiguration;
use super::error::ConnectionError;
use crate::peer::Peer;
use crate::transport::{Transport, TransportReader, TransportWriter};
use bitcoin::p2p::message::NetworkMessage;
use log::debug;
use tokio::io::{AsyncRead, AsyncWrite};

/// A connection to a bitcoin peer.
///
/// The connection exclusively owns its reader and writer. Dropping it closes
/// the underlying I/O resources, [`AsyncConnection::disconnect`] additionally
/// shuts the write side down so the peer sees an orderly close.
///
/// # Trait Bounds
///
/// * [`AsyncRead`]/[`AsyncWrite`] - Required for async I/O operations.
/// * [`Unpin`] - Required because uses `&mut self` with `.await`.
/// * [`Send`] - Allows the connection to move between tasks.
#[derive(Debug)]
pub struct AsyncConnection<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Configuration to build the connection.
    pub(super) configuration: ConnectionConfiguration,
    /// The peer this connection is established with.
    pub(super) peer: Peer,
    reader: TransportReader<R>,
    writer: TransportWriter<W>,
}

impl<R, W> std::fmt::Display for AsyncConnection<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "V1 connection to {} (version: {})",
            self.peer, self.peer.version
        )
    }
}

impl<R, W> AsyncConnection<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Creates a new connection over an established transport.
    pub fn new(
        peer: Peer,
        configuration: ConnectionConfiguration,
        transport: Transport<R, W>,
    ) -> Self {
        let (reader, writer) = transport.into_split();
        Self {
            configuration,
            peer,
            reader,
            writer,
        }
    }

    /// The peer this connection is established with.
    ///
    /// Services and version are filled in once the handshake saw the peer's version.
    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    pub fn configuration(&self) -> &ConnectionConfiguration {
        &self.configuration
    }

    /// Send a message to the peer.
    pub async fn send(&mut self, message: NetworkMessage) -> Result<(), ConnectionError> {
        self.writer
            .write(message)
            .await
            .map_err(ConnectionError::TransportFailed)
    }

    /// Receive a message from the peer.
    ///
    /// Pings are answered with a pong before the ping is handed to the caller.
    ///
    /// # Cancellation Safety
    ///
    /// Safe to race against a timer. A partially read message is resumed by the
    /// next call, but a pong interrupted mid-write may be lost.
    pub async fn receive(&mut self) -> Result<NetworkMessage, ConnectionError> {
        let message = self
            .reader
            .read()
            .await
            .map_err(ConnectionError::TransportFailed)?;

        if let NetworkMessage::Ping(nonce) = message {
            debug!("Answering ping from {}", self.peer);
            self.send(NetworkMessage::Pong(nonce)).await?;
        }

        Ok(message)
    }

    /// Shut down the connection and release it.
    pub async fn disconnect(mut self) -> Result<(), ConnectionError> {
        debug!("Disconnecting from {}", self.peer);
        self.writer
            .shutdown()
            .await
            .map_err(ConnectionError::TransportFailed)
    }
}

#[cfg(test)]
impl<R> AsyncConnection<R, Vec<u8>>
where
    R: AsyncRead + Unpin + Send,
{
    /// Everything written to the peer so far.
    pub(crate) fn writer_bytes(&self) -> &[u8] {
        self.writer.get_ref()
    }
}
