//! Bitcoin p2p protocol version handshake.
//!
//! The handshake is complete once the peer's `version` and `verack` have both
//! arrived, in either order. The capabilities the peer advertised in its
//! `version` are handed back to the caller as a [`PeerVersion`].

use super::error::ConnectionError;
use super::io::AsyncConnection;
use crate::peer::{
    PeerProtocolVersion, PeerServices, ADDRV2_MIN_PROTOCOL_VERSION, MIN_PROTOCOL_VERSION,
};
use bitcoin::p2p::address::{AddrV2, Address};
use bitcoin::p2p::message::NetworkMessage;
use bitcoin::p2p::message_network::VersionMessage;
use bitcoin::p2p::ServiceFlags;
use log::{debug, warn};
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncRead, AsyncWrite};

/// Capabilities a peer advertised in its `version` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerVersion {
    /// Protocol version the peer speaks.
    pub version: u32,
    /// Services the peer offers.
    pub services: ServiceFlags,
    /// Height of the peer's best block when it sent the message.
    pub start_height: i32,
    /// The peer's user agent string, unvalidated.
    pub user_agent: String,
}

impl From<&VersionMessage> for PeerVersion {
    fn from(message: &VersionMessage) -> Self {
        PeerVersion {
            version: message.version,
            services: message.services,
            start_height: message.start_height,
            user_agent: message.user_agent.clone(),
        }
    }
}

/// Handshake progress.
#[derive(Debug, Clone, PartialEq, Eq)]
enum HandshakeState {
    /// Sent version message, but haven't received anything yet.
    VersionSent,
    /// Received the peer's version message (and sent verack), but no verack yet.
    VersionReceived(PeerVersion),
    /// Received a verack, but no version message yet.
    VerackReceived,
    /// Both version and verack received.
    Complete(PeerVersion),
}

/// Current Unix timestamp in seconds, zero if the clock is before the epoch.
fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}

/// A nonce for connection loop detection.
///
/// Not cryptographically secure, only needs to differ between the connections
/// of one process and across processes.
fn generate_nonce() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or(0);
    let pid = process::id() as u64;
    now ^ pid.rotate_left(32)
}

/// Version messages only carry legacy addresses, non-IP peers get a placeholder.
fn address_to_socket(addr: &AddrV2, port: u16) -> SocketAddr {
    match addr {
        AddrV2::Ipv4(ipv4) => SocketAddr::new(IpAddr::V4(*ipv4), port),
        AddrV2::Ipv6(ipv6) => SocketAddr::new(IpAddr::V6(*ipv6), port),
        _ => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port),
    }
}

fn handle_verack(state: HandshakeState) -> HandshakeState {
    match state {
        HandshakeState::VersionSent => HandshakeState::VerackReceived,
        HandshakeState::VersionReceived(version) => HandshakeState::Complete(version),
        other => {
            debug!("Received duplicate verack in state {other:?}, ignoring");
            other
        }
    }
}

impl<R, W> AsyncConnection<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Performs the bitcoin p2p version handshake.
    ///
    /// 1. Send local version message.
    /// 2. Receive the peer's version, signal `sendaddrv2` if both sides support it and
    ///    reply verack.
    /// 3. Receive the peer's verack.
    ///
    /// Messages unrelated to the handshake are ignored. The method does not time out by
    /// itself, callers race it against their own deadline.
    ///
    /// # Returns
    ///
    /// * `Ok(PeerVersion)` - What the peer advertised, once the handshake completed.
    /// * `Err(ConnectionError)` - The connection broke or looped back to ourselves.
    pub async fn handshake(&mut self) -> Result<PeerVersion, ConnectionError> {
        let nonce = generate_nonce();
        let version_message = self.version_message(nonce);
        self.send(version_message).await?;
        debug!("Sent version message to {}", self.peer);

        let mut state = HandshakeState::VersionSent;
        loop {
            let message = self.receive().await?;
            state = match message {
                NetworkMessage::Version(version) => {
                    self.handle_version(version, nonce, state).await?
                }
                NetworkMessage::Verack => handle_verack(state),
                other => {
                    debug!("Received unexpected message during handshake: {other:?}, ignoring");
                    state
                }
            };

            if let HandshakeState::Complete(version) = state {
                debug!("Handshake with {} completed", self.peer);
                return Ok(version);
            }
        }
    }

    fn version_message(&self, nonce: u64) -> NetworkMessage {
        let config = &self.configuration;
        let receiver_services = match self.peer.services {
            PeerServices::Known(flags) => flags,
            PeerServices::Unknown => ServiceFlags::NONE,
        };
        let receiver = address_to_socket(&self.peer.address, self.peer.port);
        let sender = address_to_socket(&config.sender_address, config.sender_port);

        NetworkMessage::Version(VersionMessage {
            version: config.protocol_version.unwrap_or(MIN_PROTOCOL_VERSION),
            services: config.services,
            timestamp: unix_timestamp(),
            receiver: Address::new(&receiver, receiver_services),
            sender: Address::new(&sender, config.services),
            nonce,
            user_agent: config.advertised_user_agent().to_string(),
            start_height: config.start_height,
            relay: config.relay,
        })
    }

    async fn handle_version(
        &mut self,
        version: VersionMessage,
        our_nonce: u64,
        state: HandshakeState,
    ) -> Result<HandshakeState, ConnectionError> {
        if version.nonce == our_nonce {
            warn!("Connection loop detected with {}", self.peer);
            return Err(ConnectionError::ConnectionLoop);
        }

        let verack_seen = match state {
            HandshakeState::VersionSent => false,
            HandshakeState::VerackReceived => true,
            other => {
                debug!("Received duplicate version message in state {other:?}, ignoring");
                return Ok(other);
            }
        };
        let received = PeerVersion::from(&version);
        debug!(
            "Remote version of {}: {} {}",
            self.peer, received.version, received.user_agent
        );

        self.peer.services = PeerServices::Known(received.services);
        self.peer.version = PeerProtocolVersion::Known(received.version);

        let local_version = self
            .configuration
            .protocol_version
            .unwrap_or(MIN_PROTOCOL_VERSION);
        let effective_version = std::cmp::min(local_version, received.version);

        // BIP-155: sendaddrv2 must arrive between version and verack.
        if self.configuration.enable_addrv2 && effective_version >= ADDRV2_MIN_PROTOCOL_VERSION {
            self.send(NetworkMessage::SendAddrV2).await?;
            debug!("Sent sendaddrv2 message to {}", self.peer);
        }

        self.send(NetworkMessage::Verack).await?;
        debug!("Sent verack message to {}", self.peer);

        Ok(if verack_seen {
            HandshakeState::Complete(received)
        } else {
            HandshakeState::VersionReceived(received)
        })
    }
}
