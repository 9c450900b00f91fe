//! Handshake and address exchange with a single peer.
//!
//! ```text
//! dial ──> handshake ──(saturated)──> done, no addresses
//!              │                 └──> getaddr ──> addr/addrv2 or timer ──> disconnect
//!              └── failure or timer ──> CrawlError
//! ```
//!
//! The two timers bound how long a peer can hold a task once dialed. Every exit
//! path gives up the connection: early returns drop it, which closes the
//! socket, and the full exchange shuts it down explicitly.

use crate::capacity::CapacitySignal;
use crate::connection::{Dialer, PeerConnection};
use crate::error::CrawlError;
use crate::result::CrawlTarget;
use bitcoin::p2p::address::Address;
use bitcoin::p2p::message::NetworkMessage;
use dnsseed_connection::{ConnectionError, Peer, PeerVersion};
use log::debug;
use std::time::Duration;
use tokio::time::timeout;

/// Default deadline for the handshake once the dial succeeded.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default deadline for the address response after `getaddr` was sent.
pub const DEFAULT_ADDR_TIMEOUT: Duration = Duration::from_secs(6);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Timeouts {
    pub(crate) handshake: Duration,
    pub(crate) addr: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            handshake: DEFAULT_HANDSHAKE_TIMEOUT,
            addr: DEFAULT_ADDR_TIMEOUT,
        }
    }
}

/// How the address phase ended. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AddrOutcome {
    /// The peer answered with an address list.
    Received,
    /// The peer stayed silent until the address timer fired.
    TimedOut,
    /// The coordinator has enough peers, no addresses were requested.
    SkippedByCapacity,
    /// The connection broke while requesting or awaiting addresses.
    Failed,
}

/// What a peer revealed about itself and its neighbours.
#[derive(Debug)]
pub(crate) struct Interrogation {
    pub(crate) version: PeerVersion,
    pub(crate) addresses: Vec<Peer>,
    pub(crate) outcome: AddrOutcome,
}

/// Dial `target`, handshake and, capacity permitting, collect its address list.
pub(crate) async fn interrogate<D: Dialer>(
    dialer: &D,
    target: &CrawlTarget,
    timeouts: Timeouts,
    capacity: &dyn CapacitySignal,
) -> Result<Interrogation, CrawlError> {
    let mut conn = dialer.dial(target).await?;

    let version = match timeout(timeouts.handshake, conn.handshake()).await {
        Ok(Ok(version)) => version,
        Ok(Err(e)) => return Err(CrawlError::Handshake(e)),
        Err(_) => return Err(CrawlError::HandshakeTimeout(timeouts.handshake)),
    };
    debug!(
        "{target} - remote version: {} {}",
        version.version, version.user_agent
    );

    // Still worth connecting when saturated, the handshake confirms the peer is listening.
    if capacity.is_saturated() {
        debug!(
            "{target} - {} known peers exceeds {}, not asking for addresses",
            capacity.known_peers(),
            capacity.max_peers()
        );
        return Ok(Interrogation {
            version,
            addresses: Vec::new(),
            outcome: AddrOutcome::SkippedByCapacity,
        });
    }

    let (addresses, outcome) = request_addresses(&mut conn, timeouts.addr).await;
    debug!("{target} - address phase {outcome:?}, {} addresses", addresses.len());

    if let Err(e) = conn.disconnect().await {
        debug!("{target} - disconnect failed: {e}");
    }

    Ok(Interrogation {
        version,
        addresses,
        outcome,
    })
}

async fn request_addresses<C: PeerConnection>(
    conn: &mut C,
    wait: Duration,
) -> (Vec<Peer>, AddrOutcome) {
    if let Err(e) = conn.send(NetworkMessage::GetAddr).await {
        debug!("Failed to send getaddr: {e}");
        return (Vec::new(), AddrOutcome::Failed);
    }

    match timeout(wait, next_address_list(conn)).await {
        Ok(Ok(addresses)) => (addresses, AddrOutcome::Received),
        Ok(Err(e)) => {
            debug!("Connection failed while awaiting addresses: {e}");
            (Vec::new(), AddrOutcome::Failed)
        }
        Err(_) => (Vec::new(), AddrOutcome::TimedOut),
    }
}

/// Wait for the first `addr` or `addrv2` message, ignoring everything else.
async fn next_address_list<C: PeerConnection>(conn: &mut C) -> Result<Vec<Peer>, ConnectionError> {
    loop {
        match conn.receive().await? {
            NetworkMessage::Addr(entries) => {
                return Ok(entries
                    .iter()
                    .filter_map(|(_, address)| legacy_peer(address))
                    .collect())
            }
            NetworkMessage::AddrV2(entries) => {
                return Ok(entries
                    .into_iter()
                    .map(|entry| Peer::with_services(entry.addr, entry.port, entry.services))
                    .collect())
            }
            other => debug!("Ignoring {} while awaiting addresses", other.cmd()),
        }
    }
}

/// Legacy entries that don't map onto an IP socket address are dropped.
fn legacy_peer(address: &Address) -> Option<Peer> {
    let socket_addr = address.socket_addr().ok()?;
    let peer = Peer::from(socket_addr);
    Some(Peer::with_services(peer.address, peer.port, address.services))
}
