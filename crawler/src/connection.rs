//! Internal peer connection abstractions for testing and mocking.
//!
//! The engine is written against [`Dialer`] and [`PeerConnection`] so that its
//! timing and failure handling can be exercised without sockets.

use crate::error::CrawlError;
use crate::result::CrawlTarget;
use bitcoin::p2p::message::NetworkMessage;
use dnsseed_connection::{
    AsyncConnection, Connection, ConnectionConfiguration, ConnectionError, OutboundSession,
    PeerVersion,
};
use std::future::Future;

/// Operations the engine needs from a dialed peer.
pub(crate) trait PeerConnection: Send {
    fn handshake(
        &mut self,
    ) -> impl Future<Output = Result<PeerVersion, ConnectionError>> + Send;
    fn send(
        &mut self,
        message: NetworkMessage,
    ) -> impl Future<Output = Result<(), ConnectionError>> + Send;
    fn receive(&mut self) -> impl Future<Output = Result<NetworkMessage, ConnectionError>> + Send;
    fn disconnect(self) -> impl Future<Output = Result<(), ConnectionError>> + Send;
}

impl PeerConnection for Connection {
    fn handshake(
        &mut self,
    ) -> impl Future<Output = Result<PeerVersion, ConnectionError>> + Send {
        AsyncConnection::handshake(self)
    }

    fn send(
        &mut self,
        message: NetworkMessage,
    ) -> impl Future<Output = Result<(), ConnectionError>> + Send {
        AsyncConnection::send(self, message)
    }

    fn receive(&mut self) -> impl Future<Output = Result<NetworkMessage, ConnectionError>> + Send {
        AsyncConnection::receive(self)
    }

    fn disconnect(self) -> impl Future<Output = Result<(), ConnectionError>> + Send {
        AsyncConnection::disconnect(self)
    }
}

/// Opens connections to crawl targets.
///
/// Failures come back already tagged with the step that failed.
pub(crate) trait Dialer: Send + Sync {
    type Connection: PeerConnection;

    fn dial(
        &self,
        target: &CrawlTarget,
    ) -> impl Future<Output = Result<Self::Connection, CrawlError>> + Send;
}

/// Dials targets over TCP.
#[derive(Debug, Clone)]
pub(crate) struct TcpDialer {
    pub(crate) configuration: ConnectionConfiguration,
}

impl Dialer for TcpDialer {
    type Connection = Connection;

    fn dial(
        &self,
        target: &CrawlTarget,
    ) -> impl Future<Output = Result<Connection, CrawlError>> + Send {
        let session = OutboundSession::new(target.peer(), self.configuration.clone());
        async move {
            let session = session.map_err(CrawlError::Session)?;
            session.connect().await.map_err(CrawlError::Dial)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::p2p::address::AddrV2;
    use bitcoin::p2p::Magic;
    use dnsseed_connection::PeerProtocolVersion;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    fn dialer() -> TcpDialer {
        TcpDialer {
            configuration: ConnectionConfiguration::non_listening(
                PeerProtocolVersion::Known(70016),
                Magic::REGTEST,
                None,
            ),
        }
    }

    #[tokio::test]
    async fn test_dial_non_ip_target_is_session_error() {
        let target = CrawlTarget::new(AddrV2::TorV3([3u8; 32]), 9050);
        let result = dialer().dial(&target).await;
        assert!(matches!(
            result,
            Err(CrawlError::Session(ConnectionError::UnsupportedAddressType))
        ));
    }

    #[tokio::test]
    async fn test_dial_refused_is_dial_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        drop(listener);

        let result = dialer().dial(&CrawlTarget::from(addr)).await;
        assert!(matches!(result, Err(CrawlError::Dial(_))));
    }
}
