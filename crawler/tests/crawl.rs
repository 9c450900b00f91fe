//! End to end crawl tasks against a scripted peer on localhost.

use bitcoin::p2p::address::{AddrV2, AddrV2Message, Address};
use bitcoin::p2p::message::NetworkMessage;
use bitcoin::p2p::message_network::VersionMessage;
use bitcoin::p2p::{Magic, ServiceFlags};
use bitcoin::Network;
use dnsseed_connection::Transport;
use dnsseed_crawler::{CrawlErrorKind, CrawlResult, CrawlTarget, CrawlerBuilder, PeerCountGauge};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

fn remote_version(version: u32) -> VersionMessage {
    let addr: SocketAddr = "127.0.0.1:18444".parse().unwrap();
    VersionMessage {
        version,
        services: ServiceFlags::NETWORK | ServiceFlags::WITNESS,
        timestamp: 1_700_000_000,
        receiver: Address::new(&addr, ServiceFlags::NONE),
        sender: Address::new(&addr, ServiceFlags::NETWORK),
        nonce: 42,
        user_agent: "/Satoshi:26.1.0/".to_string(),
        start_height: 2_500,
        relay: false,
    }
}

/// Plays the remote side of the handshake, returning the transport for more scripting.
async fn accept_and_handshake(
    listener: TcpListener,
    version: u32,
) -> Transport<tokio::net::tcp::OwnedReadHalf, tokio::net::tcp::OwnedWriteHalf> {
    let (stream, _) = listener.accept().await.unwrap();
    let (reader, writer) = stream.into_split();
    let mut transport = Transport::new(Magic::REGTEST, reader, writer);

    assert!(matches!(
        transport.read().await.unwrap(),
        NetworkMessage::Version(_)
    ));
    transport
        .write(NetworkMessage::Version(remote_version(version)))
        .await
        .unwrap();
    transport.write(NetworkMessage::Verack).await.unwrap();

    loop {
        match transport.read().await.unwrap() {
            NetworkMessage::Verack => return transport,
            NetworkMessage::SendAddrV2 => continue,
            other => panic!("Unexpected message during handshake: {other:?}"),
        }
    }
}

fn gossip(count: u8) -> Vec<AddrV2Message> {
    (1..=count)
        .map(|i| AddrV2Message {
            time: 1_700_000_000,
            services: ServiceFlags::NETWORK,
            addr: AddrV2::Ipv4(Ipv4Addr::new(198, 51, 100, i)),
            port: 18444,
        })
        .collect()
}

#[tokio::test]
async fn test_crawl_listening_peer() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let remote = tokio::spawn(async move {
        let mut transport = accept_and_handshake(listener, 70016).await;
        assert_eq!(transport.read().await.unwrap(), NetworkMessage::GetAddr);
        // Chatter before the answer is skipped by the crawler.
        transport.write(NetworkMessage::SendHeaders).await.unwrap();
        transport
            .write(NetworkMessage::AddrV2(gossip(3)))
            .await
            .unwrap();
        // The crawler hangs up once it has the list.
        assert!(transport.read().await.is_err());
    });

    let crawler = CrawlerBuilder::new(Network::Regtest).build();
    let (tx, mut rx) = mpsc::channel::<CrawlResult>(8);
    let task = crawler.spawn(CrawlTarget::from(addr), tx);

    let result = rx.recv().await.unwrap();
    task.await.unwrap();
    remote.await.unwrap();

    assert_eq!(result.node, addr.to_string());
    assert!(result.error.is_none(), "crawl failed: {result}");
    assert_eq!(result.version, 70016);
    assert_eq!(result.last_block, 2_500);
    assert_eq!(result.user_agent, "/Satoshi:26.1.0/");
    let gossiped: Vec<String> = result.addresses.iter().map(|p| p.to_string()).collect();
    assert_eq!(
        gossiped,
        vec![
            "198.51.100.1:18444",
            "198.51.100.2:18444",
            "198.51.100.3:18444"
        ]
    );
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_crawl_silent_peer_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Accepts and then never says anything.
    let remote = tokio::spawn(async move {
        let (stream, _): (TcpStream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        drop(stream);
    });

    let crawler = CrawlerBuilder::new(Network::Regtest)
        .with_handshake_timeout(Duration::from_millis(300))
        .build();
    let start = Instant::now();
    let result = crawler.crawl(&CrawlTarget::from(addr)).await;

    assert!(start.elapsed() >= Duration::from_millis(300));
    assert!(start.elapsed() < Duration::from_secs(2));
    let error = result.error.expect("Expected a handshake timeout");
    assert_eq!(error.kind(), CrawlErrorKind::HandshakeTimeout);
    assert!(result.addresses.is_empty());

    remote.abort();
}

#[tokio::test]
async fn test_crawl_quiet_peer_is_still_listening() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let remote = tokio::spawn(async move {
        let mut transport = accept_and_handshake(listener, 70015).await;
        assert_eq!(transport.read().await.unwrap(), NetworkMessage::GetAddr);
        // Never answers, waits for the crawler to give up.
        assert!(transport.read().await.is_err());
    });

    let crawler = CrawlerBuilder::new(Network::Regtest)
        .with_addr_timeout(Duration::from_millis(300))
        .build();
    let result = crawler.crawl(&CrawlTarget::from(addr)).await;
    remote.await.unwrap();

    assert!(result.is_listening());
    assert_eq!(result.version, 70015);
    assert!(result.addresses.is_empty());
}

#[tokio::test]
async fn test_crawl_saturated_skips_getaddr() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let remote = tokio::spawn(async move {
        let mut transport = accept_and_handshake(listener, 70016).await;
        // No getaddr, the connection is simply closed.
        assert!(transport.read().await.is_err());
    });

    let gauge = PeerCountGauge::new(1);
    gauge.set(2);
    let crawler = CrawlerBuilder::new(Network::Regtest)
        .with_capacity(Arc::new(gauge))
        .build();
    let result = crawler.crawl(&CrawlTarget::from(addr)).await;
    remote.await.unwrap();

    assert!(result.is_listening());
    assert!(result.addresses.is_empty());
}

#[tokio::test]
async fn test_crawl_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let crawler = CrawlerBuilder::new(Network::Regtest).build();
    let result = crawler.crawl(&CrawlTarget::from(addr)).await;

    let error = result.error.expect("Expected a dial error");
    assert_eq!(error.kind(), CrawlErrorKind::Connection);
    assert_eq!(error.location(), "dial");
}

#[tokio::test]
async fn test_crawl_peer_hangs_up_before_verack() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let remote = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        drop(stream);
    });

    let crawler = CrawlerBuilder::new(Network::Regtest).build();
    let start = Instant::now();
    let result = crawler.crawl(&CrawlTarget::from(addr)).await;
    remote.await.unwrap();

    // Reported without waiting for the deadline, but as a missing verack.
    assert!(start.elapsed() < crawler.handshake_timeout());
    let error = result.error.expect("Expected a handshake timeout");
    assert_eq!(error.kind(), CrawlErrorKind::HandshakeTimeout);
    assert_eq!(error.location(), "handshake timeout");
    assert!(std::error::Error::source(&error).is_some());
    assert!(result.addresses.is_empty());
}
