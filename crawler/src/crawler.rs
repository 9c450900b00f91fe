use crate::capacity::CapacitySignal;
use crate::connection::{Dialer, TcpDialer};
use crate::engine::{interrogate, Timeouts};
use crate::result::{CrawlResult, CrawlTarget};
use bitcoin::p2p::Magic;
use dnsseed_connection::ConnectionConfiguration;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Crawls individual bitcoin peers.
///
/// Each call to [`Crawler::spawn`] or [`Crawler::crawl_node`] contacts one
/// target: it dials, handshakes, asks for the peer's address list (unless the
/// coordinator already has enough peers) and reports exactly one
/// [`CrawlResult`]. The crawler holds only immutable configuration plus a
/// read handle on the coordinator's peer count, so it is cheap to clone into
/// many concurrent tasks.
///
/// Built with [`CrawlerBuilder`](crate::CrawlerBuilder).
#[derive(Debug, Clone)]
pub struct Crawler {
    dialer: TcpDialer,
    timeouts: Timeouts,
    capacity: Arc<dyn CapacitySignal>,
}

impl Crawler {
    pub(crate) fn new(
        configuration: ConnectionConfiguration,
        timeouts: Timeouts,
        capacity: Arc<dyn CapacitySignal>,
    ) -> Self {
        Crawler {
            dialer: TcpDialer { configuration },
            timeouts,
            capacity,
        }
    }

    /// Network magic the crawler speaks.
    pub fn magic(&self) -> Magic {
        self.dialer.configuration.magic
    }

    /// Deadline for the handshake once a target is dialed.
    pub fn handshake_timeout(&self) -> Duration {
        self.timeouts.handshake
    }

    /// Deadline for the address response once `getaddr` is sent.
    pub fn addr_timeout(&self) -> Duration {
        self.timeouts.addr
    }

    /// Crawl `target` and return its result.
    ///
    /// Never fails: connection and handshake problems are reported through
    /// [`CrawlResult::error`].
    pub async fn crawl(&self, target: &CrawlTarget) -> CrawlResult {
        self.crawl_with(&self.dialer, target).await
    }

    /// Crawl `target` and deliver the result on `results`.
    ///
    /// Waits for room in the channel, so a slow consumer holds the task here.
    /// If the receiver is gone the result is logged and discarded.
    pub async fn crawl_node(&self, target: CrawlTarget, results: &mpsc::Sender<CrawlResult>) {
        let result = self.crawl(&target).await;
        report(result, results).await;
    }

    /// Run [`Crawler::crawl_node`] as an independent tokio task.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(&self, target: CrawlTarget, results: mpsc::Sender<CrawlResult>) -> JoinHandle<()> {
        let crawler = self.clone();
        tokio::spawn(async move { crawler.crawl_node(target, &results).await })
    }

    async fn crawl_with<D: Dialer>(&self, dialer: &D, target: &CrawlTarget) -> CrawlResult {
        let outcome = interrogate(dialer, target, self.timeouts, self.capacity.as_ref()).await;
        if let Err(e) = &outcome {
            debug!("{target} - {e}");
        }
        CrawlResult::from_outcome(target, outcome)
    }
}

async fn report(result: CrawlResult, results: &mpsc::Sender<CrawlResult>) {
    if let Err(mpsc::error::SendError(result)) = results.send(result).await {
        warn!("Results receiver dropped, discarding result for {}", result.node);
    }
}
