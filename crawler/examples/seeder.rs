//! A minimal seeder coordinator built on the crawl tasks.
//!
//! Starts from the given seed addresses, crawls every peer it learns about
//! with a bounded number of concurrent tasks and prints one line per result.

use bitcoin::Network;
use clap::Parser;
use dnsseed_crawler::{CapacitySignal, CrawlResult, CrawlTarget, CrawlerBuilder, PeerCountGauge};
use log::LevelFilter;
use std::collections::{HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Seed node addresses, e.g. 203.0.113.5:8333.
    #[arg(required = true)]
    seeds: Vec<SocketAddr>,

    /// Network to crawl: bitcoin, testnet, signet or regtest.
    #[arg(short, long, default_value = "bitcoin")]
    network: Network,

    /// Custom user agent (optional).
    #[arg(short, long)]
    user_agent: Option<String>,

    /// Maximum number of concurrent crawl tasks.
    #[arg(short, long, default_value = "16")]
    concurrent_tasks: usize,

    /// Stop asking peers for addresses once this many are known.
    #[arg(short, long, default_value = "5000")]
    max_peers: usize,

    /// Handshake timeout in seconds.
    #[arg(long, default_value = "5")]
    handshake_timeout: u64,

    /// Address response timeout in seconds.
    #[arg(long, default_value = "6")]
    addr_timeout: u64,

    /// Log level.
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}] {} - {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log_level)
        .chain(std::io::stderr())
        .apply()
        .map_err(|e| format!("Failed to install logger: {e}"))?;

    log::info!("Seeding from {} addresses on {}", args.seeds.len(), args.network);

    let gauge = PeerCountGauge::new(args.max_peers);
    let mut builder = CrawlerBuilder::new(args.network)
        .with_handshake_timeout(Duration::from_secs(args.handshake_timeout))
        .with_addr_timeout(Duration::from_secs(args.addr_timeout))
        .with_capacity(Arc::new(gauge.clone()));
    if let Some(user_agent) = args.user_agent {
        log::debug!("Using custom user agent: {user_agent}");
        builder = builder.with_user_agent(user_agent)?;
    }
    let crawler = builder.build();

    let mut known: HashSet<CrawlTarget> = HashSet::new();
    let mut pending: VecDeque<CrawlTarget> = VecDeque::new();
    for seed in args.seeds {
        let target = CrawlTarget::from(seed);
        if known.insert(target.clone()) {
            pending.push_back(target);
        }
    }
    gauge.set(known.len());

    let (results_tx, mut results_rx) = mpsc::channel::<CrawlResult>(args.concurrent_tasks.max(1));
    let mut in_flight = 0usize;
    let mut listening = 0usize;

    loop {
        while in_flight < args.concurrent_tasks {
            let Some(target) = pending.pop_front() else {
                break;
            };
            crawler.spawn(target, results_tx.clone());
            in_flight += 1;
        }
        if in_flight == 0 {
            break;
        }

        let result = tokio::select! {
            result = results_rx.recv() => result,
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, {in_flight} crawls still running");
                break;
            }
        };
        let Some(result) = result else {
            break;
        };
        in_flight -= 1;

        if result.is_listening() {
            listening += 1;
            println!("{result}");
        } else {
            // Unreachable peers don't count towards the limit.
            gauge.decrement();
            log::debug!("{result}");
        }

        for peer in result.addresses {
            let target = CrawlTarget::from(peer);
            if known.insert(target.clone()) {
                gauge.increment();
                pending.push_back(target);
            }
        }
    }

    log::info!(
        "Crawl finished: {} seen, {} usable, {listening} listening",
        known.len(),
        gauge.known_peers()
    );
    Ok(())
}
