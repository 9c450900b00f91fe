//! The coordinator's known-peer count as seen by crawl tasks.
//!
//! Tasks only need an approximate answer to "does the coordinator already have
//! enough peers?". Reads are relaxed atomic snapshots, so a task may act on a
//! count that is a few updates stale.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Read access to the coordinator's known-peer count and its limit.
pub trait CapacitySignal: fmt::Debug + Send + Sync {
    /// Current number of peers the coordinator knows about.
    fn known_peers(&self) -> usize;

    /// Size the coordinator's peer list is allowed to reach.
    fn max_peers(&self) -> usize;

    /// True once the known-peer count exceeds the limit.
    ///
    /// Crawl tasks stop asking for addresses while this holds.
    fn is_saturated(&self) -> bool {
        self.known_peers() > self.max_peers()
    }
}

/// A [`CapacitySignal`] backed by a shared atomic counter.
///
/// Clones share the counter: the coordinator keeps one clone and updates it,
/// crawl tasks read through theirs.
///
/// # Example
///
/// ```
/// use dnsseed_crawler::{CapacitySignal, PeerCountGauge};
///
/// let gauge = PeerCountGauge::new(2);
/// let seen_by_task = gauge.clone();
///
/// gauge.set(2);
/// assert!(!seen_by_task.is_saturated());
/// gauge.increment();
/// assert!(seen_by_task.is_saturated());
/// ```
#[derive(Debug, Clone)]
pub struct PeerCountGauge {
    known: Arc<AtomicUsize>,
    max: usize,
}

impl PeerCountGauge {
    pub fn new(max_peers: usize) -> Self {
        PeerCountGauge {
            known: Arc::new(AtomicUsize::new(0)),
            max: max_peers,
        }
    }

    /// A gauge that never saturates.
    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    pub fn set(&self, known_peers: usize) {
        self.known.store(known_peers, Ordering::Relaxed);
    }

    pub fn increment(&self) {
        self.known.fetch_add(1, Ordering::Relaxed);
    }

    /// Saturates at zero.
    pub fn decrement(&self) {
        let _ = self
            .known
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }
}

impl CapacitySignal for PeerCountGauge {
    fn known_peers(&self) -> usize {
        self.known.load(Ordering::Relaxed)
    }

    fn max_peers(&self) -> usize {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturation_is_strictly_greater() {
        let gauge = PeerCountGauge::new(10);
        gauge.set(10);
        assert!(!gauge.is_saturated());
        gauge.set(11);
        assert!(gauge.is_saturated());
    }

    #[test]
    fn test_decrement_stops_at_zero() {
        let gauge = PeerCountGauge::new(1);
        gauge.decrement();
        assert_eq!(gauge.known_peers(), 0);
        gauge.increment();
        gauge.increment();
        gauge.decrement();
        assert_eq!(gauge.known_peers(), 1);
    }

    #[test]
    fn test_unbounded_never_saturates() {
        let gauge = PeerCountGauge::unbounded();
        gauge.set(usize::MAX);
        assert!(!gauge.is_saturated());
    }

    #[test]
    fn test_clones_share_the_count() {
        let gauge = PeerCountGauge::new(5);
        let clone = gauge.clone();
        gauge.set(3);
        assert_eq!(clone.known_peers(), 3);
    }
}
