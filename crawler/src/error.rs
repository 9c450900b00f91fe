//! Failures of a single crawl attempt.

use dnsseed_connection::ConnectionError;
use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Why a crawl attempt failed, tagged with where it failed.
///
/// An address request that times out or is skipped because the coordinator
/// has enough peers is not a failure and never produces a `CrawlError`.
#[derive(Debug)]
pub enum CrawlError {
    /// The outbound session could not be built, e.g. the target isn't an IP address.
    Session(ConnectionError),
    /// The transport dial failed.
    Dial(ConnectionError),
    /// The connection broke before the peer acknowledged the handshake.
    ///
    /// Reported as soon as it happens rather than when the deadline passes,
    /// but classified the same as [`CrawlError::HandshakeTimeout`].
    Handshake(ConnectionError),
    /// The peer did not complete the handshake within the deadline.
    HandshakeTimeout(Duration),
}

/// Coarse classification of a [`CrawlError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlErrorKind {
    /// Session construction or dial failure.
    Connection,
    /// No handshake acknowledgment, either the deadline passed or the peer went away first.
    HandshakeTimeout,
}

impl CrawlError {
    pub fn kind(&self) -> CrawlErrorKind {
        match self {
            CrawlError::Session(_) | CrawlError::Dial(_) => CrawlErrorKind::Connection,
            CrawlError::Handshake(_) | CrawlError::HandshakeTimeout(_) => {
                CrawlErrorKind::HandshakeTimeout
            }
        }
    }

    /// Short tag naming the step that failed.
    pub fn location(&self) -> &'static str {
        match self {
            CrawlError::Session(_) => "session",
            CrawlError::Dial(_) => "dial",
            CrawlError::Handshake(_) | CrawlError::HandshakeTimeout(_) => "handshake timeout",
        }
    }
}

impl fmt::Display for CrawlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlError::Session(err) | CrawlError::Dial(err) => {
                write!(f, "{}: {err}", self.location())
            }
            CrawlError::Handshake(err) => {
                write!(f, "{}: no verack before connection failed: {err}", self.location())
            }
            CrawlError::HandshakeTimeout(after) => {
                write!(f, "{}: no verack after {after:?}", self.location())
            }
        }
    }
}

impl Error for CrawlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CrawlError::Session(err) | CrawlError::Dial(err) | CrawlError::Handshake(err) => {
                Some(err)
            }
            CrawlError::HandshakeTimeout(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_and_locations() {
        let session = CrawlError::Session(ConnectionError::UnsupportedAddressType);
        assert_eq!(session.kind(), CrawlErrorKind::Connection);
        assert_eq!(session.location(), "session");

        let dial = CrawlError::Dial(ConnectionError::Timeout);
        assert_eq!(dial.kind(), CrawlErrorKind::Connection);
        assert_eq!(dial.location(), "dial");

        let timeout = CrawlError::HandshakeTimeout(Duration::from_secs(5));
        assert_eq!(timeout.kind(), CrawlErrorKind::HandshakeTimeout);
        assert!(timeout.source().is_none());
    }

    #[test]
    fn test_broken_handshake_counts_as_timeout() {
        let broken = CrawlError::Handshake(ConnectionError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "Connection reset by peer",
        )));
        assert_eq!(broken.kind(), CrawlErrorKind::HandshakeTimeout);
        assert_eq!(broken.location(), "handshake timeout");
        // The cause is kept.
        assert!(broken.source().is_some());
        assert_eq!(
            broken.to_string(),
            concat!(
                "handshake timeout: no verack before connection failed: ",
                "Connection error: Connection reset by peer"
            )
        );
    }

    #[test]
    fn test_display() {
        let dial = CrawlError::Dial(ConnectionError::Timeout);
        assert_eq!(dial.to_string(), "dial: Connection attempt timed out");

        let timeout = CrawlError::HandshakeTimeout(Duration::from_secs(5));
        assert_eq!(timeout.to_string(), "handshake timeout: no verack after 5s");
    }
}
