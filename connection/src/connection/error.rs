//! Error types for connection handling.

use crate::transport::TransportError;
use std::error::Error;
use std::fmt;
use std::io;

/// Errors that can occur during peer connection establishment and communication.
#[derive(Debug)]
pub enum ConnectionError {
    /// An I/O error occurred during network operations.
    Io(io::Error),
    /// The transport layer (framing and serialization) failed.
    TransportFailed(TransportError),
    /// The dial did not complete within the configured connection timeout.
    Timeout,
    /// Remote peer's address type is not supported for connections.
    UnsupportedAddressType,
    /// Detected a connection loop (attempting to connect to ourselves).
    ConnectionLoop,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::Io(err) => write!(f, "Connection error: {err}"),
            ConnectionError::TransportFailed(err) => {
                write!(f, "Transport layer failed in peer connection: {err}")
            }
            ConnectionError::Timeout => write!(f, "Connection attempt timed out"),
            ConnectionError::UnsupportedAddressType => write!(f, "Unsupported address type"),
            ConnectionError::ConnectionLoop => {
                write!(f, "Detected connection to self (matching nonce)")
            }
        }
    }
}

impl Error for ConnectionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConnectionError::Io(err) => Some(err),
            ConnectionError::TransportFailed(err) => Some(err),
            ConnectionError::Timeout => None,
            ConnectionError::UnsupportedAddressType => None,
            ConnectionError::ConnectionLoop => None,
        }
    }
}

impl From<io::Error> for ConnectionError {
    fn from(err: io::Error) -> Self {
        ConnectionError::Io(err)
    }
}

impl From<TransportError> for ConnectionError {
    fn from(err: TransportError) -> Self {
        ConnectionError::TransportFailed(err)
    }
}
