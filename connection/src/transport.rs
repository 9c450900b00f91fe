//! Bitcoin v1 plaintext transport.
//!
//! Frames [`NetworkMessage`]s with the 24 byte v1 header (network magic, command,
//! payload length and checksum) over any `AsyncRead`/`AsyncWrite` pair. Message
//! encoding itself is delegated to the `bitcoin` crate.
//!
//! The transport splits into a [`TransportReader`] and a [`TransportWriter`] so the
//! connection can hand each half its own I/O resource.

use bitcoin::consensus::encode;
use bitcoin::p2p::message::{NetworkMessage, RawNetworkMessage, MAX_MSG_SIZE};
use bitcoin::p2p::Magic;
use std::fmt;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of a bitcoin message header in bytes.
const HEADER_SIZE: usize = 24;
/// Offset in the header where the payload length is stored.
const PAYLOAD_LENGTH_OFFSET: usize = 16;
/// Largest payload accepted from a peer.
///
/// Anything bigger would be rejected by message decoding anyway, checking the
/// header keeps the payload buffer from being allocated at all.
pub const MAX_PAYLOAD_SIZE: usize = MAX_MSG_SIZE;

/// Error types specific to the transport layer.
#[derive(Debug)]
pub enum TransportError {
    /// IO error during read/write operations.
    Io(io::Error),
    /// Failed to deserialize a message.
    Deserialize(encode::Error),
    /// Network magic in the message doesn't match the expected value.
    MagicMismatch,
    /// The header announced a payload larger than [`MAX_PAYLOAD_SIZE`].
    PayloadTooLarge(usize),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Io(e) => write!(f, "IO error: {e}"),
            TransportError::Deserialize(e) => write!(f, "Message deserialization error: {e}"),
            TransportError::MagicMismatch => write!(f, "Network magic mismatch"),
            TransportError::PayloadTooLarge(len) => {
                write!(f, "Payload of {len} bytes exceeds {MAX_PAYLOAD_SIZE} byte limit")
            }
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Io(e) => Some(e),
            TransportError::Deserialize(e) => Some(e),
            TransportError::MagicMismatch => None,
            TransportError::PayloadTooLarge(_) => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        TransportError::Io(e)
    }
}

impl From<encode::Error> for TransportError {
    fn from(e: encode::Error) -> Self {
        TransportError::Deserialize(e)
    }
}

/// Progress of a read, kept across calls so that a read dropped mid-message
/// (e.g. by a losing `tokio::select!` branch) resumes without losing bytes.
#[derive(Debug)]
enum ReadState {
    Header {
        header: [u8; HEADER_SIZE],
        bytes_read: usize,
    },
    Payload {
        /// Complete buffer including header and payload.
        buffer: Vec<u8>,
        bytes_read: usize,
    },
}

impl ReadState {
    fn header() -> Self {
        ReadState::Header {
            header: [0u8; HEADER_SIZE],
            bytes_read: 0,
        }
    }

    fn payload(header: [u8; HEADER_SIZE], payload_len: usize) -> Self {
        let mut buffer = Vec::with_capacity(HEADER_SIZE + payload_len);
        buffer.extend_from_slice(&header);
        buffer.resize(HEADER_SIZE + payload_len, 0);

        ReadState::Payload {
            buffer,
            bytes_read: HEADER_SIZE,
        }
    }
}

/// Reader half of the v1 transport.
#[derive(Debug)]
pub struct TransportReader<R> {
    magic: Magic,
    state: ReadState,
    reader: R,
}

impl<R> TransportReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(magic: Magic, reader: R) -> Self {
        Self {
            magic,
            state: ReadState::header(),
            reader,
        }
    }

    /// Read the next message.
    ///
    /// # Cancellation Safety
    ///
    /// This method is cancellation safe. Partially read data is kept and the
    /// next call continues where the dropped one stopped.
    pub async fn read(&mut self) -> Result<NetworkMessage, TransportError> {
        loop {
            match &mut self.state {
                ReadState::Header { header, bytes_read } => {
                    while *bytes_read < HEADER_SIZE {
                        let n = self.reader.read(&mut header[*bytes_read..]).await?;
                        if n == 0 {
                            return Err(TransportError::Io(io::Error::new(
                                io::ErrorKind::UnexpectedEof,
                                "connection closed while reading header",
                            )));
                        }
                        *bytes_read += n;
                    }

                    // Fail fast on a foreign network before buffering its payload.
                    if header[..4] != self.magic.to_bytes() {
                        self.state = ReadState::header();
                        return Err(TransportError::MagicMismatch);
                    }

                    let payload_len = u32::from_le_bytes([
                        header[PAYLOAD_LENGTH_OFFSET],
                        header[PAYLOAD_LENGTH_OFFSET + 1],
                        header[PAYLOAD_LENGTH_OFFSET + 2],
                        header[PAYLOAD_LENGTH_OFFSET + 3],
                    ]) as usize;
                    if payload_len > MAX_PAYLOAD_SIZE {
                        self.state = ReadState::header();
                        return Err(TransportError::PayloadTooLarge(payload_len));
                    }

                    self.state = ReadState::payload(*header, payload_len);
                }
                ReadState::Payload { buffer, bytes_read } => {
                    while *bytes_read < buffer.len() {
                        let n = self.reader.read(&mut buffer[*bytes_read..]).await?;
                        if n == 0 {
                            return Err(TransportError::Io(io::Error::new(
                                io::ErrorKind::UnexpectedEof,
                                "connection closed while reading payload",
                            )));
                        }
                        *bytes_read += n;
                    }

                    let decoded: Result<RawNetworkMessage, _> = encode::deserialize(buffer);
                    self.state = ReadState::header();
                    return Ok(decoded?.into_payload());
                }
            }
        }
    }
}

/// Writer half of the v1 transport.
#[derive(Debug)]
pub struct TransportWriter<W> {
    magic: Magic,
    writer: W,
}

impl<W> TransportWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(magic: Magic, writer: W) -> Self {
        Self { magic, writer }
    }

    /// Serialize, frame and flush a message.
    pub async fn write(&mut self, message: NetworkMessage) -> Result<(), TransportError> {
        let data = encode::serialize(&RawNetworkMessage::new(self.magic, message));
        self.writer.write_all(&data).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Shut down the write side of the underlying I/O resource.
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.writer.shutdown().await?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn get_ref(&self) -> &W {
        &self.writer
    }
}

/// A v1 transport over a reader and writer pair.
///
/// # Example
///
/// ```no_run
/// use bitcoin::p2p::message::NetworkMessage;
/// use bitcoin::p2p::Magic;
/// use dnsseed_connection::Transport;
/// use tokio::net::TcpStream;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let stream = TcpStream::connect("127.0.0.1:8333").await?;
/// let (reader, writer) = stream.into_split();
/// let mut transport = Transport::new(Magic::BITCOIN, reader, writer);
///
/// transport.write(NetworkMessage::Ping(42)).await?;
/// let response = transport.read().await?;
/// println!("Received: {response:?}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Transport<R, W> {
    reader: TransportReader<R>,
    writer: TransportWriter<W>,
}

impl<R, W> Transport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(magic: Magic, reader: R, writer: W) -> Self {
        Self {
            reader: TransportReader::new(magic, reader),
            writer: TransportWriter::new(magic, writer),
        }
    }

    /// Read the next message, see [`TransportReader::read`].
    pub async fn read(&mut self) -> Result<NetworkMessage, TransportError> {
        self.reader.read().await
    }

    pub async fn write(&mut self, message: NetworkMessage) -> Result<(), TransportError> {
        self.writer.write(message).await
    }

    pub fn into_split(self) -> (TransportReader<R>, TransportWriter<W>) {
        (self.reader, self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder as MockIoBuilder;

    fn frame(magic: Magic, payload: NetworkMessage) -> Vec<u8> {
        encode::serialize(&RawNetworkMessage::new(magic, payload))
    }

    #[tokio::test]
    async fn test_read_message() {
        let bytes = frame(Magic::BITCOIN, NetworkMessage::Ping(42));
        let reader = MockIoBuilder::new().read(&bytes).build();
        let mut transport = Transport::new(Magic::BITCOIN, reader, Vec::new());

        let received = transport.read().await.unwrap();
        assert_eq!(received, NetworkMessage::Ping(42));
    }

    #[tokio::test]
    async fn test_write_message() {
        let reader = MockIoBuilder::new().build();
        let mut transport = Transport::new(Magic::BITCOIN, reader, Vec::new());

        transport.write(NetworkMessage::GetAddr).await.unwrap();

        let (_, writer) = transport.into_split();
        assert_eq!(writer.writer, frame(Magic::BITCOIN, NetworkMessage::GetAddr));
    }

    #[tokio::test]
    async fn test_magic_mismatch() {
        let bytes = frame(Magic::TESTNET4, NetworkMessage::Ping(42));
        // Only the header is consumed before the mismatch is reported.
        let reader = MockIoBuilder::new().read(&bytes[..HEADER_SIZE]).build();
        let mut transport = Transport::new(Magic::BITCOIN, reader, Vec::new());

        let result = transport.read().await;
        assert!(matches!(result, Err(TransportError::MagicMismatch)));
    }

    #[tokio::test]
    async fn test_payload_too_large() {
        let mut header = [0u8; HEADER_SIZE];
        header[0..4].copy_from_slice(&Magic::BITCOIN.to_bytes());
        header[4..8].copy_from_slice(b"addr");
        let announced = (MAX_PAYLOAD_SIZE + 1) as u32;
        header[PAYLOAD_LENGTH_OFFSET..PAYLOAD_LENGTH_OFFSET + 4]
            .copy_from_slice(&announced.to_le_bytes());

        let reader = MockIoBuilder::new().read(&header).build();
        let mut transport = Transport::new(Magic::BITCOIN, reader, Vec::new());

        let result = transport.read().await;
        assert!(matches!(
            result,
            Err(TransportError::PayloadTooLarge(len)) if len == MAX_PAYLOAD_SIZE + 1
        ));
    }

    #[tokio::test]
    async fn test_oversized_header_rejected_before_payload() {
        let mut header = [0u8; HEADER_SIZE];
        header[0..4].copy_from_slice(&Magic::BITCOIN.to_bytes());
        header[4..8].copy_from_slice(b"addr");
        let announced: u32 = 10_000_000;
        header[PAYLOAD_LENGTH_OFFSET..PAYLOAD_LENGTH_OFFSET + 4]
            .copy_from_slice(&announced.to_le_bytes());

        // No payload bytes are scripted, reading any would surface as EOF instead.
        let reader = MockIoBuilder::new().read(&header).build();
        let mut transport = Transport::new(Magic::BITCOIN, reader, Vec::new());

        let result = transport.read().await;
        assert!(matches!(result, Err(TransportError::PayloadTooLarge(10_000_000))));
        assert_eq!(MAX_PAYLOAD_SIZE, 5_000_000);
    }

    #[tokio::test]
    async fn test_invalid_payload() {
        let mut header = [0u8; HEADER_SIZE];
        header[0..4].copy_from_slice(&Magic::BITCOIN.to_bytes());
        header[4..8].copy_from_slice(b"ping");
        let payload_len: u32 = 6;
        header[PAYLOAD_LENGTH_OFFSET..PAYLOAD_LENGTH_OFFSET + 4]
            .copy_from_slice(&payload_len.to_le_bytes());

        let mut data = header.to_vec();
        data.extend_from_slice(&[0xFF; 6]);
        let reader = MockIoBuilder::new().read(&data).build();
        let mut transport = Transport::new(Magic::BITCOIN, reader, Vec::new());

        let result = transport.read().await;
        assert!(matches!(result, Err(TransportError::Deserialize(_))));
    }

    #[tokio::test]
    async fn test_eof_mid_payload() {
        let mut bytes = frame(Magic::BITCOIN, NetworkMessage::Ping(42));
        bytes.truncate(HEADER_SIZE + 2);
        let reader = MockIoBuilder::new().read(&bytes).build();
        let mut transport = Transport::new(Magic::BITCOIN, reader, Vec::new());

        let result = transport.read().await;
        assert!(matches!(result, Err(TransportError::Io(_))));
    }

    #[tokio::test]
    async fn test_byte_at_a_time_reads() {
        let bytes = frame(Magic::BITCOIN, NetworkMessage::Verack);
        let mut builder = MockIoBuilder::new();
        for i in 0..bytes.len() {
            builder.read(&bytes[i..i + 1]);
        }
        let mut transport = Transport::new(Magic::BITCOIN, builder.build(), Vec::new());

        assert_eq!(transport.read().await.unwrap(), NetworkMessage::Verack);
    }

    #[tokio::test]
    async fn test_back_to_back_messages() {
        let mut combined = frame(Magic::BITCOIN, NetworkMessage::Verack);
        combined.extend(frame(Magic::BITCOIN, NetworkMessage::Ping(7)));
        let reader = MockIoBuilder::new().read(&combined).build();
        let mut transport = Transport::new(Magic::BITCOIN, reader, Vec::new());

        assert_eq!(transport.read().await.unwrap(), NetworkMessage::Verack);
        assert_eq!(transport.read().await.unwrap(), NetworkMessage::Ping(7));
    }
}
