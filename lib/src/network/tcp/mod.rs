//! TCP control channel transport.
//!
//! The [`ControlTransport`] trait is the narrow interface the control session
//! talks to. [`TcpTransport`] implements it over a tokio `TcpStream`, framing
//! reads by the NetSDR length header.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, trace, warn};
#[cfg(test)]
use mockall::automock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::errors::NetworkError;
use crate::network::control_message::LENGTH_MASK;

pub mod client;

pub const DEFAULT_TCP_PORT: u16 = 50000;
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);
pub const MAX_MESSAGE_LENGTH: usize = LENGTH_MASK as usize;

const MESSAGE_HEADER_LEN: usize = 2;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ControlTransport: Send {
    /// Opens the channel. Calling it on an open channel does nothing.
    async fn connect(&mut self, host: &str, port: u16) -> Result<(), NetworkError>;

    async fn send(&mut self, bytes: &[u8]) -> Result<(), NetworkError>;

    /// Reads exactly one message from the channel.
    async fn receive(&mut self) -> Result<Vec<u8>, NetworkError>;

    async fn close(&mut self) -> Result<(), NetworkError>;
}

#[derive(Debug)]
struct Connection {
    read_stream: OwnedReadHalf,
    write_stream: OwnedWriteHalf,
    buffer: Vec<u8>,
}

/// Tokio backed [`ControlTransport`].
#[derive(Debug)]
pub struct TcpTransport {
    connection: Option<Connection>,
    connect_timeout: Duration,
    response_timeout: Duration,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(CONNECTION_TIMEOUT, RESPONSE_TIMEOUT)
    }
}

impl TcpTransport {
    pub fn new(connect_timeout: Duration, response_timeout: Duration) -> Self {
        Self {
            connection: None,
            connect_timeout,
            response_timeout,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn connection(&mut self) -> Result<&mut Connection, NetworkError> {
        self.connection.as_mut().ok_or(NetworkError::NotConnected)
    }
}

#[async_trait]
impl ControlTransport for TcpTransport {
    async fn connect(&mut self, host: &str, port: u16) -> Result<(), NetworkError> {
        if let Some(connection) = &self.connection {
            match connection.read_stream.peer_addr() {
                Ok(target_addr) => {
                    info!("Already connected to {target_addr}");
                    return Ok(());
                }
                Err(e) => {
                    warn!("Dropping stale control connection: {e}");
                    self.connection = None;
                }
            }
        }

        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect((host, port))).await??;
        stream.set_nodelay(true)?;
        let (read_stream, write_stream) = stream.into_split();
        let target_addr = write_stream.peer_addr()?;
        let src_addr = write_stream.local_addr()?;

        self.connection = Some(Connection {
            read_stream,
            write_stream,
            buffer: vec![0; MAX_MESSAGE_LENGTH],
        });
        info!("Connected to {target_addr} from {src_addr}");
        Ok(())
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), NetworkError> {
        let connection = self.connection()?;
        send_message(&mut connection.write_stream, bytes).await
    }

    /// A timed out or closed read leaves the stream mid-frame, so the
    /// connection is dropped and has to be reopened with `connect`.
    async fn receive(&mut self) -> Result<Vec<u8>, NetworkError> {
        let response_timeout = self.response_timeout;
        let connection = self.connection()?;
        let received = tokio::time::timeout(
            response_timeout,
            read_message(&mut connection.read_stream, &mut connection.buffer),
        )
        .await
        .map_err(NetworkError::from)
        .and_then(|read| read);

        if matches!(received, Err(NetworkError::Timeout(_) | NetworkError::Closed)) {
            debug!("Dropping control connection after failed receive");
            self.connection = None;
        }
        received
    }

    async fn close(&mut self) -> Result<(), NetworkError> {
        match self.connection.take() {
            Some(mut connection) => {
                debug!("Shutting down control channel");
                if let Err(e) = connection.write_stream.shutdown().await {
                    error!("Failed to shutdown write stream: {e}");
                    return Err(NetworkError::Io(e));
                }
                info!("Control channel closed");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Reads one length-prefixed message. The returned bytes include the header.
pub async fn read_message(read_stream: &mut OwnedReadHalf, buffer: &mut [u8]) -> Result<Vec<u8>, NetworkError> {
    let mut header = [0u8; MESSAGE_HEADER_LEN];

    match read_stream.read_exact(&mut header).await {
        Ok(_) => trace!("Header bytes: {header:02X?}"),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            info!("Stream closed by peer.");
            return Err(NetworkError::Closed);
        }
        Err(e) => return Err(NetworkError::Io(e)),
    }

    let msg_length = (u16::from_le_bytes(header) & LENGTH_MASK) as usize;
    trace!("Message length {msg_length}");
    if msg_length <= MESSAGE_HEADER_LEN {
        return Ok(header.to_vec());
    }

    buffer[..MESSAGE_HEADER_LEN].copy_from_slice(&header);
    let mut bytes_read = MESSAGE_HEADER_LEN;
    while bytes_read < msg_length {
        let n_read = read_stream.read(&mut buffer[bytes_read..msg_length]).await?;
        if n_read == 0 {
            error!("stream closed before all bytes were read ({bytes_read}/{msg_length})");
            return Err(NetworkError::Closed);
        }
        bytes_read += n_read;
    }
    debug!("Read message of size {msg_length}: {:02X?}", &buffer[..msg_length]);
    Ok(buffer[..msg_length].to_vec())
}

pub async fn send_message(stream: &mut OwnedWriteHalf, bytes: &[u8]) -> Result<(), NetworkError> {
    trace!("Sending {} bytes: {bytes:02X?}", bytes.len());
    stream.write_all(bytes).await?;
    stream.flush().await?;
    Ok(())
}
