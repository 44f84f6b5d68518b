//! UDP data channel transport.
//!
//! The receiver pushes IQ datagrams to a fixed local port. The transport
//! binds that port once and hands out one datagram per `receive` call.

use async_trait::async_trait;
use log::{debug, info, trace};
#[cfg(test)]
use mockall::automock;
use tokio::net::UdpSocket;

use crate::errors::NetworkError;

pub const DEFAULT_UDP_PORT: u16 = 60000;
pub const DEFAULT_DATAGRAM_BUFFER_SIZE: usize = 8192;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait DatagramTransport: Send {
    /// Opens the data channel. Calling it on an open channel does nothing.
    async fn connect(&mut self, host: &str, port: u16) -> Result<(), NetworkError>;

    /// Waits for the next datagram. Must be cancel safe: dropping the future
    /// before it resolves loses no data.
    async fn receive(&mut self) -> Result<Vec<u8>, NetworkError>;

    async fn close(&mut self) -> Result<(), NetworkError>;
}

#[derive(Debug)]
pub struct UdpTransport {
    socket: Option<UdpSocket>,
    buffer: Vec<u8>,
}

impl Default for UdpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_DATAGRAM_BUFFER_SIZE)
    }
}

impl UdpTransport {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            socket: None,
            buffer: vec![0; buffer_size],
        }
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    pub fn local_port(&self) -> Option<u16> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok()).map(|a| a.port())
    }
}

#[async_trait]
impl DatagramTransport for UdpTransport {
    async fn connect(&mut self, host: &str, port: u16) -> Result<(), NetworkError> {
        if self.socket.is_some() {
            info!("Data channel already bound");
            return Ok(());
        }
        let socket = UdpSocket::bind(("0.0.0.0", port)).await?;
        info!("Listening for {host} datagrams on {}", socket.local_addr()?);
        self.socket = Some(socket);
        Ok(())
    }

    async fn receive(&mut self) -> Result<Vec<u8>, NetworkError> {
        let socket = self.socket.as_ref().ok_or(NetworkError::NotConnected)?;
        let (n_read, src_addr) = socket.recv_from(&mut self.buffer).await?;
        trace!("Received {n_read} byte datagram from {src_addr}");
        Ok(self.buffer[..n_read].to_vec())
    }

    async fn close(&mut self) -> Result<(), NetworkError> {
        if self.socket.take().is_some() {
            debug!("Data channel closed");
        }
        Ok(())
    }
}
