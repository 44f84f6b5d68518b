//! NetSDR Client
//! -------------
//!
//! One lifecycle surface over the control channel ([`ControlClient`]) and the
//! data channel ([`CaptureSession`]).
//!
//! Not being connected is an expected condition and comes back as a failed
//! [`OperationResult`]. Using the client after [`NetSdrClient::dispose`] is a
//! programming error and always fails with [`ClientError::Disposed`].
//!
//! # Example
//! ```rust,ignore
//! let mut client = NetSdrClient::with_settings(&ClientSettings::default());
//! client.connect("192.168.1.50", DEFAULT_TCP_PORT).await?;
//! client.set_frequency(ChannelId::Channel1, 14_074_000).await?;
//! client.set_receiver_state(ReceiverState::Run, DataMode::IQ, CaptureMode::Contiguous24Bit, 0).await?;
//! ```

use std::time::Duration;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::errors::ClientError;
use crate::handler::capture::CaptureSession;
use crate::network::control_message::{CaptureMode, ChannelId, DataMode, FrequencyHz, ReceiverState};
pub use crate::network::tcp::client::OperationResult;
use crate::network::tcp::client::ControlClient;
use crate::network::tcp::{ControlTransport, TcpTransport};
use crate::network::udp::{DEFAULT_DATAGRAM_BUFFER_SIZE, DEFAULT_UDP_PORT, DatagramTransport, UdpTransport};
use crate::sinks::{self, Sink, SinkConfig};

/// Transport tuning shared by both channels.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ClientSettings {
    pub udp_port: u16,
    pub connect_timeout_ms: u64,
    pub response_timeout_ms: u64,
    pub datagram_buffer_size: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            udp_port: DEFAULT_UDP_PORT,
            connect_timeout_ms: 5000,
            response_timeout_ms: 2000,
            datagram_buffer_size: DEFAULT_DATAGRAM_BUFFER_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connected { host: String, tcp_port: u16 },
    Disposed,
}

pub struct NetSdrClient {
    control: ControlClient,
    capture: CaptureSession,
    udp_port: u16,
    state: ClientState,
}

impl NetSdrClient {
    pub fn new(control_transport: Box<dyn ControlTransport>, data_transport: Box<dyn DatagramTransport>, udp_port: u16) -> Self {
        Self {
            control: ControlClient::new(control_transport),
            capture: CaptureSession::new(data_transport),
            udp_port,
            state: ClientState::Disconnected,
        }
    }

    /// Builds a client backed by the tokio TCP and UDP transports.
    pub fn with_settings(settings: &ClientSettings) -> Self {
        let tcp = TcpTransport::new(
            Duration::from_millis(settings.connect_timeout_ms),
            Duration::from_millis(settings.response_timeout_ms),
        );
        let udp = UdpTransport::new(settings.datagram_buffer_size);
        Self::new(Box::new(tcp), Box::new(udp), settings.udp_port)
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ClientState::Connected { .. }) && self.control.is_connected()
    }

    pub fn is_disposed(&self) -> bool {
        self.state == ClientState::Disposed
    }

    fn ensure_not_disposed(&self) -> Result<(), ClientError> {
        if self.is_disposed() {
            return Err(ClientError::Disposed);
        }
        Ok(())
    }

    /// Opens the control channel to `host:tcp_port`. Does nothing when
    /// already connected.
    ///
    /// # Errors
    /// `ClientError::Disposed` after dispose, `ClientError::InvalidArgument`
    /// for a blank host or port 0, `ClientError::Network` if the connect fails.
    pub async fn connect(&mut self, host: &str, tcp_port: u16) -> Result<(), ClientError> {
        self.ensure_not_disposed()?;
        if host.trim().is_empty() {
            return Err(ClientError::InvalidArgument("host must not be blank".to_string()));
        }
        if tcp_port == 0 {
            return Err(ClientError::InvalidArgument("TCP port must be positive".to_string()));
        }
        if self.is_connected() {
            info!("Already connected to the receiver");
            return Ok(());
        }

        let host = host.trim();
        self.control.connect(host, tcp_port).await?;
        self.state = ClientState::Connected {
            host: host.to_string(),
            tcp_port,
        };
        Ok(())
    }

    /// Closes both channels. Each channel is released even if the other
    /// fails to close; the first failure is reported afterwards.
    ///
    /// # Errors
    /// `ClientError::Disposed` after dispose, otherwise the first close failure.
    pub async fn disconnect(&mut self) -> Result<(), ClientError> {
        self.ensure_not_disposed()?;
        self.release().await
    }

    /// Releases both channels and makes the client unusable. Disposing twice
    /// does nothing.
    pub async fn dispose(&mut self) -> Result<(), ClientError> {
        if self.is_disposed() {
            return Ok(());
        }
        let released = self.release().await;
        self.state = ClientState::Disposed;
        debug!("Client disposed");
        released
    }

    async fn release(&mut self) -> Result<(), ClientError> {
        let control = self.control.disconnect().await;
        let data = self.capture.disconnect().await;
        self.state = ClientState::Disconnected;

        if let Err(e) = &control {
            error!("Failed to close control channel: {e}");
        }
        if let Err(e) = &data {
            error!("Failed to close data channel: {e}");
        }
        control?;
        data?;
        info!("Disconnected from the receiver");
        Ok(())
    }

    pub async fn set_receiver_state(
        &mut self,
        state: ReceiverState,
        data_mode: DataMode,
        capture_mode: CaptureMode,
        fifo_sample_count: u8,
    ) -> Result<OperationResult, ClientError> {
        self.ensure_not_disposed()?;
        Ok(self
            .control
            .set_receiver_state(state, data_mode, capture_mode, fifo_sample_count)
            .await?)
    }

    /// Tunes `channel` to `frequency_hz`.
    ///
    /// # Errors
    /// `ClientError::FrequencyOutOfRange` for 0 or anything above 40 bits,
    /// checked before any I/O.
    pub async fn set_frequency(&mut self, channel: ChannelId, frequency_hz: u64) -> Result<OperationResult, ClientError> {
        self.ensure_not_disposed()?;
        let frequency = FrequencyHz::new(frequency_hz)?;
        Ok(self.control.set_frequency(channel, frequency).await?)
    }

    /// Streams IQ payload into `sink` until `cancel` fires.
    ///
    /// Returns `false` without touching the data channel when the client has
    /// not been connected yet. The data channel is opened on first use.
    pub async fn capture(&mut self, cancel: &mut watch::Receiver<bool>, sink: &mut dyn Sink) -> Result<bool, ClientError> {
        self.ensure_not_disposed()?;
        self.capture.reset_stats();
        let host = match &self.state {
            ClientState::Connected { host, .. } => host.clone(),
            _ => {
                warn!("Cannot capture before connecting to the receiver");
                return Ok(false);
            }
        };
        self.capture.connect(&host, self.udp_port).await?;
        Ok(self.capture.run_capture(cancel, sink).await?)
    }

    /// Like [`NetSdrClient::capture`], but creates the sink from `config` and
    /// removes the output again when nothing was saved.
    pub async fn capture_to(&mut self, config: SinkConfig, cancel: &mut watch::Receiver<bool>) -> Result<bool, ClientError> {
        self.ensure_not_disposed()?;
        if !matches!(self.state, ClientState::Connected { .. }) {
            warn!("Cannot capture before connecting to the receiver");
            return Ok(false);
        }

        let mut sink = sinks::from_config(config).await?;
        let outcome = self.capture(cancel, sink.as_mut()).await;
        let saved = match &outcome {
            Ok(saved) => *saved,
            Err(_) => self.capture.last_stats().saved_anything(),
        };
        if !saved {
            info!("No IQ data captured, discarding output");
            sink.discard().await?;
        }
        outcome
    }
}
