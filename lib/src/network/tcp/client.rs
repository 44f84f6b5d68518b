//! Control Client
//! --------------
//!
//! Drives the request/response exchange with the receiver over the TCP
//! control channel. Every call sends exactly one message and consumes
//! exactly one reply; requests are never pipelined.

use log::{debug, info, warn};

use crate::errors::NetworkError;
use crate::network::control_message::{
    CaptureMode, ChannelId, ControlSetting, DataMode, FrequencyHz, ReceiverState, ResponseKind, classify_response,
};
use crate::network::tcp::ControlTransport;

pub const NOT_CONNECTED_MESSAGE: &str = "Not connected to the receiver.";

/// Outcome of a single control operation.
///
/// A failed result means the device (or the session) said no; it is not an
/// error in the Rust sense and carries whatever the device answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub success: bool,
    pub error_message: Option<String>,
    pub raw_response: Option<Vec<u8>>,
}

impl OperationResult {
    pub fn succeeded(raw_response: Vec<u8>) -> Self {
        Self {
            success: true,
            error_message: None,
            raw_response: Some(raw_response),
        }
    }

    pub fn failed(message: impl Into<String>, raw_response: Option<Vec<u8>>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            raw_response,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
}

pub struct ControlClient {
    transport: Box<dyn ControlTransport>,
    state: LinkState,
}

impl ControlClient {
    pub fn new(transport: Box<dyn ControlTransport>) -> Self {
        Self {
            transport,
            state: LinkState::Disconnected,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// Opens the control channel. Does nothing when already connected.
    ///
    /// # Errors
    /// Returns a `NetworkError` if the transport fails to connect.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<(), NetworkError> {
        if self.is_connected() {
            debug!("Control channel already open, skipping connect");
            return Ok(());
        }
        self.transport.connect(host, port).await?;
        self.state = LinkState::Connected;
        info!("Control channel connected to {host}:{port}");
        Ok(())
    }

    /// Closes the control channel. The session counts as disconnected even if
    /// the transport reports an error while closing.
    pub async fn disconnect(&mut self) -> Result<(), NetworkError> {
        if !self.is_connected() {
            return Ok(());
        }
        self.state = LinkState::Disconnected;
        self.transport.close().await
    }

    pub async fn set_receiver_state(
        &mut self,
        state: ReceiverState,
        data_mode: DataMode,
        capture_mode: CaptureMode,
        fifo_sample_count: u8,
    ) -> Result<OperationResult, NetworkError> {
        self.execute(ControlSetting::receiver_state(state, data_mode, capture_mode, fifo_sample_count))
            .await
    }

    pub async fn set_frequency(&mut self, channel: ChannelId, frequency: FrequencyHz) -> Result<OperationResult, NetworkError> {
        self.execute(ControlSetting::Frequency { channel, frequency }).await
    }

    async fn execute(&mut self, setting: ControlSetting) -> Result<OperationResult, NetworkError> {
        if !self.is_connected() {
            warn!("Cannot apply {:?}: {NOT_CONNECTED_MESSAGE}", setting.item());
            return Ok(OperationResult::failed(NOT_CONNECTED_MESSAGE, None));
        }

        let request = setting.encode();
        debug!("Sending {setting:?} as {:02X?}", request.as_bytes());

        // A failed exchange can leave a reply (or part of one) in flight, so the
        // link is torn down and the next call has to reconnect.
        let response = match self.exchange(request.as_bytes()).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Control exchange failed, dropping link: {e}");
                self.state = LinkState::Disconnected;
                if let Err(close_err) = self.transport.close().await {
                    debug!("Ignoring close failure on broken link: {close_err}");
                }
                return Err(e);
            }
        };

        let kind = classify_response(&request, Some(&response));
        match kind.error_message(request.item()) {
            None => {
                debug!("Device acknowledged {:?}", request.item());
                Ok(OperationResult::succeeded(response))
            }
            Some(message) => {
                if kind == ResponseKind::NegativeAcknowledged {
                    warn!("Device rejected {:?}: {message}", request.item());
                } else {
                    warn!("Unexpected response to {:?}: {response:02X?}", request.item());
                }
                Ok(OperationResult::failed(message, Some(response)))
            }
        }
    }

    async fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, NetworkError> {
        self.transport.send(request).await?;
        self.transport.receive().await
    }
}
