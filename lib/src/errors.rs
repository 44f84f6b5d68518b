use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to resolve address {0}")]
    InvalidAddress(String),

    #[error("Connection closed by peer")]
    Closed,

    #[error("Transport is not connected")]
    NotConnected,

    #[error("Communication timed out")]
    Timeout(#[from] tokio::time::error::Elapsed),
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sink already closed")]
    Closed,
}

/// Errors raised to the caller of the client.
///
/// Only contract violations and transport faults end up here. A device
/// that rejects a command, or a client that is simply not connected yet,
/// is reported through [`crate::client::OperationResult`] instead.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Frequency {0} Hz is out of range (must be 1..=0xFFFFFFFFFF)")]
    FrequencyOutOfRange(u64),

    #[error("Client has been disposed")]
    Disposed,

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

impl From<CaptureError> for ClientError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::Network(e) => ClientError::Network(e),
            CaptureError::Sink(e) => ClientError::Sink(e),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("Message too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    #[error("Length field says {declared} bytes but message has {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Unknown control item code: 0x{0:02X}")]
    UnknownItem(u8),

    #[error("Invalid value 0x{value:02X} for {field}")]
    InvalidValue { field: &'static str, value: u8 },
}
