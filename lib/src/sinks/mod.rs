//! Sinks
//! -----
//!
//! Append-only byte sinks that captured payload is written to.

pub mod file;

use async_trait::async_trait;

use crate::errors::SinkError;

/// Sink configs that can be created from file.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum SinkConfig {
    File(file::FileConfig),
}

#[async_trait]
pub trait Sink: Send {
    /// Appends bytes verbatim to the end of the sink.
    async fn append(&mut self, data: &[u8]) -> Result<(), SinkError>;

    /// Pushes everything appended so far out of any userspace buffer.
    async fn flush(&mut self) -> Result<(), SinkError>;

    /// Flushes and releases the underlying resource. Closing twice is fine.
    async fn close(&mut self) -> Result<(), SinkError>;

    /// Releases the resource and removes whatever was produced.
    async fn discard(&mut self) -> Result<(), SinkError>;
}

/// Builds the sink described by `config`.
///
/// # Errors
///
/// Returns a `SinkError::Io` if the backing resource cannot be created.
pub async fn from_config(config: SinkConfig) -> Result<Box<dyn Sink>, SinkError> {
    let sink: Box<dyn Sink> = match config {
        SinkConfig::File(cfg) => Box::new(file::FileSink::new(cfg).await?),
    };
    Ok(sink)
}
