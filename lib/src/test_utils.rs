use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::errors::{NetworkError, SinkError};
use crate::network::udp::DatagramTransport;
use crate::sinks::Sink;

/// UDP stand-in that replays a fixed list of datagrams.
///
/// Once the script runs dry it optionally fires `cancel_when_drained` and then
/// blocks forever, like a socket with nothing left to deliver.
pub struct ScriptedDatagrams {
    script: VecDeque<Result<Vec<u8>, NetworkError>>,
    cancel_when_drained: Option<watch::Sender<bool>>,
}

impl ScriptedDatagrams {
    pub fn new(datagrams: Vec<Vec<u8>>) -> Self {
        Self {
            script: datagrams.into_iter().map(Ok).collect(),
            cancel_when_drained: None,
        }
    }

    pub fn then_fail(mut self, error: NetworkError) -> Self {
        self.script.push_back(Err(error));
        self
    }

    pub fn then_cancel(mut self, cancel: watch::Sender<bool>) -> Self {
        self.cancel_when_drained = Some(cancel);
        self
    }
}

#[async_trait]
impl DatagramTransport for ScriptedDatagrams {
    async fn connect(&mut self, _host: &str, _port: u16) -> Result<(), NetworkError> {
        Ok(())
    }

    async fn receive(&mut self) -> Result<Vec<u8>, NetworkError> {
        if let Some(next) = self.script.pop_front() {
            return next;
        }
        if let Some(cancel) = self.cancel_when_drained.take() {
            let _ = cancel.send(true);
        }
        std::future::pending().await
    }

    async fn close(&mut self) -> Result<(), NetworkError> {
        Ok(())
    }
}

/// In-memory sink recording every call made to it.
#[derive(Default, Debug)]
pub struct MemorySink {
    pub data: Vec<u8>,
    pub appends: usize,
    pub flushes: usize,
    pub closed: bool,
}

#[async_trait]
impl Sink for MemorySink {
    async fn append(&mut self, data: &[u8]) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        self.data.extend_from_slice(data);
        self.appends += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.flushes += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.closed = true;
        Ok(())
    }

    async fn discard(&mut self) -> Result<(), SinkError> {
        self.closed = true;
        self.data.clear();
        Ok(())
    }
}
