//! Capture Session
//! ---------------
//!
//! Reads IQ datagrams from the data channel, strips the 4 byte header and
//! streams the payload into a [`Sink`] until cancelled.
//!
//! Cancellation is a `watch::Receiver<bool>`; the loop stops once it reads
//! `true` or once every sender is gone. A pending receive is raced against the
//! signal, so a quiet receiver never holds the caller hostage. A datagram that
//! was already read is always written before the loop looks at the signal again.

use log::{debug, info, trace};
use tokio::sync::watch;

use crate::errors::{CaptureError, NetworkError};
use crate::network::tcp::client::LinkState;
use crate::network::udp::DatagramTransport;
use crate::sinks::Sink;

pub const DATAGRAM_HEADER_LEN: usize = 4;

/// Counters collected over one capture run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CaptureStats {
    pub datagrams_written: u64,
    pub datagrams_dropped: u64,
    pub payload_bytes: u64,
}

impl CaptureStats {
    pub fn saved_anything(&self) -> bool {
        self.datagrams_written > 0
    }
}

pub struct CaptureSession {
    transport: Box<dyn DatagramTransport>,
    state: LinkState,
    last_stats: CaptureStats,
}

impl CaptureSession {
    pub fn new(transport: Box<dyn DatagramTransport>) -> Self {
        Self {
            transport,
            state: LinkState::Disconnected,
            last_stats: CaptureStats::default(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// Counters of the most recent capture run, including one that failed.
    pub fn last_stats(&self) -> CaptureStats {
        self.last_stats
    }

    /// Forgets the counters of the previous run.
    pub fn reset_stats(&mut self) {
        self.last_stats = CaptureStats::default();
    }

    /// Opens the data channel. Does nothing when already connected.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<(), NetworkError> {
        if self.is_connected() {
            debug!("Data channel already open, skipping connect");
            return Ok(());
        }
        self.transport.connect(host, port).await?;
        self.state = LinkState::Connected;
        Ok(())
    }

    pub async fn disconnect(&mut self) -> Result<(), NetworkError> {
        if !self.is_connected() {
            return Ok(());
        }
        self.state = LinkState::Disconnected;
        self.transport.close().await
    }

    /// Runs the capture loop until `cancel` fires.
    ///
    /// Returns `true` if at least one payload made it into `sink`. The sink is
    /// closed on every exit path; errors other than cancellation are returned
    /// after that.
    ///
    /// # Errors
    /// Returns a `CaptureError` if the data channel is not connected, a
    /// receive fails, or the sink fails.
    pub async fn run_capture(&mut self, cancel: &mut watch::Receiver<bool>, sink: &mut dyn Sink) -> Result<bool, CaptureError> {
        self.reset_stats();
        if !self.is_connected() {
            return Err(NetworkError::NotConnected.into());
        }

        let mut stats = CaptureStats::default();
        let outcome = self.capture_loop(cancel, sink, &mut stats).await;
        let closed = sink.close().await;
        self.last_stats = stats;

        info!(
            "Capture finished: {} datagrams written ({} payload bytes), {} header-only dropped",
            stats.datagrams_written, stats.payload_bytes, stats.datagrams_dropped
        );

        outcome?;
        closed?;
        Ok(stats.saved_anything())
    }

    async fn capture_loop(
        &mut self,
        cancel: &mut watch::Receiver<bool>,
        sink: &mut dyn Sink,
        stats: &mut CaptureStats,
    ) -> Result<(), CaptureError> {
        loop {
            if *cancel.borrow_and_update() {
                debug!("Capture cancelled");
                return Ok(());
            }

            let datagram = tokio::select! {
                biased;
                changed = cancel.changed() => {
                    if changed.is_err() {
                        debug!("Cancellation sender dropped, stopping capture");
                        return Ok(());
                    }
                    continue;
                }
                received = self.transport.receive() => received?,
            };

            if datagram.len() <= DATAGRAM_HEADER_LEN {
                trace!("Dropping header-only datagram of {} bytes", datagram.len());
                stats.datagrams_dropped += 1;
                continue;
            }

            let payload = &datagram[DATAGRAM_HEADER_LEN..];
            sink.append(payload).await?;
            sink.flush().await?;
            stats.datagrams_written += 1;
            stats.payload_bytes += payload.len() as u64;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::errors::SinkError;
    use crate::network::udp::MockDatagramTransport;
    use crate::test_utils::{MemorySink, ScriptedDatagrams};

    async fn connected(transport: impl DatagramTransport + 'static) -> CaptureSession {
        let mut session = CaptureSession::new(Box::new(transport));
        session.connect("10.0.0.5", 60000).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_strips_header_and_drops_header_only_datagrams() {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let source = ScriptedDatagrams::new(vec![vec![0xAA, 0xBB, 0xCC, 0xDD, 1, 2, 3], vec![0xAA, 0xBB, 0xCC, 0xDD]])
            .then_cancel(cancel_tx);
        let mut session = connected(source).await;
        let mut sink = MemorySink::default();

        let saved = session.run_capture(&mut cancel_rx, &mut sink).await.unwrap();

        assert!(saved);
        assert_eq!(sink.data, vec![1, 2, 3]);
        assert_eq!(sink.appends, 1);
        assert_eq!(sink.flushes, 1);
        assert!(sink.closed);
    }

    #[tokio::test]
    async fn test_cancel_before_any_datagram() {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let mut session = connected(ScriptedDatagrams::new(vec![])).await;
        let mut sink = MemorySink::default();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel_tx.send(true).unwrap();
            cancel_tx
        });

        let saved = tokio::time::timeout(Duration::from_secs(5), session.run_capture(&mut cancel_rx, &mut sink))
            .await
            .expect("capture must stop on cancellation")
            .unwrap();
        canceller.await.unwrap();

        assert!(!saved);
        assert!(sink.data.is_empty());
        assert!(sink.closed);
    }

    #[tokio::test]
    async fn test_already_cancelled_signal_reads_nothing() {
        let (_cancel_tx, mut cancel_rx) = watch::channel(true);
        let mut session = connected(ScriptedDatagrams::new(vec![vec![0, 0, 0, 0, 42]])).await;
        let mut sink = MemorySink::default();

        assert!(!session.run_capture(&mut cancel_rx, &mut sink).await.unwrap());
        assert_eq!(sink.appends, 0);
    }

    #[tokio::test]
    async fn test_dropped_sender_stops_capture() {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        drop(cancel_tx);
        let mut session = connected(ScriptedDatagrams::new(vec![])).await;
        let mut sink = MemorySink::default();

        let saved = tokio::time::timeout(Duration::from_secs(5), session.run_capture(&mut cancel_rx, &mut sink))
            .await
            .unwrap()
            .unwrap();
        assert!(!saved);
    }

    #[tokio::test]
    async fn test_every_payload_is_flushed_in_order() {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let source = ScriptedDatagrams::new(vec![
            vec![9, 9, 9, 9, 1, 2],
            vec![],
            vec![9, 9, 9, 9, 3],
            vec![9, 9, 9],
            vec![9, 9, 9, 9, 4, 5, 6],
        ])
        .then_cancel(cancel_tx);
        let mut session = connected(source).await;
        let mut sink = MemorySink::default();

        assert!(session.run_capture(&mut cancel_rx, &mut sink).await.unwrap());
        assert_eq!(sink.data, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(sink.flushes, 3);
    }

    #[tokio::test]
    async fn test_transport_fault_propagates_after_closing_sink() {
        let (_cancel_tx, mut cancel_rx) = watch::channel(false);
        let source = ScriptedDatagrams::new(vec![vec![0, 0, 0, 0, 7]]).then_fail(NetworkError::Closed);
        let mut session = connected(source).await;
        let mut sink = MemorySink::default();

        let result = session.run_capture(&mut cancel_rx, &mut sink).await;
        assert!(matches!(result, Err(CaptureError::Network(NetworkError::Closed))));
        assert!(sink.closed);
        assert_eq!(sink.data, vec![7]);
        assert_eq!(session.last_stats().datagrams_written, 1);
    }

    #[tokio::test]
    async fn test_sink_fault_propagates() {
        let (_cancel_tx, mut cancel_rx) = watch::channel(false);
        let mut session = connected(ScriptedDatagrams::new(vec![vec![0, 0, 0, 0, 1]])).await;
        let mut sink = MemorySink {
            closed: true,
            ..Default::default()
        };

        let result = session.run_capture(&mut cancel_rx, &mut sink).await;
        assert!(matches!(result, Err(CaptureError::Sink(SinkError::Closed))));
    }

    #[tokio::test]
    async fn test_stats_of_previous_run_do_not_leak() {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let source = ScriptedDatagrams::new(vec![vec![0, 0, 0, 0, 1, 2]]).then_cancel(cancel_tx);
        let mut session = connected(source).await;
        let mut sink = MemorySink::default();
        assert!(session.run_capture(&mut cancel_rx, &mut sink).await.unwrap());
        assert_eq!(session.last_stats().datagrams_written, 1);

        session.disconnect().await.unwrap();
        let mut sink = MemorySink::default();
        assert!(session.run_capture(&mut cancel_rx, &mut sink).await.is_err());
        assert_eq!(session.last_stats(), CaptureStats::default());
    }

    #[tokio::test]
    async fn test_capture_requires_connection() {
        let (_cancel_tx, mut cancel_rx) = watch::channel(false);
        let mut mock = MockDatagramTransport::new();
        mock.expect_receive().never();
        let mut session = CaptureSession::new(Box::new(mock));
        let mut sink = MemorySink::default();

        let result = session.run_capture(&mut cancel_rx, &mut sink).await;
        assert!(matches!(result, Err(CaptureError::Network(NetworkError::NotConnected))));
    }

    #[tokio::test]
    async fn test_connect_happens_once() {
        let mut mock = MockDatagramTransport::new();
        mock.expect_connect().times(1).returning(|_, _| Ok(()));
        mock.expect_close().times(1).returning(|| Ok(()));
        let mut session = CaptureSession::new(Box::new(mock));

        session.connect("10.0.0.5", 60000).await.unwrap();
        session.connect("10.0.0.5", 60000).await.unwrap();
        assert!(session.is_connected());
        session.disconnect().await.unwrap();
        session.disconnect().await.unwrap();
        assert!(!session.is_connected());
    }
}
