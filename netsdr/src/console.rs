//! Interactive console
//! -------------------
//!
//! Line based command prompt on stdin. A running capture is ended with
//! `halt` or Ctrl-C; everything else waits until the capture is over.

use std::future::Future;

use log::{debug, warn};
use netsdr_lib::client::NetSdrClient;
use netsdr_lib::network::control_message::{CaptureMode, ChannelId, DataMode};
use netsdr_lib::sinks::SinkConfig;
use netsdr_lib::sinks::file::FileConfig;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::watch;

use crate::commands::{self, default_capture_path};
use crate::config::ClientConfig;
use crate::errors::AppError;

const HELP: &str = "commands:
  start [ad|iq] [contiguous16|contiguous24|fifo16|triggered16|triggered24] [fifo count]
  stop
  freq <hz> [1|2|all]
  capture [path]      (end with 'halt' or Ctrl-C)
  help
  quit";

#[derive(Debug, PartialEq)]
pub enum Command {
    Start {
        data_mode: Option<DataMode>,
        capture_mode: Option<CaptureMode>,
        fifo_count: u8,
    },
    Stop,
    Freq {
        hz: u64,
        channel: ChannelId,
    },
    Capture {
        path: Option<String>,
    },
    Halt,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("empty command".to_string());
    };
    let args: Vec<&str> = words.collect();

    match verb.to_ascii_lowercase().as_str() {
        "start" | "run" => Ok(Command::Start {
            data_mode: args.first().map(|s| s.parse()).transpose()?,
            capture_mode: args.get(1).map(|s| s.parse()).transpose()?,
            fifo_count: args
                .get(2)
                .map(|s| s.parse::<u8>().map_err(|e| format!("invalid fifo count '{s}': {e}")))
                .transpose()?
                .unwrap_or(0),
        }),
        "stop" => Ok(Command::Stop),
        "freq" | "f" => {
            let hz = args
                .first()
                .ok_or_else(|| "freq needs a frequency in Hz".to_string())?
                .parse::<u64>()
                .map_err(|e| format!("invalid frequency: {e}"))?;
            let channel = args.get(1).map(|s| s.parse()).transpose()?.unwrap_or_default();
            Ok(Command::Freq { hz, channel })
        }
        "capture" => Ok(Command::Capture {
            path: args.first().map(|s| s.to_string()),
        }),
        "halt" => Ok(Command::Halt),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(format!("unknown command '{other}', type 'help'")),
    }
}

pub async fn run(client: &mut NetSdrClient, config: &ClientConfig) -> Result<(), AppError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{HELP}");

    loop {
        let Some(line) = lines.next_line().await? else {
            debug!("stdin closed, leaving console");
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        // Protocol-level failures are printed by `report`; usage errors are
        // printed here so one bad line does not end the session.
        let outcome = match command {
            Command::Start {
                data_mode,
                capture_mode,
                fifo_count,
            } => {
                commands::start(
                    client,
                    data_mode.unwrap_or(config.data_mode),
                    capture_mode.unwrap_or(config.capture_mode),
                    fifo_count,
                )
                .await
            }
            Command::Stop => commands::stop(client).await,
            Command::Freq { hz, channel } => commands::tune(client, channel, hz).await,
            Command::Capture { path } => capture(client, config, path, &mut lines).await,
            Command::Halt => {
                println!("no capture running");
                Ok(())
            }
            Command::Help => {
                println!("{HELP}");
                Ok(())
            }
            Command::Quit => return Ok(()),
        };

        if let Err(e) = outcome {
            warn!("Command failed: {e}");
            println!("error: {e}");
        }
    }
}

async fn capture(
    client: &mut NetSdrClient,
    config: &ClientConfig,
    path: Option<String>,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<(), AppError> {
    let path = path.map(Into::into).unwrap_or_else(|| default_capture_path(config));
    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    println!("Capturing to {} (type 'halt' to stop)", path.display());

    let capture = client.capture_to(SinkConfig::File(FileConfig { file: path.clone() }), &mut cancel_rx);
    let saved = wait_for_capture(capture, &cancel_tx, lines).await?;

    if saved {
        println!("Saved IQ data to {}", path.display());
    } else {
        println!("No IQ data received, nothing saved");
    }
    Ok(())
}

/// Drives `capture` to completion while watching `lines` for `halt` and the
/// process for Ctrl-C. Once input is exhausted it is no longer read.
async fn wait_for_capture<F, R>(capture: F, cancel_tx: &watch::Sender<bool>, lines: &mut Lines<R>) -> F::Output
where
    F: Future,
    R: AsyncBufRead + Unpin,
{
    tokio::pin!(capture);
    let mut input_open = true;

    loop {
        tokio::select! {
            output = &mut capture => return output,
            _ = tokio::signal::ctrl_c() => {
                let _ = cancel_tx.send(true);
            }
            line = lines.next_line(), if input_open => match line {
                Ok(Some(line)) if matches!(parse_command(&line), Ok(Command::Halt)) => {
                    let _ = cancel_tx.send(true);
                }
                Ok(Some(_)) => println!("capture running, type 'halt' first"),
                Ok(None) => {
                    debug!("stdin closed during capture, stopping it");
                    input_open = false;
                    let _ = cancel_tx.send(true);
                }
                Err(e) => {
                    warn!("Failed to read stdin during capture: {e}");
                    input_open = false;
                    let _ = cancel_tx.send(true);
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};
    use std::time::Duration;

    use tokio::io::{AsyncRead, ReadBuf};

    use super::*;

    /// Reader that is always at end of input and counts how often it is polled.
    struct CountingEof(Arc<AtomicUsize>);

    impl AsyncRead for CountingEof {
        fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Poll::Ready(Ok(()))
        }
    }

    fn capture_until_cancelled(mut cancel_rx: watch::Receiver<bool>) -> impl Future<Output = u32> {
        async move {
            let _ = cancel_rx.wait_for(|cancelled| *cancelled).await;
            tokio::time::sleep(Duration::from_millis(50)).await;
            7
        }
    }

    #[tokio::test]
    async fn test_closed_input_cancels_once_and_stops_reading() {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let reads = Arc::new(AtomicUsize::new(0));
        let mut lines = BufReader::new(CountingEof(reads.clone())).lines();

        let output = wait_for_capture(capture_until_cancelled(cancel_rx), &cancel_tx, &mut lines).await;

        assert_eq!(output, 7);
        assert!(*cancel_tx.borrow());
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_halt_line_cancels_capture() {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let input: &[u8] = b"freq 5\nhalt\n";
        let mut lines = BufReader::new(input).lines();

        let output = wait_for_capture(capture_until_cancelled(cancel_rx), &cancel_tx, &mut lines).await;

        assert_eq!(output, 7);
        assert!(*cancel_tx.borrow());
    }

    #[test]
    fn test_parse_start_variants() {
        assert_eq!(parse_command("start").unwrap(), Command::Start {
            data_mode: None,
            capture_mode: None,
            fifo_count: 0,
        });
        assert_eq!(parse_command("start iq fifo16 8").unwrap(), Command::Start {
            data_mode: Some(DataMode::IQ),
            capture_mode: Some(CaptureMode::Fifo16Bit),
            fifo_count: 8,
        });
        assert!(parse_command("start xx").is_err());
        assert!(parse_command("start iq fifo16 300").is_err());
    }

    #[test]
    fn test_parse_freq() {
        assert_eq!(parse_command("freq 7074000").unwrap(), Command::Freq {
            hz: 7_074_000,
            channel: ChannelId::Channel1,
        });
        assert_eq!(parse_command("FREQ 100 all").unwrap(), Command::Freq {
            hz: 100,
            channel: ChannelId::All,
        });
        assert!(parse_command("freq").is_err());
        assert!(parse_command("freq -5").is_err());
    }

    #[test]
    fn test_parse_misc() {
        assert_eq!(parse_command("  stop ").unwrap(), Command::Stop);
        assert_eq!(parse_command("capture out.bin").unwrap(), Command::Capture {
            path: Some("out.bin".to_string())
        });
        assert_eq!(parse_command("halt").unwrap(), Command::Halt);
        assert_eq!(parse_command("quit").unwrap(), Command::Quit);
        assert!(parse_command("").is_err());
        assert!(parse_command("tune 5").is_err());
    }
}
