//! Subcommand execution against a connected client.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use log::{error, info, warn};
use netsdr_lib::client::{NetSdrClient, OperationResult};
use netsdr_lib::errors::ClientError;
use netsdr_lib::network::control_message::{CaptureMode, ChannelId, DataMode, ReceiverState};
use netsdr_lib::sinks::SinkConfig;
use netsdr_lib::sinks::file::FileConfig;
use tokio::sync::watch;

use crate::cli::{CaptureSubcommandArgs, SubCommandsArgs};
use crate::config::ClientConfig;
use crate::console;
use crate::errors::AppError;

pub async fn run(subcommand: SubCommandsArgs, config: ClientConfig) -> Result<(), AppError> {
    let mut client = NetSdrClient::with_settings(&config.settings);
    client.connect(&config.host, config.tcp_port).await?;

    let outcome = dispatch(&mut client, subcommand, &config).await;
    if let Err(e) = client.dispose().await {
        warn!("Failed to release connections cleanly: {e}");
    }
    outcome
}

async fn dispatch(client: &mut NetSdrClient, subcommand: SubCommandsArgs, config: &ClientConfig) -> Result<(), AppError> {
    match subcommand {
        SubCommandsArgs::Start(args) => {
            let data_mode = args.data_mode.unwrap_or(config.data_mode);
            let capture_mode = args.capture_mode.unwrap_or(config.capture_mode);
            start(client, data_mode, capture_mode, args.fifo_count).await
        }
        SubCommandsArgs::Stop(_) => stop(client).await,
        SubCommandsArgs::Freq(args) => tune(client, args.channel, args.hz).await,
        SubCommandsArgs::Capture(args) => capture(client, args, config).await,
        SubCommandsArgs::Interactive(_) => console::run(client, config).await,
    }
}

pub async fn start(client: &mut NetSdrClient, data_mode: DataMode, capture_mode: CaptureMode, fifo_count: u8) -> Result<(), AppError> {
    let result = client
        .set_receiver_state(ReceiverState::Run, data_mode, capture_mode, fifo_count)
        .await?;
    report("start", &result);
    Ok(())
}

pub async fn stop(client: &mut NetSdrClient) -> Result<(), AppError> {
    let result = client
        .set_receiver_state(ReceiverState::Stop, DataMode::AD, CaptureMode::Contiguous16Bit, 0)
        .await?;
    report("stop", &result);
    Ok(())
}

pub async fn tune(client: &mut NetSdrClient, channel: ChannelId, hz: u64) -> Result<(), AppError> {
    let result = client.set_frequency(channel, hz).await?;
    report("freq", &result);
    Ok(())
}

async fn capture(client: &mut NetSdrClient, args: CaptureSubcommandArgs, config: &ClientConfig) -> Result<(), AppError> {
    let path = args.output.unwrap_or_else(|| default_capture_path(config));
    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    let limit = args.seconds.map(Duration::from_secs);

    tokio::spawn(async move {
        match limit {
            Some(limit) => tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = tokio::time::sleep(limit) => {}
            },
            None => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
        let _ = cancel_tx.send(true);
    });

    if args.run {
        start(client, config.data_mode, config.capture_mode, 0).await?;
    }

    println!("Capturing to {} (Ctrl-C to stop)", path.display());
    let saved = client
        .capture_to(SinkConfig::File(FileConfig { file: path.clone() }), &mut cancel_rx)
        .await;

    let stopped = if args.run { stop(client).await } else { Ok(()) };

    if settle_capture(saved, stopped)? {
        println!("Saved IQ data to {}", path.display());
    } else {
        println!("No IQ data received, nothing saved");
    }
    Ok(())
}

/// Picks the error to report when both the capture and the following stop
/// may have failed. The capture error wins; a stop error alongside it is logged.
fn settle_capture(saved: Result<bool, ClientError>, stopped: Result<(), AppError>) -> Result<bool, AppError> {
    match (saved, stopped) {
        (Ok(saved), Ok(())) => Ok(saved),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e.into()),
        (Err(e), Err(stop_err)) => {
            error!("Failed to stop the receiver after the capture failed: {stop_err}");
            Err(e.into())
        }
    }
}

pub fn default_capture_path(config: &ClientConfig) -> PathBuf {
    let name = format!("iq_{}.bin", Utc::now().format("%Y%m%d_%H%M%S"));
    config.output_dir.join(name)
}

pub fn report(command: &str, result: &OperationResult) {
    if result.success {
        info!("{command}: acknowledged");
        println!("{command}: OK");
        return;
    }
    let message = result.error_message.as_deref().unwrap_or("unknown failure");
    match &result.raw_response {
        Some(raw) => println!("{command}: FAILED - {message} (response: {raw:02X?})"),
        None => println!("{command}: FAILED - {message}"),
    }
}
