use std::path::PathBuf;

use argh::FromArgs;
use netsdr_lib::network::control_message::{CaptureMode, ChannelId, DataMode};
use simplelog::LevelFilter;

use crate::config::{ClientConfig, FromYaml};
use crate::errors::AppError;

/// Control and IQ capture client for NetSDR receivers
#[derive(FromArgs)]
pub struct Args {
    /// receiver address (default: 127.0.0.1)
    #[argh(option)]
    pub host: Option<String>,

    /// receiver TCP control port (default: 50000)
    #[argh(option)]
    pub tcp_port: Option<u16>,

    /// local UDP port IQ data arrives on (default: 60000)
    #[argh(option)]
    pub udp_port: Option<u16>,

    /// path to a YAML config file
    #[argh(option)]
    pub config: Option<PathBuf>,

    /// log level to use for terminal logging
    #[argh(option, default = "LevelFilter::Info")]
    pub level: LevelFilter,

    #[argh(subcommand)]
    pub subcommand: SubCommandsArgs,
}

impl Args {
    /// Loads the config file (if any) and lays the command line options over it.
    pub fn client_config(&self) -> Result<ClientConfig, AppError> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_yaml(path)?,
            None => ClientConfig::default(),
        };
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(tcp_port) = self.tcp_port {
            config.tcp_port = tcp_port;
        }
        if let Some(udp_port) = self.udp_port {
            config.settings.udp_port = udp_port;
        }
        Ok(config)
    }
}

#[derive(FromArgs)]
#[argh(subcommand)]
pub enum SubCommandsArgs {
    Start(StartSubcommandArgs),
    Stop(StopSubcommandArgs),
    Freq(FreqSubcommandArgs),
    Capture(CaptureSubcommandArgs),
    Interactive(InteractiveSubcommandArgs),
}

/// Put the receiver into run state
#[derive(FromArgs)]
#[argh(subcommand, name = "start")]
pub struct StartSubcommandArgs {
    /// data mode: ad or iq (default: from config)
    #[argh(option)]
    pub data_mode: Option<DataMode>,

    /// capture mode: contiguous16, contiguous24, fifo16, triggered16 or triggered24 (default: from config)
    #[argh(option)]
    pub capture_mode: Option<CaptureMode>,

    /// number of FIFO sample blocks, only used with fifo16 (default: 0)
    #[argh(option, default = "0")]
    pub fifo_count: u8,
}

/// Put the receiver into stop state
#[derive(FromArgs)]
#[argh(subcommand, name = "stop")]
pub struct StopSubcommandArgs {}

/// Tune the receiver
#[derive(FromArgs)]
#[argh(subcommand, name = "freq")]
pub struct FreqSubcommandArgs {
    /// frequency in Hz
    #[argh(positional)]
    pub hz: u64,

    /// channel: 1, 2 or all (default: 1)
    #[argh(option, default = "ChannelId::Channel1")]
    pub channel: ChannelId,
}

/// Record IQ data to a file until Ctrl-C (or the optional duration)
#[derive(FromArgs)]
#[argh(subcommand, name = "capture")]
pub struct CaptureSubcommandArgs {
    /// output file (default: iq_<timestamp>.bin in the configured output dir)
    #[argh(option)]
    pub output: Option<PathBuf>,

    /// stop after this many seconds
    #[argh(option)]
    pub seconds: Option<u64>,

    /// start the receiver before capturing and stop it afterwards
    #[argh(switch)]
    pub run: bool,
}

/// Read commands from stdin
#[derive(FromArgs)]
#[argh(subcommand, name = "interactive")]
pub struct InteractiveSubcommandArgs {}
