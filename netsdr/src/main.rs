//! # NetSDR Client Entry Point
//!
//! Parses the command line, sets up logging and hands the chosen subcommand
//! to [`commands::run`] on a multi-threaded tokio runtime.
//!
//! ## Modules
//!
//! - `cli`: Command-line interface parsing and argument handling.
//! - `commands`: One-shot subcommands (start, stop, freq, capture).
//! - `config`: YAML client configuration and defaults.
//! - `console`: Interactive stdin prompt.
//! - `errors`: Application level error type.

mod cli;
mod commands;
mod config;
mod console;
mod errors;

use std::fs::File;

use cli::Args;
use log::debug;
use simplelog::{ColorChoice, CombinedLogger, LevelFilter, TermLogger, TerminalMode, WriteLogger};
use tokio::runtime::Builder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Args = argh::from_env();

    CombinedLogger::init(vec![
        TermLogger::new(args.level, simplelog::ConfigBuilder::new().build(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(
            LevelFilter::Error,
            simplelog::ConfigBuilder::new().set_location_level(LevelFilter::Error).build(),
            File::create("netsdr.log")?,
        ),
    ])?;
    debug!("Parsed args and initialized CombinedLogger");

    let config = args.client_config()?;
    debug!("Using receiver {}:{} (udp {})", config.host, config.tcp_port, config.settings.udp_port);

    let runtime = Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(commands::run(args.subcommand, config))?;
    Ok(())
}
