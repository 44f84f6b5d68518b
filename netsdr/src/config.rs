use std::path::{Path, PathBuf};

use netsdr_lib::client::ClientSettings;
use netsdr_lib::network::control_message::{CaptureMode, DataMode};
use netsdr_lib::network::tcp::DEFAULT_TCP_PORT;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

pub const DEFAULT_HOST: &str = "127.0.0.1";

/// A trait for parsing a YAML file into a struct using Serde.
pub trait FromYaml: Sized + for<'de> Deserialize<'de> {
    /// Loads an instance of the implementing type from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an `AppError::ConfigError` if the file cannot be read and an
    /// `AppError::YamlError` if its content does not deserialize.
    fn from_yaml(file: &Path) -> Result<Self, AppError> {
        let yaml = std::fs::read_to_string(file)
            .map_err(|e| AppError::ConfigError(format!("Failed to read YAML file: {}\n{}", file.display(), e)))?;
        Ok(serde_yaml::from_str(&yaml)?)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub tcp_port: u16,
    /// Directory capture files are written to when no explicit path is given.
    pub output_dir: PathBuf,
    /// Data mode used when starting the receiver without an explicit one.
    pub data_mode: DataMode,
    /// Capture mode used when starting the receiver without an explicit one.
    pub capture_mode: CaptureMode,
    #[serde(flatten)]
    pub settings: ClientSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            tcp_port: DEFAULT_TCP_PORT,
            output_dir: PathBuf::from("."),
            data_mode: DataMode::IQ,
            capture_mode: CaptureMode::Contiguous16Bit,
            settings: ClientSettings::default(),
        }
    }
}

impl FromYaml for ClientConfig {}
