use super::toml_config::{DaemonConfig, LogFormat};
use crate::domain::model::LockState;
use crate::utils::error::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "sphincterd")]
#[command(about = "Token-gated HTTP control daemon for the sphincter door lock")]
pub struct Args {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Serial device of the actuator, e.g. /dev/ttyACM0
    #[arg(short = 'p', long = "port")]
    pub device: Option<String>,

    /// Serial speed (baud)
    #[arg(short = 's', long = "speed")]
    pub baud_rate: Option<u32>,

    /// File with `identifier:sha256` token hashes
    #[arg(long)]
    pub hashfile: Option<String>,

    /// host:port to bind the HTTP server to
    #[arg(short, long)]
    pub bind: Option<String>,

    /// State reported before the first line was read from the device
    #[arg(long, value_enum)]
    pub initial_state: Option<LockState>,

    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Config file (if any) with command line overrides applied.
    pub fn into_config(self) -> Result<DaemonConfig> {
        let mut config = match &self.config {
            Some(path) => DaemonConfig::from_file(path)?,
            None => DaemonConfig::default(),
        };

        if let Some(device) = self.device {
            config.serial.device = Some(device);
        }
        if let Some(baud_rate) = self.baud_rate {
            config.serial.baud_rate = baud_rate;
        }
        if let Some(hashfile) = self.hashfile {
            config.tokens.hashfile = Some(hashfile);
        }
        if let Some(bind) = self.bind {
            config.http.bind = bind;
        }
        if let Some(state) = self.initial_state {
            config.serial.initial_state = state;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }

        Ok(config)
    }
}
