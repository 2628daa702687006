use std::path::PathBuf;

use clap::Parser;
use fbconsole_core::Config;

/// Unattended status console for the Linux framebuffer.
#[derive(Parser, Debug, Default, Clone)]
#[command(name = "fbconsole", version, about)]
pub struct Args {
    /// Keep running on Ctrl+C, Ctrl+Z, Ctrl+\ and Ctrl+D (and their signals)
    #[arg(short = 'd', long = "disable-exit")]
    pub disable_exit: bool,

    /// JSON configuration file (defaults to /etc/fbconsole/config.json when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Framebuffer device, e.g. /dev/fb0
    #[arg(long, value_name = "PATH")]
    pub device: Option<PathBuf>,

    /// Where log output goes
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Command-line flags win over anything the config file said.
    pub fn apply(&self, config: &mut Config) {
        if self.disable_exit {
            config.exit_on_control_keys = false;
        }
        if let Some(device) = &self.device {
            config.device = Some(device.clone());
        }
        if let Some(log_file) = &self.log_file {
            config.log_file = log_file.clone();
        }
    }
}
