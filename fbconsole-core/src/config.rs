//! Console configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all) is a
//! valid configuration. CLI flags are applied on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConsoleError;

pub const SYSTEM_CONFIG_PATH: &str = "/etc/fbconsole/config.json";

const DEFAULT_FONT_PATHS: [&str; 2] = ["./fonts/console.ttf", "./fonts/console.otf"];
const MAX_FONT_SIZE: f32 = 200.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeTarget {
    pub name: String,
    pub host: String,
}

impl ProbeTarget {
    pub fn new(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: host.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    /// TrueType/OpenType file. `None` searches the default locations.
    pub path: Option<PathBuf>,
    /// Pixel height.
    pub size: f32,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            path: None,
            size: 20.0,
        }
    }
}

impl FontConfig {
    /// The configured font, or the first default location that exists.
    pub fn resolve_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.path {
            return Some(path.clone());
        }
        DEFAULT_FONT_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Framebuffer node. `None` probes /dev/fb0..fb2.
    pub device: Option<PathBuf>,
    pub font: FontConfig,
    pub refresh_interval_secs: u64,
    pub modal_timeout_secs: u64,
    pub shutdown_grace_ms: u64,
    /// Whether Ctrl+C / Ctrl+Z / Ctrl+\ / Ctrl+D shut the console down.
    pub exit_on_control_keys: bool,
    /// Clear ISIG so control keys arrive as bytes.
    pub deliver_control_bytes: bool,
    pub device_id_file: Option<PathBuf>,
    pub support_contact: Option<String>,
    pub services: Vec<String>,
    pub probe_targets: Vec<ProbeTarget>,
    pub log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: None,
            font: FontConfig::default(),
            refresh_interval_secs: 5,
            modal_timeout_secs: 30,
            shutdown_grace_ms: 1000,
            exit_on_control_keys: true,
            deliver_control_bytes: true,
            device_id_file: Some(PathBuf::from("/etc/machine-id")),
            support_contact: None,
            services: vec!["network".to_string(), "sshd".to_string()],
            probe_targets: vec![
                ProbeTarget::new("Gateway DNS", "8.8.8.8"),
                ProbeTarget::new("Cloudflare", "1.1.1.1"),
                ProbeTarget::new("Example", "example.com"),
            ],
            log_file: PathBuf::from("console.log"),
        }
    }
}

impl Config {
    pub fn from_json(raw: &str) -> Result<Self, ConsoleError> {
        let config: Config =
            serde_json::from_str(raw).map_err(|e| ConsoleError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConsoleError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConsoleError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    /// Load `explicit` if given, else the system file if present, else defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConsoleError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let system = Path::new(SYSTEM_CONFIG_PATH);
        if system.exists() {
            return Self::load(system);
        }
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), ConsoleError> {
        if self.refresh_interval_secs == 0 {
            return Err(ConsoleError::Config(
                "refresh_interval_secs must be positive".into(),
            ));
        }
        if self.modal_timeout_secs == 0 {
            return Err(ConsoleError::Config(
                "modal_timeout_secs must be positive".into(),
            ));
        }
        if !(self.font.size > 0.0 && self.font.size <= MAX_FONT_SIZE) {
            return Err(ConsoleError::Config(format!(
                "font size {} outside (0, {}]",
                self.font.size, MAX_FONT_SIZE
            )));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn modal_timeout(&self) -> Duration {
        Duration::from_secs(self.modal_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
