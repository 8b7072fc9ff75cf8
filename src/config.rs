//! `config.toml` loading, grounded on `CLI/src/config.rs`'s load-or-template
//! behavior and `src-tauri/src/runtime/config.rs`'s typed, default-filled
//! `Config` struct.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

fn default_discovery_port() -> u16 {
    4444
}

fn default_session_port() -> u16 {
    8888
}

fn default_max_frame_bytes() -> u64 {
    16 * 1024 * 1024 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Human-friendly label advertised in the discovery datagram. Defaults
    /// to the system hostname when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,

    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,

    #[serde(default = "default_session_port")]
    pub session_port: u16,

    /// Directory incoming files/directories are written under. Defaults to
    /// the user's desktop directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_root: Option<PathBuf>,

    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_name: None,
            discovery_port: default_discovery_port(),
            session_port: default_session_port(),
            destination_root: None,
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl Config {
    /// Load `config.toml` from `dir`, writing a commented template and
    /// returning defaults when the file does not yet exist.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_file = dir.join("config.toml");
        if !config_file.exists() {
            fs::create_dir_all(dir).context("creating config directory")?;
            fs::write(&config_file, TEMPLATE).context("writing default config.toml")?;
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&config_file).context("reading config.toml")?;
        let cfg: Config = toml::from_str(&content).context("parsing config.toml")?;
        Ok(cfg)
    }

    /// Directory incoming transfers are written under, resolving the
    /// default lazily so tests can override it without touching the real
    /// desktop directory.
    pub fn destination_root(&self) -> PathBuf {
        self.destination_root
            .clone()
            .unwrap_or_else(default_desktop_dir)
    }
}

fn default_desktop_dir() -> PathBuf {
    dirs::desktop_dir().unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
}

/// Default config directory: platform config dir, `lanshare` subfolder.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lanshare")
}

const TEMPLATE: &str = "# lanshare configuration\n\
# device_name = \"my-laptop\"   # defaults to the system hostname\n\
# discovery_port = 4444\n\
# session_port = 8888\n\
# destination_root = \"/home/me/Desktop\"\n\
# max_frame_bytes = 17179869184\n";
