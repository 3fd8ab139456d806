//! Optional TOML configuration file.
//!
//! Every key is optional; a missing key falls back to the built-in default.
//! Command-line flags and `RELAY_*` environment variables override the file.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3000
//! session_dir = "/var/lib/relay/sessions"
//! terminal_qr = false
//!
//! [transport]
//! url = "wss://upstream.example/session"
//! address_suffix = "s.whatsapp.net"
//!
//! [reconnect]
//! max_attempts = 5
//! initial_delay_ms = 500
//! max_delay_ms = 30000
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::{DEFAULT_SESSION_DIR, DEFAULT_TRANSPORT_URL};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Schema ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub transport: TransportSection,
    #[serde(default)]
    pub reconnect: ReconnectSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,
    #[serde(default = "default_true")]
    pub terminal_qr: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransportSection {
    #[serde(default = "default_transport_url")]
    pub url: String,
    #[serde(default = "default_address_suffix")]
    pub address_suffix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconnectSection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_session_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SESSION_DIR)
}
fn default_true() -> bool {
    true
}
fn default_transport_url() -> String {
    DEFAULT_TRANSPORT_URL.to_string()
}
fn default_address_suffix() -> String {
    relay_core::DEFAULT_ADDRESS_SUFFIX.to_string()
}
fn default_max_attempts() -> u32 {
    5
}
fn default_initial_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            session_dir: default_session_dir(),
            terminal_qr: default_true(),
        }
    }
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            url: default_transport_url(),
            address_suffix: default_address_suffix(),
        }
    }
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Reads and parses the config file at `path`.
///
/// Unlike the session directory, an explicitly named config file must exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}
