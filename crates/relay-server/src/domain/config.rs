//! Server configuration types.
//!
//! [`ServerConfig`] is the resolved set of runtime settings.  The binary
//! builds it from CLI arguments, environment variables, and an optional TOML
//! file (see `infrastructure::config_file`); tests build it from defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use relay_session::{ReconnectPolicy, SupervisorOptions};

/// Default HTTP listener address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Default session directory, relative to the working directory.
pub const DEFAULT_SESSION_DIR: &str = "sessions";

/// Default upstream endpoint for the WebSocket transport.
pub const DEFAULT_TRANSPORT_URL: &str = "ws://127.0.0.1:8081/session";

/// All runtime configuration for the relay server.
///
/// # Example
///
/// ```rust
/// use relay_server::domain::ServerConfig;
///
/// let cfg = ServerConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 3000);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address the HTTP API listens on.
    pub bind_addr: SocketAddr,

    /// Directory holding the persisted credential files.  Created on first
    /// connect if missing.
    pub session_dir: PathBuf,

    /// WebSocket URL of the upstream messaging endpoint.
    pub transport_url: String,

    /// Appended to normalised phone numbers (`digits@<suffix>`).
    pub address_suffix: String,

    /// Automatic reconnection after a transient close.
    pub reconnect: ReconnectPolicy,

    /// Render pairing codes as a QR code on stdout.  When `false` the code is
    /// only logged.
    pub terminal_qr: bool,
}

impl Default for ServerConfig {
    /// | Field          | Default                          |
    /// |----------------|----------------------------------|
    /// | bind_addr      | `0.0.0.0:3000`                   |
    /// | session_dir    | `sessions`                       |
    /// | transport_url  | `ws://127.0.0.1:8081/session`    |
    /// | address_suffix | `s.whatsapp.net`                 |
    /// | reconnect      | 5 attempts, 500 ms → 30 s        |
    /// | terminal_qr    | `true`                           |
    fn default() -> Self {
        Self {
            // Compile-time constant; always parses.
            bind_addr: DEFAULT_BIND_ADDR.parse().unwrap(),
            session_dir: PathBuf::from(DEFAULT_SESSION_DIR),
            transport_url: DEFAULT_TRANSPORT_URL.to_string(),
            address_suffix: relay_core::DEFAULT_ADDRESS_SUFFIX.to_string(),
            reconnect: ReconnectPolicy::default(),
            terminal_qr: true,
        }
    }
}

impl ServerConfig {
    /// Options handed to the connection supervisor.
    pub fn supervisor_options(&self) -> SupervisorOptions {
        SupervisorOptions {
            policy: self.reconnect,
            address_suffix: self.address_suffix.clone(),
            ..SupervisorOptions::default()
        }
    }
}

/// Convenience for building a [`ReconnectPolicy`] from millisecond values.
pub fn reconnect_policy(max_attempts: u32, initial_ms: u64, max_ms: u64) -> ReconnectPolicy {
    ReconnectPolicy {
        max_attempts,
        initial_delay: Duration::from_millis(initial_ms),
        max_delay: Duration::from_millis(max_ms),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port_is_3000() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr.port(), 3000);
    }

    #[test]
    fn test_default_host_binds_all_interfaces() {
        let cfg = ServerConfig::default();
        assert!(cfg.bind_addr.ip().is_unspecified());
    }

    #[test]
    fn test_default_session_dir_is_relative_sessions() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.session_dir, PathBuf::from("sessions"));
    }

    #[test]
    fn test_supervisor_options_carry_suffix_and_policy() {
        // Arrange
        let cfg = ServerConfig {
            address_suffix: "c.example".to_string(),
            reconnect: reconnect_policy(2, 100, 1000),
            ..ServerConfig::default()
        };

        // Act
        let opts = cfg.supervisor_options();

        // Assert
        assert_eq!(opts.address_suffix, "c.example");
        assert_eq!(opts.policy.max_attempts, 2);
        assert_eq!(opts.policy.initial_delay, Duration::from_millis(100));
    }
}
