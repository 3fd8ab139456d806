//! Relay gateway server entry point.
//!
//! Keeps one session with the messaging network alive and exposes a small
//! HTTP API to drive it: connect, fetch the pairing code, send text messages,
//! disconnect, or reset everything and pair again.
//!
//! # Usage
//!
//! ```text
//! relay-server [OPTIONS]
//!
//! Options:
//!   --host <HOST>              HTTP bind address [default: 0.0.0.0]
//!   --port <PORT>              HTTP port [default: 3000]
//!   --session-dir <DIR>        Credential directory [default: ./sessions]
//!   --transport-url <URL>      Upstream WebSocket endpoint
//!   --address-suffix <SUFFIX>  Recipient address suffix [default: s.whatsapp.net]
//!   --config <FILE>            Optional TOML config file
//!   --no-terminal-qr           Log pairing codes instead of drawing them
//!   --log-level <FILTER>       tracing filter, e.g. `debug` or `relay_session=trace`
//! ```
//!
//! # Configuration precedence
//!
//! CLI flag, then `RELAY_*` environment variable, then the `--config` file,
//! then the built-in default.
//!
//! | Variable                    | Default                       |
//! |-----------------------------|-------------------------------|
//! | `RELAY_HOST`                | `0.0.0.0`                     |
//! | `RELAY_PORT`                | `3000`                        |
//! | `RELAY_SESSION_DIR`         | `sessions`                    |
//! | `RELAY_TRANSPORT_URL`       | `ws://127.0.0.1:8081/session` |
//! | `RELAY_ADDRESS_SUFFIX`      | `s.whatsapp.net`              |
//! | `RELAY_CONFIG`              | (none)                        |
//! | `RELAY_RECONNECT_ATTEMPTS`  | `5`                           |
//! | `RELAY_RECONNECT_INITIAL_MS`| `500`                         |
//! | `RELAY_RECONNECT_MAX_MS`    | `30000`                       |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use relay_server::domain::config::reconnect_policy;
use relay_server::domain::ServerConfig;
use relay_server::infrastructure::config_file::{load_config, FileConfig};
use relay_server::infrastructure::{build_router, serve, TerminalQrDisplay};
use relay_session::infrastructure::transport::websocket::WebSocketTransport;
use relay_session::{
    ConnectionSupervisor, CredentialStore, LogPairingDisplay, PairingDisplay, SessionService,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Single-session messaging relay gateway.
///
/// Every setting is optional so that unset flags fall through to the config
/// file and then to the built-in defaults.
#[derive(Debug, Parser)]
#[command(
    name = "relay-server",
    about = "HTTP gateway for a single messaging-network session",
    version
)]
struct Cli {
    /// IP address to bind the HTTP API to.
    #[arg(long, env = "RELAY_HOST")]
    host: Option<String>,

    /// TCP port for the HTTP API.
    #[arg(long, env = "RELAY_PORT")]
    port: Option<u16>,

    /// Directory holding the persisted session credentials.
    #[arg(long, env = "RELAY_SESSION_DIR")]
    session_dir: Option<PathBuf>,

    /// WebSocket URL of the upstream messaging endpoint.
    #[arg(long, env = "RELAY_TRANSPORT_URL")]
    transport_url: Option<String>,

    /// Suffix appended to normalised phone numbers.
    #[arg(long, env = "RELAY_ADDRESS_SUFFIX")]
    address_suffix: Option<String>,

    /// Path to a TOML config file.
    #[arg(long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Consecutive reconnect attempts before giving up.
    #[arg(long, env = "RELAY_RECONNECT_ATTEMPTS")]
    reconnect_attempts: Option<u32>,

    /// First reconnect back-off in milliseconds (doubles per attempt).
    #[arg(long, env = "RELAY_RECONNECT_INITIAL_MS")]
    reconnect_initial_ms: Option<u64>,

    /// Upper bound on the reconnect back-off in milliseconds.
    #[arg(long, env = "RELAY_RECONNECT_MAX_MS")]
    reconnect_max_ms: Option<u64>,

    /// Log pairing codes instead of rendering them as a terminal QR code.
    #[arg(long)]
    no_terminal_qr: bool,

    /// tracing filter directive.  Overrides `RUST_LOG`.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Layers the CLI arguments over the config file (if any) and the
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or the host and
    /// port do not form a valid socket address.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let file = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?,
            None => FileConfig::default(),
        };

        let host = self.host.unwrap_or(file.server.host);
        let port = self.port.unwrap_or(file.server.port);
        let bind_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("invalid HTTP bind address: '{host}:{port}'"))?;

        Ok(ServerConfig {
            bind_addr,
            session_dir: self.session_dir.unwrap_or(file.server.session_dir),
            transport_url: self.transport_url.unwrap_or(file.transport.url),
            address_suffix: self.address_suffix.unwrap_or(file.transport.address_suffix),
            reconnect: reconnect_policy(
                self.reconnect_attempts
                    .unwrap_or(file.reconnect.max_attempts),
                self.reconnect_initial_ms
                    .unwrap_or(file.reconnect.initial_delay_ms),
                self.reconnect_max_ms.unwrap_or(file.reconnect.max_delay_ms),
            ),
            terminal_qr: file.server.terminal_qr && !self.no_terminal_qr,
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ─────────────────────────────────────────────────────────
    let filter = match &cli.log_level {
        Some(directive) => EnvFilter::try_new(directive)
            .with_context(|| format!("invalid --log-level '{directive}'"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = cli.into_server_config()?;
    info!(
        "relay server starting — http={}, sessions={}, upstream={}",
        config.bind_addr,
        config.session_dir.display(),
        config.transport_url
    );

    // ── Session engine ────────────────────────────────────────────────────────
    let display: Arc<dyn PairingDisplay> = if config.terminal_qr {
        Arc::new(TerminalQrDisplay)
    } else {
        Arc::new(LogPairingDisplay)
    };
    let supervisor = ConnectionSupervisor::new(
        CredentialStore::new(&config.session_dir),
        Arc::new(WebSocketTransport::new(config.transport_url.clone())),
        display,
        config.supervisor_options(),
    );
    let service = Arc::new(SessionService::new(supervisor));

    // ── HTTP API ──────────────────────────────────────────────────────────────
    //
    // Ctrl+C stops accepting requests and lets in-flight ones finish.  The
    // live session is not logged out, so stored credentials stay valid for
    // the next start.
    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl+C — shutting down"),
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    };
    serve(config.bind_addr, build_router(service), shutdown).await?;

    info!("relay server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
