//! relay-server library entry point.
//!
//! Exposes the HTTP adapter and configuration types so the integration tests
//! can drive the router without binding a socket.
//!
//! # Module structure
//!
//! ```text
//! relay_server
//! ├── domain/           Pure types (no I/O)
//! │   ├── config/       ServerConfig and defaults
//! │   └── messages/     JSON request/response bodies
//! └── infrastructure/   I/O adapters
//!     ├── http/         axum router over SessionService
//!     ├── config_file/  optional TOML file
//!     └── terminal_qr/  pairing code → terminal QR
//! ```

pub mod domain;
pub mod infrastructure;
