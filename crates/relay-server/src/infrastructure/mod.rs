//! Infrastructure layer for the relay server.
//!
//! - **`http`** – axum router, handlers, and the serve loop.
//! - **`config_file`** – optional TOML configuration file.
//! - **`terminal_qr`** – QR rendering of pairing codes on stdout.

pub mod config_file;
pub mod http;
pub mod terminal_qr;

pub use http::{build_router, serve};
pub use terminal_qr::TerminalQrDisplay;
