//! Domain layer for the relay server: configuration and the JSON shapes of
//! the HTTP API.

pub mod config;
pub mod messages;

pub use config::ServerConfig;
