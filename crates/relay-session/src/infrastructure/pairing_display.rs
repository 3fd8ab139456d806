//! Side channel for showing pairing codes to a human.
//!
//! The supervisor calls [`PairingDisplay::show`] after storing a new pairing
//! code, outside its exclusive section.  A failing display is logged and
//! otherwise ignored; it never affects the connection state.

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
#[error("pairing display failed: {0}")]
pub struct DisplayError(pub String);

/// Trait abstracting where pairing codes are shown.
///
/// The server renders a QR code to the terminal; tests use a mock.
#[cfg_attr(test, mockall::automock)]
pub trait PairingDisplay: Send + Sync {
    fn show(&self, code: &str) -> Result<(), DisplayError>;
}

/// Writes the raw pairing code to the log.  Used when terminal rendering is
/// disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPairingDisplay;

impl PairingDisplay for LogPairingDisplay {
    fn show(&self, code: &str) -> Result<(), DisplayError> {
        info!(code, "new pairing code issued; fetch it from GET /qrcode to scan");
        Ok(())
    }
}
