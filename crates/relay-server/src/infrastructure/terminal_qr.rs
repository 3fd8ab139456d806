//! Renders pairing codes as a QR code on the terminal.
//!
//! Uses half-height Unicode blocks (`▀`, `▄`, `█`) so each character cell
//! carries two QR modules vertically and the code fits an 80-column
//! terminal.

use std::io::Write;

use qrcode::render::unicode::Dense1x2;
use qrcode::QrCode;
use relay_session::{DisplayError, PairingDisplay};

/// Prints each new pairing code to stdout as a scannable QR code.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalQrDisplay;

impl TerminalQrDisplay {
    /// Renders `code` to a multi-line string.
    ///
    /// # Errors
    ///
    /// Returns [`DisplayError`] if `code` is too long to fit in a QR code.
    pub fn render(code: &str) -> Result<String, DisplayError> {
        let qr = QrCode::new(code.as_bytes())
            .map_err(|e| DisplayError(format!("QR generation failed: {e}")))?;
        Ok(qr
            .render::<Dense1x2>()
            .dark_color(Dense1x2::Light)
            .light_color(Dense1x2::Dark)
            .quiet_zone(true)
            .build())
    }
}

impl PairingDisplay for TerminalQrDisplay {
    fn show(&self, code: &str) -> Result<(), DisplayError> {
        let rendered = Self::render(code)?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "\nScan this code with the phone app to link the session:\n{rendered}\n")
            .and_then(|()| out.flush())
            .map_err(|e| DisplayError(format!("failed to write to stdout: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_produces_square_block_art() {
        let art = TerminalQrDisplay::render("2@abcdef,ghijkl,mnopqr").unwrap();

        let lines: Vec<&str> = art.lines().collect();
        assert!(lines.len() > 10);
        let width = lines[0].chars().count();
        assert!(lines.iter().all(|l| l.chars().count() == width));
    }

    #[test]
    fn test_render_rejects_oversized_payload() {
        let huge = "x".repeat(8000);
        assert!(TerminalQrDisplay::render(&huge).is_err());
    }
}
