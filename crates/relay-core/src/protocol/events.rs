//! Lifecycle events a transport reports to the session supervisor.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::credentials::Credentials;

/// Close status the network uses when the session was logged out remotely
/// (or the stored credentials were revoked).
pub const LOGGED_OUT_STATUS: u16 = 401;

/// Why a transport connection closed.
///
/// Decoded once at the transport boundary so the supervisor branches on a
/// closed set of cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The session was logged out or is no longer authorised.  Terminal.
    LoggedOut,
    /// Anything else: network drop, server restart, stream error.  Recoverable.
    Transient(String),
}

impl CloseReason {
    /// Decodes a close notification carrying an optional status code.
    ///
    /// Only [`LOGGED_OUT_STATUS`] is terminal; every other code (or none)
    /// is treated as a transient drop.
    pub fn from_status(status_code: Option<u16>, detail: impl Into<String>) -> Self {
        match status_code {
            Some(LOGGED_OUT_STATUS) => CloseReason::LoggedOut,
            Some(code) => CloseReason::Transient(format!("{} (status {code})", detail.into())),
            None => CloseReason::Transient(detail.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CloseReason::LoggedOut)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::LoggedOut => f.write_str("logged out"),
            CloseReason::Transient(detail) => write!(f, "transient: {detail}"),
        }
    }
}

/// An asynchronous notification from a live transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The network issued a pairing code that a human must scan.
    PairingCode(String),
    /// The session is authenticated and ready to send.
    Opened,
    /// The connection closed.
    Closed(CloseReason),
    /// Key material rotated; the full current set must be persisted.
    CredentialsUpdated(Credentials),
}

/// Acknowledgement returned by the network for a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    /// Network-assigned message identifier.
    pub message_id: String,
    /// Normalised address the message was sent to.
    pub recipient: String,
    /// Server timestamp in seconds since the Unix epoch.
    pub timestamp: u64,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logged_out_status_is_terminal() {
        let reason = CloseReason::from_status(Some(LOGGED_OUT_STATUS), "bye");
        assert_eq!(reason, CloseReason::LoggedOut);
        assert!(reason.is_terminal());
    }

    #[test]
    fn test_other_status_is_transient_and_keeps_code() {
        let reason = CloseReason::from_status(Some(428), "connection closed");
        assert_eq!(
            reason,
            CloseReason::Transient("connection closed (status 428)".to_string())
        );
        assert!(!reason.is_terminal());
    }

    #[test]
    fn test_missing_status_is_transient() {
        let reason = CloseReason::from_status(None, "socket reset");
        assert_eq!(reason, CloseReason::Transient("socket reset".to_string()));
    }

    #[test]
    fn test_send_receipt_serializes_camel_case() {
        let receipt = SendReceipt {
            message_id: "3EB0C7".to_string(),
            recipient: "15551234567@s.whatsapp.net".to_string(),
            timestamp: 1_700_000_000,
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["messageId"], "3EB0C7");
        assert_eq!(json["timestamp"], 1_700_000_000u64);
    }
}
