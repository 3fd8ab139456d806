//! Session state: connection lifecycle, live handle identity, pairing code.
//!
//! # Connection lifecycle
//!
//! ```text
//! Disconnected ──start──► Connecting ──opened──► Connected
//!      ▲                      │                      │
//!      └──── logged out / reset / disconnect ────────┘
//! ```
//!
//! A transient close moves a `Connected` session back to `Connecting` while
//! the supervisor re-establishes it.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current state of the single gateway session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No live transport. Initial state on process start.
    #[default]
    Disconnected,
    /// A transport has been opened (or is being re-opened) but the network
    /// has not confirmed the session yet.
    Connecting,
    /// The network accepted the session; messages can be sent.
    Connected,
}

impl ConnectionState {
    /// Lowercase status string used in API responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identity of one live transport instance.
///
/// A fresh handle is minted for every opened transport, so comparing handles
/// tells whether an event still belongs to the current connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(Uuid);

impl SessionHandle {
    /// Mints a new, unique handle.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The pairing code a human scans to authorise a new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairingArtifact(String);

impl PairingArtifact {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    pub fn into_code(self) -> String {
        self.0
    }
}

/// Point-in-time view of the session, safe to read while transitions run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub state: ConnectionState,
    pub pairing: Option<PairingArtifact>,
    /// Handle of the live transport, if any.
    pub handle: Option<SessionHandle>,
}

impl SessionSnapshot {
    pub fn has_pairing_code(&self) -> bool {
        self.pairing.is_some()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_defaults_to_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_connection_state_serializes_lowercase() {
        // Arrange / Act
        let json = serde_json::to_string(&ConnectionState::Connecting).unwrap();

        // Assert: API clients compare against the lowercase strings
        assert_eq!(json, "\"connecting\"");
    }

    #[test]
    fn test_connection_state_display_matches_as_str() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
        ] {
            assert_eq!(state.to_string(), state.as_str());
        }
    }

    #[test]
    fn test_session_handles_are_unique() {
        assert_ne!(SessionHandle::new(), SessionHandle::new());
    }

    #[test]
    fn test_default_snapshot_is_disconnected_without_pairing_code() {
        let snapshot = SessionSnapshot::default();
        assert_eq!(snapshot.state, ConnectionState::Disconnected);
        assert!(!snapshot.has_pairing_code());
        assert!(snapshot.handle.is_none());
    }

    #[test]
    fn test_pairing_artifact_exposes_code() {
        let artifact = PairingArtifact::new("2@abc,def");
        assert_eq!(artifact.code(), "2@abc,def");
        assert_eq!(artifact.into_code(), "2@abc,def");
    }
}
