//! Error taxonomy for session operations.
//!
//! [`SessionError`] is what the supervisor returns.  [`ServiceError`] wraps it
//! with the [`Operation`] that failed so adapters can render a one-line
//! summary ("Failed to connect") alongside the underlying detail.
//!
//! "Already in state" outcomes are not errors: they are reported through
//! `StartOutcome` / `DisconnectOutcome` as successful no-ops.  A failed logout
//! is an error, but the session has already been released when it is
//! returned.

use relay_core::RecipientError;
use thiserror::Error;

use crate::infrastructure::storage::credential_store::StorageError;
use crate::infrastructure::transport::TransportError;

/// Failures raised by the connection supervisor.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Credentials could not be loaded or cleared.
    #[error("credential storage failed: {0}")]
    Storage(#[from] StorageError),

    /// The transport could not be opened.
    #[error("could not open transport: {0}")]
    Connect(#[source] TransportError),

    /// A send was attempted without a live, connected session.
    #[error("session is not connected")]
    NotConnected,

    /// The recipient number contained no digits.
    #[error(transparent)]
    InvalidRecipient(#[from] RecipientError),

    /// The transport failed to deliver a message.
    #[error("send failed: {0}")]
    Send(#[source] TransportError),

    /// The network did not acknowledge the logout.  The session is released
    /// regardless.
    #[error("logout failed: {0}")]
    Logout(#[source] TransportError),

    /// A lifecycle task stopped before finishing, e.g. at runtime shutdown.
    #[error("session operation was interrupted")]
    Interrupted,
}

/// The lifecycle or messaging operation a [`ServiceError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Connect,
    ResetConnection,
    SendMessage,
    Disconnect,
}

impl Operation {
    /// Short human-readable summary used as the `error` field of API replies.
    pub fn failure_summary(self) -> &'static str {
        match self {
            Operation::Connect => "Failed to connect",
            Operation::ResetConnection => "Failed to reset connection",
            Operation::SendMessage => "Failed to send message",
            Operation::Disconnect => "Failed to disconnect",
        }
    }
}

/// A [`SessionError`] tagged with the operation that produced it.
#[derive(Debug, Error)]
#[error("{summary}: {source}", summary = .operation.failure_summary())]
pub struct ServiceError {
    pub operation: Operation,
    #[source]
    pub source: SessionError,
}

impl ServiceError {
    pub fn new(operation: Operation, source: SessionError) -> Self {
        Self { operation, source }
    }

    pub fn summary(&self) -> &'static str {
        self.operation.failure_summary()
    }

    /// The underlying failure, rendered for API replies.
    pub fn detail(&self) -> String {
        self.source.to_string()
    }

    pub fn is_not_connected(&self) -> bool {
        matches!(self.source, SessionError::NotConnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_display_combines_summary_and_detail() {
        let err = ServiceError::new(Operation::SendMessage, SessionError::NotConnected);

        assert_eq!(err.summary(), "Failed to send message");
        assert_eq!(err.detail(), "session is not connected");
        assert_eq!(
            err.to_string(),
            "Failed to send message: session is not connected"
        );
        assert!(err.is_not_connected());
    }

    #[test]
    fn test_every_operation_has_a_distinct_summary() {
        let all = [
            Operation::Connect,
            Operation::ResetConnection,
            Operation::SendMessage,
            Operation::Disconnect,
        ];
        let mut summaries: Vec<_> = all.iter().map(|op| op.failure_summary()).collect();
        summaries.sort_unstable();
        summaries.dedup();
        assert_eq!(summaries.len(), all.len());
    }

    #[test]
    fn test_connect_error_keeps_transport_detail() {
        let err = SessionError::Connect(TransportError::Connect {
            endpoint: "ws://upstream".to_string(),
            detail: "refused".to_string(),
        });
        assert!(err.to_string().contains("refused"));
    }
}
