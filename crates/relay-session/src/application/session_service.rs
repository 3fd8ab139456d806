//! SessionService: the façade HTTP handlers call.
//!
//! Lifecycle operations are serialised by the supervisor's lock; reads come
//! from its snapshot and never wait behind a transition.  Failures are tagged
//! with the [`Operation`] that produced them so the adapter can reply with a
//! stable summary.

use std::sync::Arc;

use relay_core::{ConnectionState, SendReceipt};
use serde::Serialize;

use crate::application::errors::{Operation, ServiceError};
use crate::application::supervisor::{ConnectionSupervisor, DisconnectOutcome, StartOutcome};

/// Reply for a status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: ConnectionState,
    pub has_qr_code: bool,
}

/// Reply for a pairing-code query.  `qr_code` is `None` when no code is
/// currently available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingReport {
    pub qr_code: Option<String>,
    pub status: ConnectionState,
}

pub struct SessionService {
    supervisor: Arc<ConnectionSupervisor>,
}

impl SessionService {
    pub fn new(supervisor: Arc<ConnectionSupervisor>) -> Self {
        Self { supervisor }
    }

    pub fn supervisor(&self) -> &Arc<ConnectionSupervisor> {
        &self.supervisor
    }

    /// Starts a connection, reusing stored credentials when present.
    pub async fn connect(&self) -> Result<StartOutcome, ServiceError> {
        self.supervisor
            .start(false)
            .await
            .map_err(|e| ServiceError::new(Operation::Connect, e))
    }

    /// Wipes stored credentials and starts a fresh pairing.
    pub async fn reset_connection(&self) -> Result<StartOutcome, ServiceError> {
        self.supervisor
            .start(true)
            .await
            .map_err(|e| ServiceError::new(Operation::ResetConnection, e))
    }

    /// Logs out and releases the live connection.  On a failed logout the
    /// session is still released and the error reported.
    pub async fn disconnect(&self) -> Result<DisconnectOutcome, ServiceError> {
        self.supervisor
            .disconnect()
            .await
            .map_err(|e| ServiceError::new(Operation::Disconnect, e))
    }

    pub async fn send_message(
        &self,
        number: &str,
        message: &str,
    ) -> Result<SendReceipt, ServiceError> {
        self.supervisor
            .send(number, message)
            .await
            .map_err(|e| ServiceError::new(Operation::SendMessage, e))
    }

    pub fn status(&self) -> StatusReport {
        let snapshot = self.supervisor.snapshot();
        StatusReport {
            status: snapshot.state,
            has_qr_code: snapshot.has_pairing_code(),
        }
    }

    pub fn pairing_code(&self) -> PairingReport {
        let snapshot = self.supervisor.snapshot();
        PairingReport {
            qr_code: snapshot.pairing.map(|p| p.into_code()),
            status: snapshot.state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::pairing_display::LogPairingDisplay;
    use crate::infrastructure::storage::credential_store::CredentialStore;
    use crate::infrastructure::transport::mock::MockTransport;
    use crate::{ReconnectPolicy, SupervisorOptions};
    use relay_core::TransportEvent;

    fn service(dir: &std::path::Path, transport: &MockTransport) -> SessionService {
        SessionService::new(ConnectionSupervisor::new(
            CredentialStore::new(dir),
            Arc::new(transport.clone()),
            Arc::new(LogPairingDisplay),
            SupervisorOptions {
                policy: ReconnectPolicy::immediate(1),
                ..SupervisorOptions::default()
            },
        ))
    }

    #[tokio::test]
    async fn test_status_report_serialises_with_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), &MockTransport::new());

        let json = serde_json::to_value(svc.status()).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"status": "disconnected", "hasQrCode": false})
        );
    }

    #[tokio::test]
    async fn test_pairing_report_carries_current_code() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let transport = MockTransport::new();
        let svc = service(dir.path(), &transport);
        svc.connect().await.unwrap();

        // Act
        transport
            .emit(TransportEvent::PairingCode("2@xyz".into()))
            .await;
        let mut rx = svc.supervisor().subscribe();
        rx.wait_for(|s| s.pairing.is_some()).await.unwrap();

        // Assert
        let report = svc.pairing_code();
        assert_eq!(report.qr_code.as_deref(), Some("2@xyz"));
        assert_eq!(report.status, ConnectionState::Connecting);
        assert!(svc.status().has_qr_code);
    }

    #[tokio::test]
    async fn test_send_failure_is_tagged_with_operation() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), &MockTransport::new());

        let err = svc.send_message("123", "hi").await.unwrap_err();

        assert_eq!(err.operation, Operation::SendMessage);
        assert_eq!(err.summary(), "Failed to send message");
        assert!(err.is_not_connected());
    }

    #[tokio::test]
    async fn test_connect_failure_is_tagged_with_operation() {
        let dir = tempfile::tempdir().unwrap();
        let transport = MockTransport::new();
        transport.fail_next_open("refused");
        let svc = service(dir.path(), &transport);

        let err = svc.connect().await.unwrap_err();

        assert_eq!(err.summary(), "Failed to connect");
        assert!(err.detail().contains("refused"));
    }

    #[tokio::test]
    async fn test_logout_failure_is_tagged_with_operation() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let transport = MockTransport::new();
        let svc = service(dir.path(), &transport);
        svc.connect().await.unwrap();
        transport.fail_logout();

        // Act
        let err = svc.disconnect().await.unwrap_err();

        // Assert: reported, yet the session is gone
        assert_eq!(err.summary(), "Failed to disconnect");
        assert!(err.detail().contains("logout failed"));
        assert_eq!(svc.status().status, ConnectionState::Disconnected);
    }
}
