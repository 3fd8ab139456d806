//! Mock transport for unit and integration testing.
//!
//! Records every call the supervisor makes and lets tests push
//! [`TransportEvent`]s into the most recently opened connection, as if the
//! network had sent them.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use relay_core::{Credentials, Recipient, SendReceipt, TransportEvent};
use tokio::sync::{mpsc, watch};

use super::{
    Transport, TransportConnection, TransportError, TransportSession, EVENT_CHANNEL_CAPACITY,
};

/// One recorded interaction with the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    /// `open` was called with these credentials.
    Open(Credentials),
    /// `send_text` was called on connection number `connection` (1-based).
    Send {
        connection: usize,
        recipient: String,
        body: String,
    },
    /// `logout` was called on connection number `connection`.
    Logout { connection: usize },
}

#[derive(Default)]
struct MockState {
    calls: Vec<MockCall>,
    opens: usize,
    /// Event sender of the most recently opened connection.
    current: Option<(usize, mpsc::Sender<TransportEvent>)>,
    fail_next_open: Option<String>,
    reject_sends: Option<String>,
    fail_logout: bool,
    open_delay: Duration,
    stall_opens: bool,
    stall_logouts: bool,
}

/// A scriptable implementation of [`Transport`].
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    opens_tx: Arc<watch::Sender<usize>>,
}

impl MockTransport {
    pub fn new() -> Self {
        let (opens_tx, _) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            opens_tx: Arc::new(opens_tx),
        }
    }

    /// Returns every recorded call in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().expect("lock poisoned").calls.clone()
    }

    /// Number of successful `open` calls so far.
    pub fn open_count(&self) -> usize {
        self.state.lock().expect("lock poisoned").opens
    }

    /// Credentials passed to the most recent successful `open`.
    pub fn last_opened_credentials(&self) -> Option<Credentials> {
        self.calls().into_iter().rev().find_map(|call| match call {
            MockCall::Open(creds) => Some(creds),
            _ => None,
        })
    }

    /// Waits until at least `count` connections have been opened.
    pub async fn wait_for_opens(&self, count: usize) {
        let mut rx = self.opens_tx.subscribe();
        let _ = rx.wait_for(|opens| *opens >= count).await;
    }

    /// Makes the next `open` call fail with a connect error.
    pub fn fail_next_open(&self, detail: impl Into<String>) {
        self.state.lock().expect("lock poisoned").fail_next_open = Some(detail.into());
    }

    /// Makes every `send_text` fail with `detail` (or succeed again with `None`).
    pub fn reject_sends(&self, detail: Option<String>) {
        self.state.lock().expect("lock poisoned").reject_sends = detail;
    }

    /// Makes `logout` fail on every connection.
    pub fn fail_logout(&self) {
        self.state.lock().expect("lock poisoned").fail_logout = true;
    }

    /// Makes every `open` wait `delay` before completing.
    pub fn delay_opens(&self, delay: Duration) {
        self.state.lock().expect("lock poisoned").open_delay = delay;
    }

    /// Makes `open` hang forever (or behave normally again with `false`).
    pub fn stall_opens(&self, stall: bool) {
        self.state.lock().expect("lock poisoned").stall_opens = stall;
    }

    /// Makes `logout` hang forever after recording the call.
    pub fn stall_logouts(&self, stall: bool) {
        self.state.lock().expect("lock poisoned").stall_logouts = stall;
    }

    /// Delivers `event` on the most recently opened connection.
    ///
    /// Returns `false` if no connection is open or its receiver is gone.
    pub async fn emit(&self, event: TransportEvent) -> bool {
        match self.current_sender() {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Returns a clone of the current connection's event sender, which
    /// outlives that connection being superseded.
    pub fn current_sender(&self) -> Option<mpsc::Sender<TransportEvent>> {
        let guard = self.state.lock().expect("lock poisoned");
        guard.current.as_ref().map(|(_, tx)| tx.clone())
    }

    /// Ends the event stream of the current connection without a close
    /// event, as a crashed socket would.
    pub fn drop_current_stream(&self) {
        self.state.lock().expect("lock poisoned").current = None;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, credentials: Credentials) -> Result<TransportConnection, TransportError> {
        let (delay, stall) = {
            let guard = self.state.lock().expect("lock poisoned");
            (guard.open_delay, guard.stall_opens)
        };
        if stall {
            std::future::pending::<()>().await;
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let connection = {
            let mut guard = self.state.lock().expect("lock poisoned");
            if let Some(detail) = guard.fail_next_open.take() {
                return Err(TransportError::Connect {
                    endpoint: "mock".to_string(),
                    detail,
                });
            }
            guard.calls.push(MockCall::Open(credentials));
            guard.opens += 1;
            guard.current = Some((guard.opens, tx));
            guard.opens
        };
        self.opens_tx.send_replace(connection);

        Ok(TransportConnection {
            session: Arc::new(MockSession {
                connection,
                state: Arc::clone(&self.state),
            }),
            events: rx,
        })
    }
}

struct MockSession {
    connection: usize,
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl TransportSession for MockSession {
    async fn send_text(
        &self,
        recipient: &Recipient,
        body: &str,
    ) -> Result<SendReceipt, TransportError> {
        let mut guard = self.state.lock().expect("lock poisoned");
        guard.calls.push(MockCall::Send {
            connection: self.connection,
            recipient: recipient.to_string(),
            body: body.to_string(),
        });
        if let Some(detail) = &guard.reject_sends {
            return Err(TransportError::Rejected(detail.clone()));
        }
        let sent = guard
            .calls
            .iter()
            .filter(|c| matches!(c, MockCall::Send { .. }))
            .count();
        Ok(SendReceipt {
            message_id: format!("MOCK{sent:04}"),
            recipient: recipient.to_string(),
            timestamp: 0,
        })
    }

    async fn logout(&self) -> Result<(), TransportError> {
        let (stall, fail) = {
            let mut guard = self.state.lock().expect("lock poisoned");
            guard.calls.push(MockCall::Logout {
                connection: self.connection,
            });
            // A logged-out connection stops producing events.
            if matches!(guard.current, Some((n, _)) if n == self.connection) {
                guard.current = None;
            }
            (guard.stall_logouts, guard.fail_logout)
        };
        if stall {
            std::future::pending::<()>().await;
        }
        if fail {
            return Err(TransportError::Io("logout frame could not be written".to_string()));
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_records_credentials_and_delivers_events() {
        // Arrange
        let transport = MockTransport::new();
        let mut creds = Credentials::new();
        creds.insert("creds.json", b"{}".to_vec());

        // Act
        let mut conn = transport.open(creds.clone()).await.expect("open should succeed");
        assert!(transport.emit(TransportEvent::Opened).await);

        // Assert
        assert_eq!(transport.open_count(), 1);
        assert_eq!(transport.last_opened_credentials(), Some(creds));
        assert_eq!(conn.events.recv().await, Some(TransportEvent::Opened));
    }

    #[tokio::test]
    async fn test_fail_next_open_applies_once() {
        let transport = MockTransport::new();
        transport.fail_next_open("refused");

        assert!(transport.open(Credentials::new()).await.is_err());
        assert!(transport.open(Credentials::new()).await.is_ok());
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test]
    async fn test_logout_closes_event_stream() {
        let transport = MockTransport::new();
        let mut conn = transport.open(Credentials::new()).await.unwrap();

        conn.session.logout().await.unwrap();

        assert_eq!(conn.events.recv().await, None);
        assert!(!transport.emit(TransportEvent::Opened).await);
    }

    #[tokio::test]
    async fn test_rejected_send_is_recorded_and_fails() {
        let transport = MockTransport::new();
        let conn = transport.open(Credentials::new()).await.unwrap();
        transport.reject_sends(Some("blocked".to_string()));
        let to = Recipient::from_number("123", "x").unwrap();

        let result = conn.session.send_text(&to, "hi").await;

        assert!(matches!(result, Err(TransportError::Rejected(ref d)) if d == "blocked"));
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_stalled_calls_never_complete() {
        let transport = MockTransport::new();
        let conn = transport.open(Credentials::new()).await.unwrap();
        transport.stall_opens(true);
        transport.stall_logouts(true);

        let open = tokio::time::timeout(Duration::from_millis(20), transport.open(Credentials::new()));
        let logout = tokio::time::timeout(Duration::from_millis(20), conn.session.logout());

        assert!(open.await.is_err());
        assert!(logout.await.is_err());
        assert_eq!(transport.open_count(), 1);
        assert!(transport.calls().contains(&MockCall::Logout { connection: 1 }));
    }
}
