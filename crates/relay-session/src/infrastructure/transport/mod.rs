//! Transport seam: the live socket to the messaging network.
//!
//! A [`Transport`] opens one connection per call, bound to the credentials
//! it was given.  Each connection is split in two:
//!
//! - a [`TransportSession`] the supervisor keeps for outbound operations
//!   (sending text, logging out); dropping it releases the socket.
//! - an event receiver yielding [`TransportEvent`]s (pairing code, opened,
//!   closed, credentials rotated) until the connection ends.
//!
//! # Testability
//!
//! The supervisor only sees these traits.  Production uses
//! [`websocket::WebSocketTransport`]; tests use [`mock::MockTransport`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay_core::{Credentials, ProtocolError, Recipient, SendReceipt, TransportEvent};
use thiserror::Error;
use tokio::sync::mpsc;

pub mod mock;
pub mod websocket;

/// Capacity of the per-connection event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The upstream endpoint could not be reached or refused the handshake.
    #[error("failed to connect to {endpoint}: {detail}")]
    Connect { endpoint: String, detail: String },

    /// The connection ended before the operation completed.
    #[error("transport connection closed")]
    Closed,

    /// The network refused to deliver a message.
    #[error("message rejected: {0}")]
    Rejected(String),

    /// A frame could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Any other I/O failure on the live connection.
    #[error("transport I/O error: {0}")]
    Io(String),

    /// The operation did not finish within the supervisor's deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

/// One opened connection: the outbound half and its event stream.
pub struct TransportConnection {
    pub session: Arc<dyn TransportSession>,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Opens connections to the messaging network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens a new connection authenticated with `credentials`.
    ///
    /// Empty credentials ask the network for a fresh pairing.
    async fn open(&self, credentials: Credentials) -> Result<TransportConnection, TransportError>;
}

/// Outbound operations on one live connection.
#[async_trait]
pub trait TransportSession: Send + Sync {
    /// Sends a text message and waits for the network's acknowledgement.
    async fn send_text(
        &self,
        recipient: &Recipient,
        body: &str,
    ) -> Result<SendReceipt, TransportError>;

    /// Logs the session out on the network side.
    async fn logout(&self) -> Result<(), TransportError>;
}
