//! relay-session library entry point.
//!
//! The session engine behind the relay gateway: it owns the single
//! connection to the messaging network and everything that keeps it alive.
//!
//! # Architecture
//!
//! ```text
//! HTTP adapter (relay-server)
//!        │
//!        ▼
//! application/
//!   SessionService         façade: operations + error summaries
//!   ConnectionSupervisor   state machine, event driver, reconnect policy
//!        │                          ▲
//!        ▼                          │ TransportEvent
//! infrastructure/
//!   storage/   CredentialStore     session directory on disk
//!   transport/ Transport seam      WebSocket upstream, in-process mock
//!   pairing_display                side channel for pairing codes
//! ```
//!
//! The application layer depends only on the `Transport` and `PairingDisplay`
//! traits, so every state transition can be exercised with the mock.

pub mod application;
pub mod infrastructure;

pub use application::errors::{Operation, ServiceError, SessionError};
pub use application::session_service::{PairingReport, SessionService, StatusReport};
pub use application::supervisor::{
    ConnectionSupervisor, DisconnectOutcome, ReconnectPolicy, StartOutcome, SupervisorOptions,
};
pub use infrastructure::pairing_display::{DisplayError, LogPairingDisplay, PairingDisplay};
pub use infrastructure::storage::credential_store::{CredentialSaver, CredentialStore, StorageError};
pub use infrastructure::transport::{Transport, TransportConnection, TransportError, TransportSession};
