//! # relay-core
//!
//! Shared library for the relay gateway containing the session domain model
//! and the JSON frame protocol spoken with the upstream messaging endpoint.
//!
//! This crate is used by both the session engine and the HTTP server.
//! It has zero dependencies on sockets, file systems, or async runtimes.
//!
//! # Architecture overview
//!
//! The relay gateway keeps exactly one long-lived connection to a messaging
//! network and exposes a small HTTP API to drive it: connect, pair by scanning
//! a code, send text messages, disconnect, or reset everything.
//!
//! - **`domain`** – The vocabulary of a session: its [`ConnectionState`], the
//!   opaque [`SessionHandle`] of the live transport, the current
//!   [`PairingArtifact`], the persisted [`Credentials`], and [`Recipient`]
//!   address normalisation.
//!
//! - **`protocol`** – What the transport tells the session ([`TransportEvent`],
//!   [`CloseReason`]) and how those events travel over the upstream WebSocket
//!   as JSON frames.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `relay_core::ConnectionState` instead of the full module path.
pub use domain::credentials::Credentials;
pub use domain::recipient::{Recipient, RecipientError, DEFAULT_ADDRESS_SUFFIX};
pub use domain::session::{ConnectionState, PairingArtifact, SessionHandle, SessionSnapshot};
pub use protocol::codec::{decode_upstream_frame, encode_client_frame, ProtocolError};
pub use protocol::events::{CloseReason, SendReceipt, TransportEvent};
