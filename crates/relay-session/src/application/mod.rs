//! Application layer: session lifecycle use cases.
//!
//! Nothing here touches sockets or the file system directly; the supervisor
//! talks to the `Transport`, `PairingDisplay`, and `CredentialStore` seams
//! from `infrastructure`.
//!
//! # Sub-modules
//!
//! - **`supervisor`** – The `ConnectionSupervisor` state machine: start,
//!   disconnect, reset, send, transport event handling, and the bounded
//!   reconnect loop.
//!
//! - **`session_service`** – The façade used by adapters.  Tags failures with
//!   the operation that produced them and builds status replies.
//!
//! - **`errors`** – `SessionError` and `ServiceError`.

pub mod errors;
pub mod session_service;
pub mod supervisor;
