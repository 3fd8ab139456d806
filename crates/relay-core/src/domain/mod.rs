//! Domain entities for the relay gateway.
//!
//! Pure types with no I/O: the session state machine's vocabulary, the
//! credential set the transport rotates, and recipient addressing.
//!
//! Code in outer layers (session engine, HTTP server) depends on the domain,
//! but the domain never depends on them.

pub mod credentials;
pub mod recipient;
pub mod session;
