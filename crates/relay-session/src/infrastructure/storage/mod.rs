//! Storage infrastructure: credential persistence.
//!
//! The `credential_store` sub-module owns the session directory.  One
//! directory holds exactly one credential set; every credential is one file,
//! written atomically so a crash mid-save never leaves a torn file behind.

pub mod credential_store;
