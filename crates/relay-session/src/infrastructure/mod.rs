//! Infrastructure layer: file system, sockets, and human-facing side channels.
//!
//! - **`storage`** – The session directory holding credential files.
//! - **`transport`** – The seam to the messaging network, with a WebSocket
//!   implementation for production and a scriptable mock for tests.
//! - **`pairing_display`** – Where freshly issued pairing codes are shown.

pub mod pairing_display;
pub mod storage;
pub mod transport;
