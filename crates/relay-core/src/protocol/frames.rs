//! JSON frames exchanged with the upstream messaging endpoint.
//!
//! Every frame is a JSON object with a `"type"` field naming the variant;
//! the remaining fields are flattened into the same object:
//!
//! ```json
//! {"type":"pairing_code","code":"2@Xb1...,Hq9...,0Ab..."}
//! {"type":"close","status_code":401,"reason":"logged out"}
//! {"type":"send_text","request_id":"6f1c...","to":"15551234567@s.whatsapp.net","text":"hi"}
//! ```
//!
//! Credential file contents are binary, so they travel base64-encoded
//! (standard alphabet, padded) keyed by file name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Frames the upstream endpoint sends to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpstreamFrame {
    /// A new pairing code is available.  Replaces any earlier one.
    PairingCode { code: String },

    /// The session is authenticated.
    Open,

    /// The connection is closing.  `status_code` 401 means logged out.
    Close {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
        #[serde(default)]
        reason: String,
    },

    /// The full current credential set, base64 per file.
    Credentials { files: BTreeMap<String, String> },

    /// A `send_text` request was delivered.
    SendAck {
        request_id: String,
        message_id: String,
        #[serde(default)]
        timestamp: u64,
    },

    /// A `send_text` request was rejected.
    SendError { request_id: String, error: String },
}

/// Frames the gateway sends to the upstream endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// First frame on every connection: restores the stored session, or asks
    /// for a pairing code when `credentials` is empty.
    Hello { credentials: BTreeMap<String, String> },

    /// Deliver a text message.  Answered by `send_ack` or `send_error`.
    SendText {
        request_id: String,
        to: String,
        text: String,
    },

    /// Log the session out on the network side, invalidating credentials.
    Logout,
}
