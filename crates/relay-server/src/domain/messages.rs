//! JSON request and response bodies of the HTTP API.
//!
//! Field names are camelCase on the wire (`hasQrCode`, `qrCode`) to match
//! what existing dashboard clients already parse.
//!
//! ```json
//! POST /send-message   {"number":"+1 555 123 4567","message":"hi"}
//! 200                  {"success":true,"result":{"messageId":"3EB0…","recipient":"15551234567@s.whatsapp.net","timestamp":1700000000}}
//! 400                  {"error":"Missing required fields","message":"Both number and message are required"}
//! ```

use relay_core::{ConnectionState, SendReceipt};
use serde::{Deserialize, Serialize};

pub const RESET_MESSAGE: &str = "Sessions cleared, new QR code will be generated";
pub const QR_NOT_AVAILABLE: &str = "QR code not available";
pub const MISSING_FIELDS: &str = "Missing required fields";
pub const MISSING_FIELDS_DETAIL: &str = "Both number and message are required";
pub const INVALID_BODY: &str = "Invalid request body";

// ── Requests ──────────────────────────────────────────────────────────────────

/// Body of `POST /send-message`.  Both fields are optional at the parse
/// level so that a missing field can be reported with a specific 400 reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl SendMessageRequest {
    /// Returns `(number, message)` if both are present and non-empty.
    pub fn required_fields(&self) -> Option<(&str, &str)> {
        let number = self.number.as_deref().filter(|s| !s.is_empty())?;
        let message = self.message.as_deref().filter(|s| !s.is_empty())?;
        Some((number, message))
    }
}

// ── Responses ─────────────────────────────────────────────────────────────────

/// `{status}` reply for connect and disconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReply {
    pub status: String,
}

/// Reply for `POST /reset-connection`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetReply {
    pub status: String,
    pub message: String,
}

/// Reply for a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendMessageReply {
    pub success: bool,
    pub result: SendReceipt,
}

/// Body of every 4xx/5xx reply except the missing-QR 404.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReply {
    pub error: String,
    pub message: String,
}

impl ErrorReply {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// 404 body for `GET /qrcode` when no pairing code is pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QrUnavailableReply {
    pub error: String,
    pub status: ConnectionState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_fields_present() {
        let req: SendMessageRequest =
            serde_json::from_str(r#"{"number":"123","message":"hi"}"#).unwrap();
        assert_eq!(req.required_fields(), Some(("123", "hi")));
    }

    #[test]
    fn test_missing_null_or_empty_fields_are_rejected() {
        for body in [
            r#"{"number":"123"}"#,
            r#"{"message":"hi"}"#,
            r#"{"number":null,"message":"hi"}"#,
            r#"{"number":"123","message":""}"#,
            r#"{}"#,
        ] {
            let req: SendMessageRequest = serde_json::from_str(body).unwrap();
            assert_eq!(req.required_fields(), None, "body {body} should be rejected");
        }
    }

    #[test]
    fn test_qr_unavailable_reply_shape() {
        let reply = QrUnavailableReply {
            error: QR_NOT_AVAILABLE.to_string(),
            status: ConnectionState::Connected,
        };
        assert_eq!(
            serde_json::to_value(reply).unwrap(),
            serde_json::json!({"error": "QR code not available", "status": "connected"})
        );
    }
}
