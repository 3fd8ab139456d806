//! Text codec for upstream frames and their translation to transport events.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;

use crate::domain::credentials::{is_valid_file_name, Credentials};
use crate::protocol::events::{CloseReason, SendReceipt, TransportEvent};
use crate::protocol::frames::{ClientFrame, UpstreamFrame};

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The text was not valid JSON or did not match any frame variant.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A credential entry had an unusable name.
    #[error("invalid credential file name: {0:?}")]
    InvalidCredentialName(String),

    /// A credential entry was not valid base64.
    #[error("credential {name:?} is not valid base64: {source}")]
    InvalidCredentialEncoding {
        name: String,
        #[source]
        source: base64::DecodeError,
    },
}

/// An upstream frame after decoding, split by who consumes it.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A lifecycle event for the session supervisor.
    Event(TransportEvent),
    /// Completion of a pending `send_text` request.
    Delivered {
        request_id: String,
        receipt: SendReceipt,
    },
    /// Rejection of a pending `send_text` request.
    Rejected { request_id: String, error: String },
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Parses one text frame received from upstream.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if the text is not a known frame.
pub fn decode_upstream_frame(text: &str) -> Result<UpstreamFrame, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

/// Serialises a frame for sending upstream.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if serialisation fails.
pub fn encode_client_frame(frame: &ClientFrame) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(frame)?)
}

/// Base64-encodes every credential file for the wire.
pub fn encode_credentials(credentials: &Credentials) -> BTreeMap<String, String> {
    credentials
        .iter()
        .map(|(name, contents)| (name.to_string(), STANDARD.encode(contents)))
        .collect()
}

/// Decodes a wire credential map back into a [`Credentials`] set.
///
/// # Errors
///
/// Rejects unusable file names and invalid base64 rather than silently
/// dropping entries, so a partial key set is never persisted.
pub fn decode_credentials(files: &BTreeMap<String, String>) -> Result<Credentials, ProtocolError> {
    let mut credentials = Credentials::new();
    for (name, encoded) in files {
        if !is_valid_file_name(name) {
            return Err(ProtocolError::InvalidCredentialName(name.clone()));
        }
        let contents =
            STANDARD
                .decode(encoded)
                .map_err(|source| ProtocolError::InvalidCredentialEncoding {
                    name: name.clone(),
                    source,
                })?;
        credentials.insert(name.clone(), contents);
    }
    Ok(credentials)
}

impl UpstreamFrame {
    /// Converts the frame into what the transport layer acts on.
    ///
    /// `close` frames are decoded into a [`CloseReason`] here, once; the
    /// supervisor never inspects raw status codes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] if a `credentials` frame carries bad entries.
    pub fn into_inbound(
        self,
        recipient_of: impl FnOnce(&str) -> String,
    ) -> Result<Inbound, ProtocolError> {
        let inbound = match self {
            UpstreamFrame::PairingCode { code } => {
                Inbound::Event(TransportEvent::PairingCode(code))
            }
            UpstreamFrame::Open => Inbound::Event(TransportEvent::Opened),
            UpstreamFrame::Close {
                status_code,
                reason,
            } => Inbound::Event(TransportEvent::Closed(CloseReason::from_status(
                status_code,
                reason,
            ))),
            UpstreamFrame::Credentials { files } => {
                Inbound::Event(TransportEvent::CredentialsUpdated(decode_credentials(&files)?))
            }
            UpstreamFrame::SendAck {
                request_id,
                message_id,
                timestamp,
            } => {
                let recipient = recipient_of(&request_id);
                Inbound::Delivered {
                    request_id,
                    receipt: SendReceipt {
                        message_id,
                        recipient,
                        timestamp,
                    },
                }
            }
            UpstreamFrame::SendError { request_id, error } => {
                Inbound::Rejected { request_id, error }
            }
        };
        Ok(inbound)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn no_recipient(_: &str) -> String {
        String::new()
    }

    #[test]
    fn test_decode_open_frame() {
        let frame = decode_upstream_frame(r#"{"type":"open"}"#).unwrap();
        assert_eq!(frame, UpstreamFrame::Open);
    }

    #[test]
    fn test_decode_close_without_status_defaults() {
        let frame = decode_upstream_frame(r#"{"type":"close"}"#).unwrap();
        assert_eq!(
            frame,
            UpstreamFrame::Close {
                status_code: None,
                reason: String::new()
            }
        );
    }

    #[test]
    fn test_close_401_becomes_logged_out_event() {
        // Arrange
        let frame =
            decode_upstream_frame(r#"{"type":"close","status_code":401,"reason":"logged out"}"#)
                .unwrap();

        // Act
        let inbound = frame.into_inbound(no_recipient).unwrap();

        // Assert
        assert_eq!(
            inbound,
            Inbound::Event(TransportEvent::Closed(CloseReason::LoggedOut))
        );
    }

    #[test]
    fn test_unknown_frame_type_is_malformed() {
        let err = decode_upstream_frame(r#"{"type":"presence","jid":"x"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn test_credentials_frame_decodes_binary_contents() {
        // Arrange: "AP8K" is base64 for [0x00, 0xFF, 0x0A]
        let frame =
            decode_upstream_frame(r#"{"type":"credentials","files":{"creds.json":"AP8K"}}"#)
                .unwrap();

        // Act
        let inbound = frame.into_inbound(no_recipient).unwrap();

        // Assert
        let creds = match inbound {
            Inbound::Event(TransportEvent::CredentialsUpdated(creds)) => creds,
            other => panic!("expected a credentials event, got {other:?}"),
        };
        assert_eq!(creds.get("creds.json"), Some(&[0x00u8, 0xFF, 0x0A][..]));
    }

    #[test]
    fn test_credentials_frame_rejects_traversal_name() {
        let frame =
            decode_upstream_frame(r#"{"type":"credentials","files":{"../x":"AA=="}}"#).unwrap();
        let err = frame.into_inbound(no_recipient).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidCredentialName(_)));
    }

    #[test]
    fn test_credentials_frame_rejects_bad_base64() {
        let frame =
            decode_upstream_frame(r#"{"type":"credentials","files":{"creds.json":"!!"}}"#).unwrap();
        let err = frame.into_inbound(no_recipient).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidCredentialEncoding { .. }));
    }

    #[test]
    fn test_send_ack_carries_recipient_from_lookup() {
        let frame = decode_upstream_frame(
            r#"{"type":"send_ack","request_id":"r1","message_id":"M1","timestamp":42}"#,
        )
        .unwrap();

        let inbound = frame.into_inbound(|id| format!("lookup-{id}")).unwrap();

        assert_eq!(
            inbound,
            Inbound::Delivered {
                request_id: "r1".to_string(),
                receipt: SendReceipt {
                    message_id: "M1".to_string(),
                    recipient: "lookup-r1".to_string(),
                    timestamp: 42,
                },
            }
        );
    }

    #[test]
    fn test_encode_logout_frame() {
        let text = encode_client_frame(&ClientFrame::Logout).unwrap();
        assert_eq!(text, r#"{"type":"logout"}"#);
    }

    #[test]
    fn test_hello_frame_carries_encoded_credentials() {
        // Arrange
        let mut creds = Credentials::new();
        creds.insert("creds.json", vec![0x00, 0xFF, 0x0A]);

        // Act
        let text = encode_client_frame(&ClientFrame::Hello {
            credentials: encode_credentials(&creds),
        })
        .unwrap();

        // Assert
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["type"], "hello");
        assert_eq!(json["credentials"]["creds.json"], "AP8K");
    }
}
