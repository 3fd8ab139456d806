//! Integration tests for the upstream frame protocol.
//!
//! Replays a realistic upstream transcript (pairing, open, key rotation,
//! send acknowledgement, logout) through the public decoding API and checks
//! what the session layer would see.

use relay_core::protocol::{ClientFrame, Inbound};
use relay_core::{
    decode_upstream_frame, encode_client_frame, CloseReason, Credentials, TransportEvent,
};

fn decode(text: &str) -> Inbound {
    decode_upstream_frame(text)
        .expect("frame must decode")
        .into_inbound(|_| "15551234567@s.whatsapp.net".to_string())
        .expect("frame must translate")
}

#[test]
fn test_pairing_session_transcript() {
    // Arrange
    let transcript = [
        r#"{"type":"pairing_code","code":"2@first"}"#,
        r#"{"type":"pairing_code","code":"2@second"}"#,
        r#"{"type":"credentials","files":{"creds.json":"eyJtZSI6MX0="}}"#,
        r#"{"type":"open"}"#,
    ];

    // Act
    let events: Vec<Inbound> = transcript.iter().map(|t| decode(t)).collect();

    // Assert
    let mut creds = Credentials::new();
    creds.insert("creds.json", br#"{"me":1}"#.to_vec());
    assert_eq!(
        events,
        vec![
            Inbound::Event(TransportEvent::PairingCode("2@first".into())),
            Inbound::Event(TransportEvent::PairingCode("2@second".into())),
            Inbound::Event(TransportEvent::CredentialsUpdated(creds)),
            Inbound::Event(TransportEvent::Opened),
        ]
    );
}

#[test]
fn test_close_status_decides_terminality() {
    let logged_out = decode(r#"{"type":"close","status_code":401,"reason":"logged out"}"#);
    let restart = decode(r#"{"type":"close","status_code":515,"reason":"restart required"}"#);
    let dropped = decode(r#"{"type":"close"}"#);

    assert_eq!(
        logged_out,
        Inbound::Event(TransportEvent::Closed(CloseReason::LoggedOut))
    );
    for inbound in [restart, dropped] {
        match inbound {
            Inbound::Event(TransportEvent::Closed(reason)) => assert!(!reason.is_terminal()),
            other => panic!("expected a close event, got {other:?}"),
        }
    }
}

#[test]
fn test_send_ack_is_routed_to_the_pending_request() {
    let inbound =
        decode(r#"{"type":"send_ack","request_id":"r-1","message_id":"3EB0","timestamp":42}"#);

    match inbound {
        Inbound::Delivered {
            request_id,
            receipt,
        } => {
            assert_eq!(request_id, "r-1");
            assert_eq!(receipt.message_id, "3EB0");
            assert_eq!(receipt.recipient, "15551234567@s.whatsapp.net");
            assert_eq!(receipt.timestamp, 42);
        }
        other => panic!("expected a delivery, got {other:?}"),
    }
}

#[test]
fn test_credentials_with_path_traversal_are_rejected() {
    let frame = decode_upstream_frame(
        r#"{"type":"credentials","files":{"../escape.json":"e30="}}"#,
    )
    .unwrap();

    assert!(frame.into_inbound(|_| String::new()).is_err());
}

#[test]
fn test_client_frames_are_tagged_by_type() {
    let text = encode_client_frame(&ClientFrame::SendText {
        request_id: "r-9".into(),
        to: "1@s.whatsapp.net".into(),
        text: "hi".into(),
    })
    .unwrap();

    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["type"], "send_text");
    assert_eq!(value["request_id"], "r-9");
}
