//! WebSocket transport to the upstream messaging endpoint.
//!
//! One WebSocket per [`Transport::open`] call.  The first frame sent is
//! `hello` carrying the stored credentials; after that the connection is
//! driven by two halves:
//!
//! - a reader task that decodes upstream frames, forwards lifecycle events to
//!   the event channel, and completes pending sends when their `send_ack` or
//!   `send_error` arrives.
//! - the [`TransportSession`] handle, which owns the write half.
//!
//! Dropping the session aborts the reader task, which closes the event
//! channel and the socket.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use relay_core::protocol::{encode_credentials, ClientFrame, Inbound};
use relay_core::{
    decode_upstream_frame, encode_client_frame, CloseReason, Credentials, Recipient, SendReceipt,
    TransportEvent,
};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    Transport, TransportConnection, TransportError, TransportSession, EVENT_CHANNEL_CAPACITY,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;

/// A `send_text` call waiting for its acknowledgement.
struct PendingSend {
    recipient: String,
    reply: oneshot::Sender<Result<SendReceipt, TransportError>>,
}

type PendingMap = Arc<Mutex<HashMap<String, PendingSend>>>;

// ── Transport ─────────────────────────────────────────────────────────────────

/// Opens WebSocket connections to a fixed upstream URL.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn connect_error(&self, detail: impl ToString) -> TransportError {
        TransportError::Connect {
            endpoint: self.url.clone(),
            detail: detail.to_string(),
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, credentials: Credentials) -> Result<TransportConnection, TransportError> {
        let (ws, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| self.connect_error(e))?;
        let (mut sink, stream) = ws.split();

        let hello = encode_client_frame(&ClientFrame::Hello {
            credentials: encode_credentials(&credentials),
        })?;
        sink.send(WsMessage::Text(hello))
            .await
            .map_err(|e| self.connect_error(e))?;

        info!(
            "upstream connection open to {} ({} credential file(s))",
            self.url,
            credentials.len()
        );

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let reader = tokio::spawn(read_upstream(stream, events_tx, Arc::clone(&pending)));

        Ok(TransportConnection {
            session: Arc::new(WebSocketSession {
                sink: tokio::sync::Mutex::new(sink),
                pending,
                reader,
            }),
            events: events_rx,
        })
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

struct WebSocketSession {
    sink: tokio::sync::Mutex<WsSink>,
    pending: PendingMap,
    reader: JoinHandle<()>,
}

impl WebSocketSession {
    async fn write(&self, frame: &ClientFrame) -> Result<(), TransportError> {
        let text = encode_client_frame(frame)?;
        let mut sink = self.sink.lock().await;
        sink.send(WsMessage::Text(text)).await.map_err(|e| match e {
            WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed,
            other => TransportError::Io(other.to_string()),
        })
    }
}

#[async_trait]
impl TransportSession for WebSocketSession {
    async fn send_text(
        &self,
        recipient: &Recipient,
        body: &str,
    ) -> Result<SendReceipt, TransportError> {
        let request_id = Uuid::new_v4().to_string();
        let frame = ClientFrame::SendText {
            request_id: request_id.clone(),
            to: recipient.to_string(),
            text: body.to_string(),
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().expect("lock poisoned").insert(
            request_id.clone(),
            PendingSend {
                recipient: recipient.to_string(),
                reply: reply_tx,
            },
        );

        if let Err(e) = self.write(&frame).await {
            self.pending.lock().expect("lock poisoned").remove(&request_id);
            return Err(e);
        }
        debug!("send_text {request_id} to {recipient} written");

        // The reader drops every pending sender when the socket ends.
        reply_rx.await.map_err(|_| TransportError::Closed)?
    }

    async fn logout(&self) -> Result<(), TransportError> {
        self.write(&ClientFrame::Logout).await?;
        let mut sink = self.sink.lock().await;
        sink.close()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }
}

impl Drop for WebSocketSession {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

// ── Reader task ───────────────────────────────────────────────────────────────

async fn read_upstream(
    mut stream: SplitStream<WsStream>,
    events: mpsc::Sender<TransportEvent>,
    pending: PendingMap,
) {
    let mut close_reported = false;

    loop {
        let text = match stream.next().await {
            Some(Ok(WsMessage::Text(text))) => text,
            Some(Ok(WsMessage::Close(frame))) => {
                debug!("upstream sent WebSocket close: {frame:?}");
                break;
            }
            Some(Ok(WsMessage::Binary(_))) => {
                warn!("unexpected binary frame from upstream (ignored)");
                continue;
            }
            Some(Ok(_)) => continue,
            Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) | None => break,
            Some(Err(e)) => {
                warn!("upstream WebSocket error: {e}");
                break;
            }
        };

        let frame = match decode_upstream_frame(&text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("dropping undecodable upstream frame: {e}");
                continue;
            }
        };
        let inbound = frame.into_inbound(|request_id| {
            pending
                .lock()
                .expect("lock poisoned")
                .get(request_id)
                .map(|p| p.recipient.clone())
                .unwrap_or_default()
        });

        match inbound {
            Ok(Inbound::Event(event)) => {
                if matches!(event, TransportEvent::Closed(_)) {
                    close_reported = true;
                }
                if events.send(event).await.is_err() {
                    // Nobody is listening any more; the session was released.
                    break;
                }
            }
            Ok(Inbound::Delivered {
                request_id,
                receipt,
            }) => complete(&pending, &request_id, Ok(receipt)),
            Ok(Inbound::Rejected { request_id, error }) => {
                complete(&pending, &request_id, Err(TransportError::Rejected(error)))
            }
            Err(e) => warn!("dropping invalid upstream frame: {e}"),
        }
    }

    // Fail every in-flight send by dropping its reply sender.
    pending.lock().expect("lock poisoned").clear();

    if !close_reported {
        let _ = events
            .send(TransportEvent::Closed(CloseReason::Transient(
                "upstream connection ended".to_string(),
            )))
            .await;
    }
}

fn complete(
    pending: &PendingMap,
    request_id: &str,
    result: Result<SendReceipt, TransportError>,
) {
    let entry = pending.lock().expect("lock poisoned").remove(request_id);
    match entry {
        Some(waiter) => {
            let _ = waiter.reply.send(result);
        }
        None => debug!("acknowledgement for unknown request {request_id} (ignored)"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
