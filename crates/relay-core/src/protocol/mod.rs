//! Protocol module: transport lifecycle events and the upstream JSON frames.

pub mod codec;
pub mod events;
pub mod frames;

pub use codec::{
    decode_credentials, decode_upstream_frame, encode_client_frame, encode_credentials, Inbound,
    ProtocolError,
};
pub use events::{CloseReason, SendReceipt, TransportEvent, LOGGED_OUT_STATUS};
pub use frames::{ClientFrame, UpstreamFrame};
