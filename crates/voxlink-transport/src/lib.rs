//! Transport seam: a persistent duplex message channel addressed
//! per-session, with typed envelopes from `voxlink-protocol`.

pub mod adapter;
pub mod ws;

pub use adapter::{TransportAdapter, TransportConfig, TransportEvent};
pub use ws::WsChannel;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Channel is closed")]
    Closed,

    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] voxlink_protocol::ProtocolError),
}

/// Raw text-frame duplex channel. One implementation speaks WebSocket;
/// tests substitute scripted fakes.
#[async_trait]
pub trait MessageChannel: Send {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Next inbound text frame; `None` once the channel has closed.
    async fn recv(&mut self) -> Option<String>;

    async fn close(&mut self);
}
