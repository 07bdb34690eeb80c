pub mod messages;

pub use messages::{InboundMessage, OutboundMessage, ProtocolError};
