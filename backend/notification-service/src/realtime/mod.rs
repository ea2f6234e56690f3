pub mod hub;
pub mod messages;

pub use hub::{ConnectionId, ConnectionState, RealtimeConnection, RealtimeHub, Room};
pub use messages::{ClientSignal, Handshake, HandshakeQuery, ServerEvent};
