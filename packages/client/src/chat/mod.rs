//! Live chat: frame codec, connection wrapper and room coordinator.

mod codec;
mod connection;
mod event;
mod message;
mod room;
#[cfg(test)]
pub(crate) mod testing;
mod transport;

pub use codec::{parse, serialize};
pub use connection::{Connection, ConnectionEvent, ConnectionEvents, websocket_url};
pub use event::{ChatEvent, Command, MessageId};
pub use message::{ChatMessage, MessageLog};
pub use room::{
    DEFAULT_CHAT_PATH, RoomMembership, RoomOptions, RoomSession, RoomState, RoomUpdate,
};
pub use transport::{Connector, Transport, WsConnector, WsTransport};
