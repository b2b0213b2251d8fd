//! WebSocket transport for the relay.
//!
//! `session` holds the per-connection actor, `server` the messaging core it
//! feeds, `pool` the outbound channels of every open socket.

mod connection;
mod pool;
mod server;
mod session;

pub use connection::{ClientMessage, ConnectionHandle, ConnectionState, ServerMessage, SubmitMessage};
pub use pool::{ConnectionPool, OutboundSender};
pub use server::{ChatServer, Dispatch};
pub use session::{websocket_route, WebSocketSession};
