//! The turn-based connection state machine.
//!
//! # Components
//!
//! - [`Connection`]: `read`, `write`, `upgrade` and `close` for one connection
//! - [`TransportEventHandler`]: feeds transport events into the connection's queues
//! - [`Upgraded`]: raw byte passthrough once the connection has been upgraded
//! - [`client`], [`server`] and [`connect`]: assemble a connection over tokio I/O halves
//!
//! # Turns
//!
//! A client takes the turn to write a request and gives it back once the response body has
//! been read; a server takes it when a request has been read and gives it back when it starts
//! writing the response. A body that is dropped half read is drained in the background, and
//! the next `read`, `write` or `upgrade` waits for that drain first.

mod content_sink;
mod event_handler;
mod factory;
mod http_connection;
mod turn;
mod upgrade;

pub use event_handler::TransportEventHandler;
pub use factory::{IoConnection, client, connect, server};
pub use http_connection::Connection;
pub use upgrade::Upgraded;

pub(crate) use http_connection::Shared;
