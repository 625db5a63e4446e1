//! A turn-based HTTP/1.1 connection engine
//!
//! This crate turns a full-duplex byte stream into a disciplined request/response exchange:
//! message heads are read and written in turns, bodies stream chunk by chunk with transport
//! backpressure, and a connection can be upgraded to raw byte passthrough. The same engine
//! drives both ends of a connection, the role only decides who speaks first.
//!
//! # Features
//!
//! - Client and server roles over any tokio `AsyncRead`/`AsyncWrite` pair
//! - Streaming, one-shot inbound bodies with automatic drain when abandoned
//! - Read pausing so a slow consumer never buffers a fast peer
//! - Content-Length, chunked and close-delimited framing
//! - On-the-fly `gzip`/`deflate` inflation of response bodies
//! - Protocol upgrade to raw bytes
//!
//! # Example
//!
//! ```no_run
//! use http::{Response, StatusCode};
//! use micro_duplex::{ConnectionConfig, connection};
//! use micro_duplex::protocol::ResponseHeader;
//! use tokio::net::TcpListener;
//! use tracing::{Level, error, info, warn};
//! use tracing_subscriber::FmtSubscriber;
//!
//! #[tokio::main]
//! async fn main() {
//!     let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
//!     tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
//!
//!     info!(port = 8080, "start listening");
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!     let config = ConnectionConfig::new(tokio::runtime::Handle::current());
//!
//!     loop {
//!         let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let (reader, writer) = tcp_stream.into_split();
//!         let connection = connection::server(reader, writer, &config);
//!         tokio::spawn(async move {
//!             while let Ok((request, body)) = connection.read().await {
//!                 info!(path = request.uri().path(), "receiving request");
//!                 // echo the request body back
//!                 let response = Response::builder()
//!                     .status(StatusCode::OK)
//!                     .header(http::header::TRANSFER_ENCODING, "chunked")
//!                     .body(())
//!                     .unwrap();
//!                 if let Err(e) = connection.write(ResponseHeader::from(response), body.stream()).await {
//!                     warn!(cause = %e, "can't write response");
//!                     break;
//!                 }
//!             }
//!         });
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`connection`]: the connection state machine and its assembly for a [`role`]
//! - [`transport`]: the transport contract and its tokio I/O implementation
//! - [`codec`]: HTTP/1.1 framing for both roles
//! - [`protocol`]: heads, bodies, framing units and errors
//! - [`sync`]: the turn permit and the queues bridging the transport and the consumer

pub mod codec;
pub mod connection;
pub mod protocol;
pub mod role;
pub mod sync;
pub mod transport;

mod config;
mod utils;

pub use config::ConnectionConfig;
pub(crate) use utils::ensure;
