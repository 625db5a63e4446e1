//! The transport contract the connection runs on, and its implementation over tokio I/O.
//!
//! A transport delivers ordered [`TransportEvent`]s to a single [`EventHandler`] from one
//! delivery context, and accepts outbound frames through [`Transport::write`]. Delivery can be
//! paused with [`Transport::set_auto_read`] and resumed one cycle at a time with
//! [`Transport::read`].
//!
//! Inbound bytes pass through named processing stages:
//!
//! | name            | role                                            |
//! |-----------------|-------------------------------------------------|
//! | `logger`        | traces every event and frame at `debug`         |
//! | `http-codec`    | decodes heads and payloads, encodes frames      |
//! | `decompressor`  | inflates `gzip` and `deflate` bodies            |

mod io;
mod message_writer;
mod pipeline;

pub use io::{Driver, IoTransport};

use std::future::Future;

use bytes::Bytes;

use crate::protocol::{ConnectionError, Message, PayloadSize, ProtocolViolation, SendError};

pub const LOGGER: &str = "logger";
pub const HTTP_CODEC: &str = "http-codec";
pub const DECOMPRESSOR: &str = "decompressor";

/// An event produced by the inbound stages, in wire order.
#[derive(Debug)]
pub enum TransportEvent<H> {
    /// A message head and how its payload is delimited.
    Head(H, PayloadSize),
    /// A fragment of the current payload.
    Content(Bytes),
    /// The final fragment of the current payload, possibly empty.
    LastContent(Bytes),
    /// No more data is currently available from the socket.
    ReadComplete,
    /// Unframed bytes, once the `http-codec` stage has been removed.
    Raw(Bytes),
    /// The transport closed.
    Closed,
}

impl<H> TransportEvent<H> {
    pub fn name(&self) -> &'static str {
        match self {
            TransportEvent::Head(..) => "head",
            TransportEvent::Content(_) => "content",
            TransportEvent::LastContent(_) => "last content",
            TransportEvent::ReadComplete => "read complete",
            TransportEvent::Raw(_) => "raw bytes",
            TransportEvent::Closed => "closed",
        }
    }
}

/// Mutable view of the named processing stages, only reachable from the delivery context.
pub trait Stages {
    fn names(&self) -> Vec<&'static str>;

    /// Removes the stage, returning whether it was installed.
    fn remove(&mut self, name: &str) -> bool;
}

/// Work executed on the delivery context, between two events.
pub type ContextTask = Box<dyn FnOnce(&mut dyn Stages) + Send>;

/// Receives events from the delivery context.
///
/// A violation tears the transport down.
pub trait EventHandler<H>: Send + 'static {
    fn on_event(&mut self, event: TransportEvent<H>) -> impl Future<Output = Result<(), ProtocolViolation>> + Send;
}

pub trait Transport: Send + Sync + 'static {
    /// The head type accepted by [`write`](Transport::write).
    type OutHead: Send + 'static;

    /// Encodes and writes one frame, completing once it has been flushed.
    fn write(&self, frame: Message<(Self::OutHead, PayloadSize)>) -> impl Future<Output = Result<(), SendError>> + Send;

    fn is_open(&self) -> bool;

    /// Closes the transport; the closed signal fires exactly once.
    fn close(&self) -> impl Future<Output = ()> + Send;

    /// Completes once the transport has closed.
    fn closed(&self) -> impl Future<Output = ()> + Send;

    /// Pauses or resumes automatic delivery of inbound events.
    fn set_auto_read(&self, auto_read: bool);

    /// Grants one more read cycle while automatic delivery is paused.
    fn read(&self);

    /// Runs `task` on the delivery context, mutually excluded with event delivery.
    fn run_in_context(&self, task: ContextTask) -> impl Future<Output = Result<(), ConnectionError>> + Send;
}
