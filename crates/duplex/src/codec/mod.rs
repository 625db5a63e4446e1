//! HTTP/1.1 framing for both connection roles.
//!
//! This module turns bytes into [`Message`]s and back, streaming the payload rather than
//! buffering whole bodies.
//!
//! # Architecture
//!
//! - Server role:
//!   - [`RequestDecoder`]: decodes inbound requests
//!   - [`ResponseEncoder`]: encodes outbound responses
//! - Client role:
//!   - [`ResponseDecoder`]: decodes inbound responses, consulting the methods already sent
//!   - [`RequestEncoder`]: encodes outbound requests, recording each method it sends
//! - Shared pieces:
//!   - head parsing and serialization in [`header`]
//!   - payload framing in [`body`]
//!   - [`Decompressor`]: inflates `gzip` and `deflate` response bodies
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use micro_duplex::codec::RequestDecoder;
//! use micro_duplex::protocol::Message;
//! use tokio_util::codec::Decoder;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::from(&b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n"[..]);
//!
//! let message = decoder.decode(&mut buffer).unwrap().unwrap();
//! assert!(matches!(message, Message::Header(_)));
//! ```

mod body;
mod decompress;
mod header;
mod request_decoder;
mod request_encoder;
mod response_decoder;
mod response_encoder;

pub use decompress::Decompressor;
pub use request_decoder::RequestDecoder;
pub use request_encoder::RequestEncoder;
pub use response_decoder::ResponseDecoder;
pub use response_encoder::ResponseEncoder;

pub(crate) use header::FastWrite;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use http::Method;
use tokio_util::codec::Decoder;

use crate::protocol::{Message, ParseError, PayloadSize};

/// A decoder producing message heads followed by their payload.
pub trait MessageDecoder<H>: Decoder<Item = Message<(H, PayloadSize)>, Error = ParseError> + Send + 'static {
    /// Returns true when the payload in progress has been fully handed out and the next
    /// `decode` yields its `Eof` without needing more input.
    fn payload_complete(&self) -> bool;

    /// Returns true once the peer switched protocols. The decoder then leaves all further input
    /// untouched for whatever replaces it.
    fn is_switched(&self) -> bool {
        false
    }
}

/// Methods of the requests written on a client connection, oldest first.
///
/// The encoder pushes, the decoder pops once the matching final response head arrives.
#[derive(Debug, Clone, Default)]
pub struct SentMethods {
    inner: Arc<Mutex<VecDeque<Method>>>,
}

impl SentMethods {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, method: Method) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).push_back(method);
    }

    pub(crate) fn pop(&self) -> Option<Method> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).pop_front()
    }
}
