//! Connection roles.
//!
//! A role fixes which head type a connection reads and which it writes, the framing codecs
//! that go with them, and who takes the first turn.

use std::fmt::Debug;

use tokio_util::codec::Encoder;

use crate::codec::{MessageDecoder, RequestDecoder, RequestEncoder, ResponseDecoder, ResponseEncoder, SentMethods};
use crate::protocol::{Message, MessageHead, PayloadSize, RequestHeader, ResponseHeader, SendError};

pub trait Role: Send + Sync + 'static {
    /// The head type read from the peer.
    type InHead: MessageHead + Debug;

    /// The head type written to the peer.
    type OutHead: MessageHead + Debug;

    type Decoder: MessageDecoder<Self::InHead> + Debug;

    type Encoder: Encoder<Message<(Self::OutHead, PayloadSize)>, Error = SendError> + Debug + Send + 'static;

    /// `true` when this side must acquire the turn before writing and hands it back after
    /// reading; the other side does the opposite.
    const WRITE_FIRST: bool;

    /// Whether inbound bodies may be inflated by the decompression stage.
    const DECOMPRESS: bool;

    fn name() -> &'static str;

    /// Creates a fresh decoder and encoder pair for one connection.
    fn codec() -> (Self::Decoder, Self::Encoder);
}

/// Sends requests and reads responses.
#[derive(Debug, Clone, Copy)]
pub struct Client;

/// Reads requests and sends responses.
#[derive(Debug, Clone, Copy)]
pub struct Server;

impl Role for Client {
    type InHead = ResponseHeader;
    type OutHead = RequestHeader;
    type Decoder = ResponseDecoder;
    type Encoder = RequestEncoder;

    const WRITE_FIRST: bool = true;
    const DECOMPRESS: bool = true;

    fn name() -> &'static str {
        "client"
    }

    fn codec() -> (Self::Decoder, Self::Encoder) {
        let sent_methods = SentMethods::new();
        (ResponseDecoder::new(sent_methods.clone()), RequestEncoder::new(sent_methods))
    }
}

impl Role for Server {
    type InHead = RequestHeader;
    type OutHead = ResponseHeader;
    type Decoder = RequestDecoder;
    type Encoder = ResponseEncoder;

    const WRITE_FIRST: bool = false;
    const DECOMPRESS: bool = false;

    fn name() -> &'static str {
        "server"
    }

    fn codec() -> (Self::Decoder, Self::Encoder) {
        (RequestDecoder::new(), ResponseEncoder::new())
    }
}
