//! HTTP request decoder module
//!
//! The decoder operates in two phases:
//! 1. Head parsing with [`RequestHeadDecoder`]
//! 2. Payload decoding with [`PayloadDecoder`], chosen from the classified [`PayloadSize`]

use crate::codec::MessageDecoder;
use crate::codec::body::PayloadDecoder;
use crate::codec::header::RequestHeadDecoder;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// A decoder for HTTP requests that handles both headers and payload
///
/// The decoder maintains its state through the `payload_decoder` field:
/// - `None`: currently parsing a head
/// - `Some(PayloadDecoder)`: currently parsing a payload
#[derive(Debug, Default)]
pub struct RequestDecoder {
    header_decoder: RequestHeadDecoder,
    payload_decoder: Option<PayloadDecoder>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    self.payload_decoder.take();
                    Some(Message::Payload(item))
                }
                None => None,
            };

            return Ok(message);
        }

        let message = match self.header_decoder.decode(src)? {
            Some((header, payload_size)) => {
                self.payload_decoder = Some(payload_size.into());
                Some(Message::Header((header, payload_size)))
            }
            None => None,
        };

        Ok(message)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.payload_decoder {
            Some(payload_decoder) => {
                let item = payload_decoder.decode_eof(src)?;
                if item.as_ref().is_some_and(PayloadItem::is_eof) {
                    self.payload_decoder.take();
                }
                Ok(item.map(Message::Payload))
            }
            None => match self.decode(src)? {
                Some(message) => Ok(Some(message)),
                None if src.is_empty() => Ok(None),
                None => Err(ParseError::invalid_header("connection closed inside a request head")),
            },
        }
    }
}

impl MessageDecoder<RequestHeader> for RequestDecoder {
    fn payload_complete(&self) -> bool {
        self.payload_decoder.as_ref().is_some_and(PayloadDecoder::is_complete)
    }
}
