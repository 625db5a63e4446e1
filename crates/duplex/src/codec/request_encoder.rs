use crate::codec::SentMethods;
use crate::codec::body::PayloadEncoder;
use crate::codec::header::RequestHeadEncoder;
use crate::protocol::{Message, PayloadSize, RequestHeader, SendError};
use bytes::{Buf, BytesMut};
use std::io;
use std::io::ErrorKind;
use tokio_util::codec::Encoder;
use tracing::error;

/// Encodes outbound requests and records each method for the paired
/// [`ResponseDecoder`](crate::codec::ResponseDecoder).
#[derive(Debug)]
pub struct RequestEncoder {
    header_encoder: RequestHeadEncoder,
    payload_encoder: Option<PayloadEncoder>,
    sent_methods: SentMethods,
}

impl RequestEncoder {
    pub fn new(sent_methods: SentMethods) -> Self {
        Self { header_encoder: RequestHeadEncoder, payload_encoder: None, sent_methods }
    }
}

impl<D: Buf> Encoder<Message<(RequestHeader, PayloadSize), D>> for RequestEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(RequestHeader, PayloadSize), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, payload_size)) => {
                if self.payload_encoder.is_some() {
                    error!("expect payload item but receive request head");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                let method = head.method().clone();
                self.header_encoder.encode((head, payload_size), dst)?;
                self.sent_methods.push(method);
                self.payload_encoder = Some(payload_size.into());
                Ok(())
            }

            Message::Payload(payload_item) => {
                let Some(payload_encoder) = &mut self.payload_encoder else {
                    error!("expect request header but receive payload item");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                };

                let result = payload_encoder.encode(payload_item, dst);

                if payload_encoder.is_finish() || result.is_err() {
                    self.payload_encoder.take();
                }

                result
            }
        }
    }
}
