//! HTTP response decoder for the client role.
//!
//! Whether a response has a body depends on the request it answers, so the decoder shares
//! [`SentMethods`] with the [`RequestEncoder`](crate::codec::RequestEncoder).
//!
//! refer: <https://www.rfc-editor.org/rfc/rfc9112.html#section-6.3>

use crate::codec::body::PayloadDecoder;
use crate::codec::header::ResponseHeadDecoder;
use crate::codec::{MessageDecoder, SentMethods};
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, ResponseHeader};
use bytes::BytesMut;
use http::{Method, StatusCode};
use tokio_util::codec::Decoder;
use tracing::trace;

#[derive(Debug)]
pub struct ResponseDecoder {
    header_decoder: ResponseHeadDecoder,
    payload_decoder: Option<PayloadDecoder>,
    sent_methods: SentMethods,
    /// A `101 Switching Protocols` was decoded, nothing after it is HTTP
    switched: bool,
}

impl ResponseDecoder {
    pub fn new(sent_methods: SentMethods) -> Self {
        Self { header_decoder: ResponseHeadDecoder, payload_decoder: None, sent_methods, switched: false }
    }

    fn classify(&self, header: &ResponseHeader, declared: Option<PayloadSize>) -> PayloadSize {
        // interim responses precede the final one for the same request
        if header.status().is_informational() && header.status() != StatusCode::SWITCHING_PROTOCOLS {
            return PayloadSize::Empty;
        }

        let method = self.sent_methods.pop();
        if method == Some(Method::HEAD) || !header.need_body() {
            return PayloadSize::Empty;
        }

        declared.unwrap_or(PayloadSize::UntilClose)
    }
}

impl Decoder for ResponseDecoder {
    type Item = Message<(ResponseHeader, PayloadSize)>;
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

        if self.switched {
            return Ok(None);
        }

        let message = match self.header_decoder.decode(src)? {
            Some((header, declared)) => {
                let payload_size = self.classify(&header, declared);
                if header.status() == StatusCode::SWITCHING_PROTOCOLS {
                    trace!("peer switched protocols");
                    self.switched = true;
                }
                trace!(status = header.status().as_u16(), ?payload_size, "classified response payload");
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
                None if src.is_empty() || self.switched => Ok(None),
                None => Err(ParseError::invalid_header("connection closed inside a response head")),
            },
        }
    }
}

impl MessageDecoder<ResponseHeader> for ResponseDecoder {
    fn payload_complete(&self) -> bool {
        self.payload_decoder.as_ref().is_some_and(PayloadDecoder::is_complete)
    }

    fn is_switched(&self) -> bool {
        self.switched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use indoc::indoc;

    fn wire(text: &str) -> BytesMut {
        BytesMut::from(text.replace('\n', "\r\n").as_str())
    }

    fn head(decoder: &mut ResponseDecoder, buffer: &mut BytesMut) -> PayloadSize {
        match decoder.decode(buffer).unwrap() {
            Some(Message::Header((_, payload_size))) => payload_size,
            other => panic!("expect head, got {other:?}"),
        }
    }

    #[test]
    fn response_to_head_has_no_body() {
        let sent = SentMethods::new();
        sent.push(Method::HEAD);
        let mut decoder = ResponseDecoder::new(sent);

        let mut buffer = wire(indoc! {"
            HTTP/1.1 200 OK
            Content-Length: 12

        "});
        assert_eq!(head(&mut decoder, &mut buffer), PayloadSize::Empty);
        assert!(matches!(decoder.decode(&mut buffer).unwrap(), Some(Message::Payload(PayloadItem::Eof))));
    }

    #[test]
    fn undelimited_response_runs_until_close() {
        let sent = SentMethods::new();
        sent.push(Method::GET);
        let mut decoder = ResponseDecoder::new(sent);

        let mut buffer = wire(indoc! {"
            HTTP/1.0 200 OK
            Server: test

        "});
        buffer.extend_from_slice(b"streamed");
        assert_eq!(head(&mut decoder, &mut buffer), PayloadSize::UntilClose);

        let Some(Message::Payload(PayloadItem::Chunk(bytes))) = decoder.decode(&mut buffer).unwrap() else { panic!("expect chunk") };
        assert_eq!(bytes, Bytes::from_static(b"streamed"));
        assert!(decoder.decode(&mut buffer).unwrap().is_none());
        assert!(matches!(decoder.decode_eof(&mut buffer).unwrap(), Some(Message::Payload(PayloadItem::Eof))));
    }

    #[test]
    fn interim_response_keeps_method() {
        let sent = SentMethods::new();
        sent.push(Method::HEAD);
        let mut decoder = ResponseDecoder::new(sent);

        let mut buffer = wire(indoc! {"
            HTTP/1.1 100 Continue

            HTTP/1.1 200 OK
            Transfer-Encoding: chunked

        "});
        assert_eq!(head(&mut decoder, &mut buffer), PayloadSize::Empty);
        assert!(matches!(decoder.decode(&mut buffer).unwrap(), Some(Message::Payload(PayloadItem::Eof))));
        assert_eq!(head(&mut decoder, &mut buffer), PayloadSize::Empty);
    }

    #[test]
    fn switching_protocols_leaves_the_rest_untouched() {
        let sent = SentMethods::new();
        sent.push(Method::GET);
        sent.push(Method::GET);
        let mut decoder = ResponseDecoder::new(sent.clone());

        let mut buffer = wire(indoc! {"
            HTTP/1.1 101 Switching Protocols
            Upgrade: echo
            Connection: upgrade

        "});
        buffer.extend_from_slice(b"\x00ping\r\n\r\n");

        assert!(!decoder.is_switched());
        assert_eq!(head(&mut decoder, &mut buffer), PayloadSize::Empty);
        assert!(decoder.is_switched());
        assert!(matches!(decoder.decode(&mut buffer).unwrap(), Some(Message::Payload(PayloadItem::Eof))));

        assert!(decoder.decode(&mut buffer).unwrap().is_none());
        assert!(decoder.decode_eof(&mut buffer).unwrap().is_none());
        assert_eq!(&buffer[..], b"\x00ping\r\n\r\n");
        // the 101 answered the first request
        assert_eq!(sent.pop(), Some(Method::GET));
        assert_eq!(sent.pop(), None);
    }

    #[test]
    fn no_content_ignores_declared_length() {
        let mut decoder = ResponseDecoder::new(SentMethods::new());
        let mut buffer = wire(indoc! {"
            HTTP/1.1 204 No Content
            Content-Length: 5

        "});
        assert_eq!(head(&mut decoder, &mut buffer), PayloadSize::Empty);
    }
}
