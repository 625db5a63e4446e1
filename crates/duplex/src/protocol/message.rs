use bytes::{Buf, Bytes};
use http::{HeaderMap, HeaderValue};
use http_body::SizeHint;

use crate::protocol::ParseError;

/// Represents a HTTP message that can either be a head or payload.
///
/// The same type is used on both sides of the wire: decoders produce it from inbound bytes and
/// encoders consume it when a message is written. `T` is usually `(head, PayloadSize)`.
#[derive(Debug)]
pub enum Message<T, Data: Buf = Bytes> {
    /// Contains the head information of type `T`
    Header(T),
    /// Contains a chunk of payload data or EOF marker
    Payload(PayloadItem<Data>),
}

/// Represents an item in the HTTP message payload stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    /// A chunk of payload data
    Chunk(Data),
    /// Marks the end of the payload stream
    Eof,
}

/// How the payload of a message is delimited on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// Payload with known length in bytes
    Length(u64),
    /// Payload using chunked transfer encoding
    Chunked,
    /// Payload bounded only by the transport closing, only valid for responses
    UntilClose,
    /// Empty payload (no body)
    Empty,
}

impl PayloadSize {
    #[inline]
    pub fn new_length(length: u64) -> Self {
        if length == 0 { PayloadSize::Empty } else { PayloadSize::Length(length) }
    }

    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    #[inline]
    pub fn is_until_close(&self) -> bool {
        matches!(self, PayloadSize::UntilClose)
    }

    /// Returns true if the message carries no body at all
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }

    /// Reads the framing declared by `Transfer-Encoding` and `Content-Length`.
    ///
    /// Returns `Ok(None)` when neither header is present, leaving the decision to the caller.
    ///
    /// refer: <https://www.rfc-editor.org/rfc/rfc9112.html#name-message-body-length>
    pub fn from_headers(headers: &HeaderMap) -> Result<Option<Self>, ParseError> {
        let te_header = headers.get(http::header::TRANSFER_ENCODING);
        let cl_header = headers.get(http::header::CONTENT_LENGTH);

        match (te_header, cl_header) {
            (None, None) => Ok(None),

            (Some(te_value), None) => {
                if is_chunked(te_value) {
                    Ok(Some(PayloadSize::Chunked))
                } else {
                    Err(ParseError::invalid_header("transfer-encoding present but chunked is not the final encoding"))
                }
            }

            (None, Some(cl_value)) => {
                let cl_str = cl_value.to_str().map_err(|_| ParseError::invalid_content_length("value can't to_str"))?;

                let length =
                    cl_str.trim().parse::<u64>().map_err(|_| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;

                Ok(Some(PayloadSize::new_length(length)))
            }

            (Some(_), Some(_)) => Err(ParseError::invalid_content_length("transfer_encoding and content_length both present in headers")),
        }
    }
}

/// Checks if the Transfer-Encoding header indicates chunked encoding.
///
/// According to RFC 7230, chunked must be the last encoding if present.
pub(crate) fn is_chunked(value: &HeaderValue) -> bool {
    value.as_bytes().rsplit(|b| *b == b',').next().is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}

impl From<SizeHint> for PayloadSize {
    fn from(size_hint: SizeHint) -> Self {
        match size_hint.exact() {
            Some(length) => PayloadSize::new_length(length),
            None => PayloadSize::Chunked,
        }
    }
}

impl<T> Message<T> {
    /// Returns true if this message contains payload data
    #[inline]
    pub fn is_payload(&self) -> bool {
        matches!(self, Message::Payload(_))
    }

    /// Returns true if this message contains header information
    #[inline]
    pub fn is_header(&self) -> bool {
        matches!(self, Message::Header(_))
    }
}

impl<T> From<Bytes> for Message<T> {
    fn from(bytes: Bytes) -> Self {
        Self::Payload(PayloadItem::Chunk(bytes))
    }
}

impl<D: Buf> PayloadItem<D> {
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }
}

impl PayloadItem {
    /// Returns a reference to the contained bytes if this is a Chunk
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }

    /// Consumes the PayloadItem and returns the contained bytes if this is a Chunk
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_is_chunked() {
        assert!(is_chunked(&HeaderValue::from_static("chunked")));
        assert!(is_chunked(&HeaderValue::from_static("gzip, chunked")));
        assert!(is_chunked(&HeaderValue::from_static("gzip, Chunked ")));
        assert!(!is_chunked(&HeaderValue::from_static("chunked, gzip")));
        assert!(!is_chunked(&HeaderValue::from_static("gzip")));
    }

    #[test]
    fn payload_size_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(PayloadSize::from_headers(&headers).unwrap(), None);

        headers.insert(http::header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        assert_eq!(PayloadSize::from_headers(&headers).unwrap(), Some(PayloadSize::Length(12)));

        headers.insert(http::header::CONTENT_LENGTH, HeaderValue::from_static("0"));
        assert_eq!(PayloadSize::from_headers(&headers).unwrap(), Some(PayloadSize::Empty));

        headers.insert(http::header::CONTENT_LENGTH, HeaderValue::from_static("abc"));
        assert!(matches!(PayloadSize::from_headers(&headers), Err(ParseError::InvalidContentLength { .. })));

        headers.remove(http::header::CONTENT_LENGTH);
        headers.insert(http::header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        assert_eq!(PayloadSize::from_headers(&headers).unwrap(), Some(PayloadSize::Chunked));

        headers.insert(http::header::CONTENT_LENGTH, HeaderValue::from_static("3"));
        assert!(PayloadSize::from_headers(&headers).is_err());
    }

    #[test]
    fn payload_size_from_size_hint() {
        assert_eq!(PayloadSize::from(SizeHint::with_exact(0)), PayloadSize::Empty);
        assert_eq!(PayloadSize::from(SizeHint::with_exact(7)), PayloadSize::Length(7));
        assert_eq!(PayloadSize::from(SizeHint::new()), PayloadSize::Chunked);
    }
}
