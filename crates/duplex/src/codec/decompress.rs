//! Response body inflation for the client role.
//!
//! Only `gzip` (and its `x-gzip` alias) and `deflate` are understood; any other coding is
//! passed through untouched along with its `Content-Encoding` header.

use std::io::{self, Write};

use bytes::{BufMut, Bytes, BytesMut};
use flate2::write::{GzDecoder, ZlibDecoder};
use http::{HeaderValue, header};
use tracing::trace;

use crate::protocol::{MessageHead, ParseError, PayloadSize};

/// Inflates the payload of one message at a time.
#[derive(Debug, Default)]
pub struct Decompressor {
    inflater: Option<Inflater>,
}

#[derive(Debug)]
enum Inflater {
    Gzip(GzDecoder<Writer>),
    Deflate(ZlibDecoder<Writer>),
}

impl Decompressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspects a freshly decoded head and prepares to inflate its payload.
    ///
    /// When a known coding is found the head loses `Content-Encoding` and `Content-Length`,
    /// and the payload is reported as chunked since the inflated length is unknown.
    pub fn on_head<H: MessageHead>(&mut self, head: &mut H, payload_size: &mut PayloadSize) {
        self.inflater = None;
        if payload_size.is_empty() {
            return;
        }

        let Some(inflater) = head.headers().get(header::CONTENT_ENCODING).and_then(Inflater::select) else {
            return;
        };
        trace!(encoding = inflater.name(), "inflating message payload");

        let headers = head.headers_mut();
        headers.remove(header::CONTENT_ENCODING);
        headers.remove(header::CONTENT_LENGTH);
        *payload_size = PayloadSize::Chunked;
        self.inflater = Some(inflater);
    }

    /// Inflates one payload chunk, returning whatever output is available so far.
    pub fn inflate(&mut self, bytes: Bytes) -> Result<Bytes, ParseError> {
        match &mut self.inflater {
            Some(inflater) => {
                inflater.write(&bytes).map_err(|e| ParseError::invalid_body(format!("can't inflate payload: {e}")))?;
                Ok(inflater.take())
            }
            None => Ok(bytes),
        }
    }

    /// Inflates the final chunk and flushes the inflater.
    pub fn finish(&mut self, bytes: Bytes) -> Result<Bytes, ParseError> {
        let Some(mut inflater) = self.inflater.take() else {
            return Ok(bytes);
        };

        inflater.write(&bytes).map_err(|e| ParseError::invalid_body(format!("can't inflate payload: {e}")))?;
        inflater.try_finish().map_err(|e| ParseError::invalid_body(format!("truncated compressed payload: {e}")))?;
        Ok(inflater.take())
    }
}

impl Inflater {
    fn select(value: &HeaderValue) -> Option<Self> {
        let coding = value.to_str().ok()?.trim();
        if coding.eq_ignore_ascii_case("gzip") || coding.eq_ignore_ascii_case("x-gzip") {
            Some(Self::Gzip(GzDecoder::new(Writer::new())))
        } else if coding.eq_ignore_ascii_case("deflate") {
            Some(Self::Deflate(ZlibDecoder::new(Writer::new())))
        } else {
            None
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Inflater::Gzip(_) => "gzip",
            Inflater::Deflate(_) => "deflate",
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            Self::Gzip(decoder) => decoder.write_all(data),
            Self::Deflate(decoder) => decoder.write_all(data),
        }
    }

    fn try_finish(&mut self) -> io::Result<()> {
        match self {
            Self::Gzip(decoder) => decoder.try_finish(),
            Self::Deflate(decoder) => decoder.try_finish(),
        }
    }

    fn take(&mut self) -> Bytes {
        match self {
            Self::Gzip(decoder) => decoder.get_mut().take(),
            Self::Deflate(decoder) => decoder.get_mut().take(),
        }
    }
}

#[derive(Debug)]
struct Writer {
    buf: BytesMut,
}

impl Writer {
    fn new() -> Self {
        Self { buf: BytesMut::with_capacity(8192) }
    }

    fn take(&mut self) -> Bytes {
        self.buf.split().freeze()
    }
}

impl Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ResponseHeader;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use http::Response;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn inflates_gzip_payload() {
        let compressed = gzip(b"hello hello hello hello");
        let mut head = ResponseHeader::from(
            Response::builder().header("Content-Encoding", "gzip").header("Content-Length", compressed.len()).body(()).unwrap(),
        );
        let mut payload_size = PayloadSize::Length(compressed.len() as u64);

        let mut decompressor = Decompressor::new();
        decompressor.on_head(&mut head, &mut payload_size);
        assert_eq!(payload_size, PayloadSize::Chunked);
        assert!(head.headers().get(header::CONTENT_ENCODING).is_none());
        assert!(head.headers().get(header::CONTENT_LENGTH).is_none());

        let (first, rest) = compressed.split_at(compressed.len() / 2);
        let mut inflated = BytesMut::new();
        inflated.extend_from_slice(&decompressor.inflate(Bytes::copy_from_slice(first)).unwrap());
        inflated.extend_from_slice(&decompressor.finish(Bytes::copy_from_slice(rest)).unwrap());
        assert_eq!(&inflated[..], b"hello hello hello hello");
    }

    #[test]
    fn passes_through_identity() {
        let mut head = ResponseHeader::from(Response::builder().header("Content-Encoding", "br").body(()).unwrap());
        let mut payload_size = PayloadSize::Length(4);

        let mut decompressor = Decompressor::new();
        decompressor.on_head(&mut head, &mut payload_size);
        assert_eq!(payload_size, PayloadSize::Length(4));
        assert_eq!(decompressor.finish(Bytes::from_static(b"raw!")).unwrap(), Bytes::from_static(b"raw!"));
    }

    #[test]
    fn truncated_gzip_fails() {
        let compressed = gzip(b"some body");
        let mut head = ResponseHeader::from(Response::builder().header("Content-Encoding", "gzip").body(()).unwrap());
        let mut payload_size = PayloadSize::Chunked;

        let mut decompressor = Decompressor::new();
        decompressor.on_head(&mut head, &mut payload_size);
        assert!(decompressor.finish(Bytes::copy_from_slice(&compressed[..compressed.len() - 4])).is_err());
    }
}
