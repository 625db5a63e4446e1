//! HTTP head decoders for both roles.
//!
//! Parsing happens in two steps: `httparse` validates the head and yields borrowed slices,
//! the slices are recorded as byte ranges, and after the head is split off the source buffer
//! the header values are built from shared `Bytes` without copying.

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode, Uri, Version};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHeader, ResponseHeader};

/// Maximum number of headers allowed in a message head
const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire head section
const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Decodes request heads and classifies whether a body follows.
///
/// Requests whose method carries no body, or that declare neither `Content-Length` nor
/// chunked `Transfer-Encoding`, are classified as [`PayloadSize::Empty`].
#[derive(Debug, Default)]
pub struct RequestHeadDecoder;

impl Decoder for RequestHeadDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        let body_offset = match req.parse(src).map_err(map_httparse_error)? {
            Status::Complete(body_offset) => body_offset,
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
        };
        trace!(head_size = body_offset, "parsed request head");
        ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

        let version = parse_version(req.version)?;
        let method = req.method.ok_or(ParseError::InvalidMethod).and_then(|m| Method::from_bytes(m.as_bytes()).map_err(|_| ParseError::InvalidMethod))?;
        let uri = req.path.ok_or(ParseError::InvalidUri).and_then(|p| p.parse::<Uri>().map_err(|_| ParseError::InvalidUri))?;

        let indices = HeaderIndex::record(src, req.headers);
        let head_bytes = src.split_to(body_offset).freeze();

        let mut builder = Request::builder().method(method).uri(uri).version(version);
        if let Some(headers) = builder.headers_mut() {
            fill_headers(&head_bytes, &indices, headers)?;
        }
        let header = RequestHeader::from(builder.body(()).map_err(ParseError::invalid_header)?);

        let payload_size = if header.need_body() {
            PayloadSize::from_headers(header.headers())?.unwrap_or(PayloadSize::Empty)
        } else {
            PayloadSize::Empty
        };

        Ok(Some((header, payload_size)))
    }
}

/// Decodes response heads.
///
/// The payload size returned is the declared framing only, `None` when the response declares
/// neither header; whether the message really has a body also depends on the request it
/// answers, which the caller knows.
#[derive(Debug, Default)]
pub struct ResponseHeadDecoder;

impl Decoder for ResponseHeadDecoder {
    type Item = (ResponseHeader, Option<PayloadSize>);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut res = httparse::Response::new(&mut headers);

        let body_offset = match res.parse(src).map_err(map_httparse_error)? {
            Status::Complete(body_offset) => body_offset,
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
        };
        trace!(head_size = body_offset, "parsed response head");
        ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

        let version = parse_version(res.version)?;
        let status = res.code.and_then(|code| StatusCode::from_u16(code).ok()).ok_or(ParseError::InvalidStatus(res.code))?;

        let indices = HeaderIndex::record(src, res.headers);
        let head_bytes = src.split_to(body_offset).freeze();

        let mut builder = Response::builder().status(status).version(version);
        if let Some(headers) = builder.headers_mut() {
            fill_headers(&head_bytes, &indices, headers)?;
        }
        let header = ResponseHeader::from(builder.body(()).map_err(ParseError::invalid_header)?);

        let declared = PayloadSize::from_headers(header.headers())?;
        Ok(Some((header, declared)))
    }
}

fn map_httparse_error(e: httparse::Error) -> ParseError {
    match e {
        httparse::Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
        e => ParseError::invalid_header(e),
    }
}

fn parse_version(version: Option<u8>) -> Result<Version, ParseError> {
    match version {
        Some(0) => Ok(Version::HTTP_10),
        Some(1) => Ok(Version::HTTP_11),
        // HTTP/2 and HTTP/3 are not spoken over this connection
        v => Err(ParseError::InvalidVersion(v)),
    }
}

/// Byte ranges of one header's name and value within the head buffer.
#[derive(Debug, Clone, Copy)]
struct HeaderIndex {
    name: (usize, usize),
    value: (usize, usize),
}

impl HeaderIndex {
    fn record(bytes: &[u8], headers: &[httparse::Header<'_>]) -> Vec<HeaderIndex> {
        let base = bytes.as_ptr() as usize;
        headers
            .iter()
            .map(|header| {
                let name_start = header.name.as_ptr() as usize - base;
                let value_start = header.value.as_ptr() as usize - base;
                HeaderIndex {
                    name: (name_start, name_start + header.name.len()),
                    value: (value_start, value_start + header.value.len()),
                }
            })
            .collect()
    }
}

fn fill_headers(head_bytes: &Bytes, indices: &[HeaderIndex], headers: &mut HeaderMap) -> Result<(), ParseError> {
    headers.reserve(indices.len());
    for index in indices {
        let name = HeaderName::from_bytes(&head_bytes[index.name.0..index.name.1]).map_err(ParseError::invalid_header)?;
        let value =
            HeaderValue::from_maybe_shared(head_bytes.slice(index.value.0..index.value.1)).map_err(ParseError::invalid_header)?;
        headers.append(name, value);
    }
    Ok(())
}
