//! HTTP head encoders for both roles.
//!
//! The encoders own the framing headers: whatever the caller put into `Content-Length` or
//! `Transfer-Encoding` is replaced by what the [`PayloadSize`] says.

use std::io::{self, Write};

use bytes::{BufMut, BytesMut};
use http::{HeaderMap, HeaderValue, Version, header};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::protocol::{PayloadSize, RequestHeader, ResponseHeader, SendError};

/// Initial buffer size reserved for head serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

const CHUNKED_VALUE: HeaderValue = HeaderValue::from_static("chunked");
const ZERO_VALUE: HeaderValue = HeaderValue::from_static("0");

#[derive(Debug, Default)]
pub struct ResponseHeadEncoder;

impl Encoder<(ResponseHeader, PayloadSize)> for ResponseHeadEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHeader, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (header, payload_size) = item;
        let need_body = header.need_body();
        let mut response = header.into_inner();

        dst.reserve(INIT_HEADER_SIZE);
        let status = response.status();
        write!(FastWrite(dst), "{} {} {}\r\n", version_str(response.version())?, status.as_str(), status.canonical_reason().unwrap_or(""))?;

        let headers = response.headers_mut();
        match payload_size {
            // bodyless statuses must not advertise a length
            PayloadSize::Empty if !need_body => {
                headers.remove(header::CONTENT_LENGTH);
                headers.remove(header::TRANSFER_ENCODING);
            }
            payload_size => set_framing(headers, payload_size),
        }

        write_fields(headers, dst);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RequestHeadEncoder;

impl Encoder<(RequestHeader, PayloadSize)> for RequestHeadEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (RequestHeader, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (header, payload_size) = item;
        if payload_size.is_until_close() {
            return Err(SendError::invalid_head("a request body can't be delimited by closing the connection"));
        }
        let mut request = header.into_inner();

        dst.reserve(INIT_HEADER_SIZE);
        let target = request.uri().path_and_query().map_or("/", |path_and_query| path_and_query.as_str());
        write!(FastWrite(dst), "{} {} {}\r\n", request.method(), target, version_str(request.version())?)?;

        if let Some(authority) = request.uri().authority().cloned() {
            if !request.headers().contains_key(header::HOST) {
                let host = HeaderValue::from_str(authority.as_str()).map_err(SendError::invalid_head)?;
                request.headers_mut().insert(header::HOST, host);
            }
        }

        let headers = request.headers_mut();
        match payload_size {
            PayloadSize::Empty => {
                headers.remove(header::CONTENT_LENGTH);
                headers.remove(header::TRANSFER_ENCODING);
            }
            payload_size => set_framing(headers, payload_size),
        }

        write_fields(headers, dst);
        Ok(())
    }
}

fn version_str(version: Version) -> Result<&'static str, SendError> {
    match version {
        Version::HTTP_11 => Ok("HTTP/1.1"),
        Version::HTTP_10 => Ok("HTTP/1.0"),
        v => {
            error!(http_version = ?v, "unsupported http version");
            Err(io::Error::from(io::ErrorKind::Unsupported).into())
        }
    }
}

fn set_framing(headers: &mut HeaderMap, payload_size: PayloadSize) {
    match payload_size {
        PayloadSize::Length(n) => {
            headers.remove(header::TRANSFER_ENCODING);
            headers.insert(header::CONTENT_LENGTH, n.into());
        }
        PayloadSize::Chunked => {
            headers.remove(header::CONTENT_LENGTH);
            headers.insert(header::TRANSFER_ENCODING, CHUNKED_VALUE);
        }
        PayloadSize::Empty => {
            headers.remove(header::TRANSFER_ENCODING);
            headers.insert(header::CONTENT_LENGTH, ZERO_VALUE);
        }
        PayloadSize::UntilClose => {
            headers.remove(header::CONTENT_LENGTH);
            headers.remove(header::TRANSFER_ENCODING);
        }
    }
}

fn write_fields(headers: &HeaderMap, dst: &mut BytesMut) {
    for (header_name, header_value) in headers {
        dst.put_slice(header_name.as_ref());
        dst.put_slice(b": ");
        dst.put_slice(header_value.as_ref());
        dst.put_slice(b"\r\n");
    }
    dst.put_slice(b"\r\n");
}

/// Writer over `BytesMut`, space has already been reserved.
pub(crate) struct FastWrite<'a>(pub(crate) &'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, Request, Response, StatusCode};

    fn encode_response(response: Response<()>, payload_size: PayloadSize) -> String {
        let mut dst = BytesMut::new();
        ResponseHeadEncoder.encode((response.into(), payload_size), &mut dst).unwrap();
        String::from_utf8(dst.to_vec()).unwrap()
    }

    fn encode_request(request: Request<()>, payload_size: PayloadSize) -> String {
        let mut dst = BytesMut::new();
        RequestHeadEncoder.encode((request.into(), payload_size), &mut dst).unwrap();
        String::from_utf8(dst.to_vec()).unwrap()
    }

    #[test]
    fn response_with_length() {
        let response = Response::builder().status(StatusCode::OK).header("x-id", "1").body(()).unwrap();
        let encoded = encode_response(response, PayloadSize::Length(5));
        assert!(encoded.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(encoded.contains("content-length: 5\r\n"));
        assert!(encoded.contains("x-id: 1\r\n"));
        assert!(encoded.ends_with("\r\n\r\n"));
    }

    #[test]
    fn response_chunked_replaces_length() {
        let response = Response::builder().header(header::CONTENT_LENGTH, 10).body(()).unwrap();
        let encoded = encode_response(response, PayloadSize::Chunked);
        assert!(encoded.contains("transfer-encoding: chunked\r\n"));
        assert!(!encoded.contains("content-length"));
    }

    #[test]
    fn switching_protocols_has_no_framing() {
        let response = Response::builder().status(StatusCode::SWITCHING_PROTOCOLS).header(header::UPGRADE, "echo").body(()).unwrap();
        let encoded = encode_response(response, PayloadSize::Empty);
        assert_eq!(encoded, "HTTP/1.1 101 Switching Protocols\r\nupgrade: echo\r\n\r\n");
    }

    #[test]
    fn until_close_response() {
        let encoded = encode_response(Response::new(()), PayloadSize::UntilClose);
        assert_eq!(encoded, "HTTP/1.1 200 OK\r\n\r\n");
    }

    #[test]
    fn request_line_and_host() {
        let request = Request::builder().method(Method::POST).uri("http://example.com:8080/submit?a=1").body(()).unwrap();
        let encoded = encode_request(request, PayloadSize::Length(3));
        assert!(encoded.starts_with("POST /submit?a=1 HTTP/1.1\r\n"));
        assert!(encoded.contains("host: example.com:8080\r\n"));
        assert!(encoded.contains("content-length: 3\r\n"));
    }

    #[test]
    fn bodyless_request() {
        let request = Request::builder().method(Method::GET).uri("/").body(()).unwrap();
        assert_eq!(encode_request(request, PayloadSize::Empty), "GET / HTTP/1.1\r\n\r\n");
    }

    #[test]
    fn request_cannot_be_close_delimited() {
        let request = Request::builder().method(Method::POST).uri("/").body(()).unwrap();
        let mut dst = BytesMut::new();
        assert!(RequestHeadEncoder.encode((request.into(), PayloadSize::UntilClose), &mut dst).is_err());
    }
}
