//! HTTP request head handling.
//!
//! [`RequestHeader`] wraps `http::Request<()>` and is read by the server role and written by
//! the client role.

use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};
use http_body::SizeHint;

use crate::protocol::{MessageHead, PayloadSize, SendError};

/// Represents an HTTP request head.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl AsMut<Request<()>> for RequestHeader {
    fn as_mut(&mut self) -> &mut Request<()> {
        &mut self.inner
    }
}

impl RequestHeader {
    /// Consumes the header and returns the inner `Request<()>`.
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Attaches a body to this header, converting it into a full `Request<T>`.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|()| body)
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Determines if this request may carry a body based on its HTTP method.
    ///
    /// Returns false for methods that don't have bodies:
    /// - GET
    /// - HEAD
    /// - DELETE
    /// - OPTIONS
    /// - CONNECT
    pub fn need_body(&self) -> bool {
        !matches!(self.method(), &Method::GET | &Method::HEAD | &Method::DELETE | &Method::OPTIONS | &Method::CONNECT)
    }
}

impl MessageHead for RequestHeader {
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn version(&self) -> Version {
        self.inner.version()
    }

    /// A declared framing wins; otherwise the body's size hint decides, a request is never
    /// delimited by closing the connection.
    fn outbound_payload_size(&self, size_hint: &SizeHint) -> Result<PayloadSize, SendError> {
        match PayloadSize::from_headers(self.headers()).map_err(SendError::invalid_head)? {
            Some(payload_size) => Ok(payload_size),
            None => Ok(size_hint.clone().into()),
        }
    }
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: Method) -> RequestHeader {
        Request::builder().method(method).uri("/").body(()).unwrap().into()
    }

    #[test]
    fn need_body_by_method() {
        assert!(!request(Method::GET).need_body());
        assert!(!request(Method::HEAD).need_body());
        assert!(!request(Method::OPTIONS).need_body());
        assert!(request(Method::POST).need_body());
        assert!(request(Method::PUT).need_body());
    }

    #[test]
    fn outbound_size_prefers_declared_length() {
        let header: RequestHeader =
            Request::builder().method(Method::POST).uri("/").header(http::header::CONTENT_LENGTH, 5).body(()).unwrap().into();
        assert_eq!(header.outbound_payload_size(&SizeHint::new()).unwrap(), PayloadSize::Length(5));
    }

    #[test]
    fn outbound_size_falls_back_to_size_hint() {
        let header = request(Method::POST);
        assert_eq!(header.outbound_payload_size(&SizeHint::with_exact(3)).unwrap(), PayloadSize::Length(3));
        assert_eq!(header.outbound_payload_size(&SizeHint::with_exact(0)).unwrap(), PayloadSize::Empty);
        assert_eq!(header.outbound_payload_size(&SizeHint::new()).unwrap(), PayloadSize::Chunked);
    }
}
