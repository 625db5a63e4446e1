//! HTTP response head handling.
//!
//! [`ResponseHeader`] wraps `http::Response<()>`; it is read by the client role and written by
//! the server role.

use http::response::Parts;
use http::{HeaderMap, Response, StatusCode, Version};
use http_body::SizeHint;

use crate::protocol::{MessageHead, PayloadSize, SendError};

#[derive(Debug)]
pub struct ResponseHeader {
    inner: Response<()>,
}

impl AsRef<Response<()>> for ResponseHeader {
    fn as_ref(&self) -> &Response<()> {
        &self.inner
    }
}

impl AsMut<Response<()>> for ResponseHeader {
    fn as_mut(&mut self) -> &mut Response<()> {
        &mut self.inner
    }
}

impl ResponseHeader {
    pub fn into_inner(self) -> Response<()> {
        self.inner
    }

    /// Attaches a body to this header, converting it into a full `Response<T>`.
    pub fn body<T>(self, body: T) -> Response<T> {
        self.inner.map(|()| body)
    }

    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Informational, `204 No Content` and `304 Not Modified` responses never carry a body.
    pub fn need_body(&self) -> bool {
        let status = self.status();
        !(status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED)
    }
}

impl MessageHead for ResponseHeader {
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn version(&self) -> Version {
        self.inner.version()
    }

    /// Without a declared length or chunked encoding the body can only be bounded by closing
    /// the connection, the size hint is deliberately ignored.
    fn outbound_payload_size(&self, _size_hint: &SizeHint) -> Result<PayloadSize, SendError> {
        if !self.need_body() {
            return Ok(PayloadSize::Empty);
        }

        match PayloadSize::from_headers(self.headers()).map_err(SendError::invalid_head)? {
            Some(payload_size) => Ok(payload_size),
            None => Ok(PayloadSize::UntilClose),
        }
    }
}

impl From<Parts> for ResponseHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Response::from_parts(parts, ()) }
    }
}

impl From<Response<()>> for ResponseHeader {
    #[inline]
    fn from(inner: Response<()>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: StatusCode) -> ResponseHeader {
        Response::builder().status(status).body(()).unwrap().into()
    }

    #[test]
    fn bodyless_statuses() {
        assert!(!response(StatusCode::SWITCHING_PROTOCOLS).need_body());
        assert!(!response(StatusCode::NO_CONTENT).need_body());
        assert!(!response(StatusCode::NOT_MODIFIED).need_body());
        assert!(response(StatusCode::OK).need_body());
    }

    #[test]
    fn undeclared_length_is_delimited_by_close() {
        let header = response(StatusCode::OK);
        assert_eq!(header.outbound_payload_size(&SizeHint::with_exact(3)).unwrap(), PayloadSize::UntilClose);

        let header: ResponseHeader =
            Response::builder().header(http::header::CONTENT_LENGTH, 3).body(()).unwrap().into();
        assert_eq!(header.outbound_payload_size(&SizeHint::new()).unwrap(), PayloadSize::Length(3));

        let header: ResponseHeader =
            Response::builder().header(http::header::TRANSFER_ENCODING, "chunked").body(()).unwrap().into();
        assert_eq!(header.outbound_payload_size(&SizeHint::new()).unwrap(), PayloadSize::Chunked);

        assert_eq!(response(StatusCode::NO_CONTENT).outbound_payload_size(&SizeHint::new()).unwrap(), PayloadSize::Empty);
    }
}
