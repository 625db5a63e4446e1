//! Protocol types shared by the codecs, the transport and the connection.
//!
//! - [`Message`], [`PayloadItem`] and [`PayloadSize`]: framed units crossing the codec boundary
//! - [`RequestHeader`] and [`ResponseHeader`]: message heads for both directions
//! - [`body`]: the one-shot body lease handed out by `Connection::read`
//! - [`error`](ParseError): decode, send, connection and protocol-violation errors

use http::{HeaderMap, Version};
use http_body::SizeHint;

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;
pub(crate) use message::is_chunked;

mod request;
pub use request::RequestHeader;

mod response;
pub use response::ResponseHeader;

mod error;
pub use error::ConnectionError;
pub use error::ParseError;
pub use error::ProtocolViolation;
pub use error::SendError;

pub mod body;

/// Common view over request and response heads.
pub trait MessageHead: Send + 'static {
    fn headers(&self) -> &HeaderMap;

    fn headers_mut(&mut self) -> &mut HeaderMap;

    fn version(&self) -> Version;

    /// Decides how a body written after this head is delimited on the wire.
    fn outbound_payload_size(&self, size_hint: &SizeHint) -> Result<PayloadSize, SendError>;
}
