//! Message head parsing and serialization.
//!
//! - [`RequestHeadDecoder`] / [`ResponseHeadDecoder`]: parse heads with `httparse`, limited to
//!   64 header fields and 8 KiB in total
//! - [`RequestHeadEncoder`] / [`ResponseHeadEncoder`]: write the start line and header fields,
//!   setting `Content-Length` or `Transfer-Encoding` to match the [`PayloadSize`](crate::protocol::PayloadSize)

mod header_decoder;
mod header_encoder;

pub use header_decoder::RequestHeadDecoder;
pub use header_decoder::ResponseHeadDecoder;
pub use header_encoder::RequestHeadEncoder;
pub use header_encoder::ResponseHeadEncoder;
pub(crate) use header_encoder::FastWrite;
