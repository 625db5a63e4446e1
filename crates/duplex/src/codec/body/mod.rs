//! Payload framing for message bodies.
//!
//! ## Decoders
//! - [`PayloadDecoder`] dispatches to the length, chunked or until-close strategy
//!
//! ## Encoders
//! - [`PayloadEncoder`] dispatches to the length, chunked or passthrough strategy

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
