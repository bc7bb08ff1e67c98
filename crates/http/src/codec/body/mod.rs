//! Body framing: content-length, chunked transfer coding and, for responses,
//! close-delimited bodies.

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
