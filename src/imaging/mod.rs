//! Image payload handling - base64 transport, decoding and PNG encoding

pub mod base64;
pub mod decoder;
pub mod png;

pub use decoder::{DecodeError, ImageDecoder};
