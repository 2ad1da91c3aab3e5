//! Scalar quantization of postings impacts: f32 → packed 1/2/4/8-bit codes.

/// Packed min-max scalar quantization.
pub mod scalar;

pub use scalar::{is_supported, QuantizedImpacts, SUPPORTED_BITS};
