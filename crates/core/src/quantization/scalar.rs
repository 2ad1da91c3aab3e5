//! Scalar quantization of posting impacts into packed low-width codes.
//!
//! Each postings list is compressed independently: its min and max impact are
//! recorded and every value is mapped linearly onto `2^bits` levels. Codes are
//! packed little-end-first into bytes, so a 2-bit list stores four impacts per
//! byte. `min` and `scale` are kept for dequantization.

use serde::{Deserialize, Serialize};

/// Code widths that pack evenly into a byte.
pub const SUPPORTED_BITS: [u8; 4] = [1, 2, 4, 8];

/// Returns `true` if `bits` is a supported code width.
pub fn is_supported(bits: u8) -> bool {
    SUPPORTED_BITS.contains(&bits)
}

/// A list of f32 values stored as packed `bits`-wide codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizedImpacts {
    pub bits: u8,
    pub len: u32,
    pub packed: Vec<u8>,
    pub min: f32,
    /// (max - min) / (2^bits - 1); 0.0 when all values are equal.
    pub scale: f32,
}

impl QuantizedImpacts {
    /// Quantize `values` to `bits`-wide codes using min-max scaling.
    ///
    /// `bits` must be one of [`SUPPORTED_BITS`].
    pub fn quantize(values: &[f32], bits: u8) -> Self {
        debug_assert!(is_supported(bits), "unsupported code width {bits}");
        let levels = max_code(bits) as f32;
        let per_byte = 8 / bits as usize;
        let mut packed = vec![0u8; values.len().div_ceil(per_byte)];

        let (min, max) = values
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if values.is_empty() {
            return Self {
                bits,
                len: 0,
                packed,
                min: 0.0,
                scale: 0.0,
            };
        }

        let range = max - min;
        let scale = if range < f32::EPSILON {
            0.0
        } else {
            let inv = levels / range;
            for (i, &v) in values.iter().enumerate() {
                let code = ((v - min) * inv).round().clamp(0.0, levels) as u8;
                packed[i / per_byte] |= code << ((i % per_byte) * bits as usize);
            }
            range / levels
        };

        Self {
            bits,
            len: values.len() as u32,
            packed,
            min,
            scale,
        }
    }

    /// Returns the raw code at position `i`.
    pub fn code(&self, i: usize) -> u8 {
        let bits = self.bits as usize;
        let per_byte = 8 / bits;
        (self.packed[i / per_byte] >> ((i % per_byte) * bits)) & max_code(self.bits)
    }

    /// Dequantized value at position `i`. Lossy.
    pub fn value(&self, i: usize) -> f32 {
        self.min + self.code(i) as f32 * self.scale
    }

    /// Dequantize every value. Lossy.
    pub fn dequantize(&self) -> Vec<f32> {
        (0..self.len()).map(|i| self.value(i)).collect()
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Checks width and packed length after deserialization.
    pub fn validate(&self) -> Result<(), String> {
        if !is_supported(self.bits) {
            return Err(format!("unsupported code width {}", self.bits));
        }
        let expected = self.len().div_ceil(8 / self.bits as usize);
        if self.packed.len() != expected {
            return Err(format!(
                "packed length {} != expected {} for {} codes of {} bits",
                self.packed.len(),
                expected,
                self.len,
                self.bits
            ));
        }
        Ok(())
    }
}

fn max_code(bits: u8) -> u8 {
    if bits >= 8 {
        u8::MAX
    } else {
        (1u8 << bits) - 1
    }
}
