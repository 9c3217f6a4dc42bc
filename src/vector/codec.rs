//! Precision-reduction codecs for persisted vectors.
//!
//! Two reduced representations are supported:
//! - IEEE-754 binary16 (half precision), 2 bytes per component
//! - symmetric int8 with one f32 scale per vector, 1 byte per component
//!
//! All functions are pure; the persistence layer decides when to call them.
//!
//! # Error bounds
//! - binary16: relative error <= 2^-11 for values in the normal half range
//!   (round-to-nearest-even on the 13 dropped mantissa bits)
//! - int8: absolute error per component <= `scale / 2`

/// Sign bit of a binary16 value.
const F16_SIGN: u16 = 0x8000;

/// All-ones exponent with a zero mantissa: infinity.
const F16_INFINITY: u16 = 0x7C00;

/// Canonical quiet NaN.
const F16_NAN: u16 = 0x7E00;

/// Largest quantized magnitude.
const I8_LEVELS: f32 = 127.0;

/// Converts an f32 to IEEE-754 binary16 bits.
///
/// Values too small for a half subnormal (unbiased exponent below -24)
/// flush to a signed zero, values above the half range become a signed
/// infinity, and NaN stays NaN with its sign preserved.
#[must_use]
pub fn f32_to_f16(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) as u16) & F16_SIGN;
    let exponent = ((bits >> 23) & 0xFF) as i32 - 127;
    let mantissa = bits & 0x007F_FFFF;

    if exponent == 128 {
        return if mantissa == 0 {
            sign | F16_INFINITY
        } else {
            sign | F16_NAN
        };
    }

    if exponent < -24 {
        return sign;
    }

    if exponent < -14 {
        // Subnormal half: restore the implicit bit and shift into place.
        let full = mantissa | 0x0080_0000;
        let shift = (-1 - exponent) as u32;
        let half = round_shifted(full, shift);
        return sign | half as u16;
    }

    if exponent > 15 {
        return sign | F16_INFINITY;
    }

    let packed = (((exponent + 15) as u32) << 10) | (mantissa >> 13);
    let remainder = mantissa & 0x1FFF;
    let round_up = remainder > 0x1000 || (remainder == 0x1000 && packed & 1 == 1);
    // A carry out of the mantissa bumps the exponent, and out of the
    // largest exponent lands exactly on infinity.
    sign | (packed + u32::from(round_up)) as u16
}

/// Shifts `value` right by `shift` bits, rounding to nearest even.
fn round_shifted(value: u32, shift: u32) -> u32 {
    let truncated = value >> shift;
    let remainder = value & ((1 << shift) - 1);
    let halfway = 1 << (shift - 1);
    if remainder > halfway || (remainder == halfway && truncated & 1 == 1) {
        truncated + 1
    } else {
        truncated
    }
}

/// Converts IEEE-754 binary16 bits to an f32. Exact for every input.
#[must_use]
pub fn f16_to_f32(half: u16) -> f32 {
    let sign = u32::from(half & F16_SIGN) << 16;
    let exponent = u32::from((half >> 10) & 0x1F);
    let mantissa = u32::from(half & 0x03FF);

    let bits = match (exponent, mantissa) {
        (0, 0) => sign,
        (0, _) => {
            // Subnormal: shift until the implicit bit appears.
            let mut exponent: i32 = 1;
            let mut mantissa = mantissa;
            while mantissa & 0x0400 == 0 {
                mantissa <<= 1;
                exponent -= 1;
            }
            let mantissa = mantissa & 0x03FF;
            sign | (((exponent + 127 - 15) as u32) << 23) | (mantissa << 13)
        }
        (0x1F, _) => sign | 0x7F80_0000 | (mantissa << 13),
        _ => sign | ((exponent + 127 - 15) << 23) | (mantissa << 13),
    };

    f32::from_bits(bits)
}

/// Encodes a full-precision vector as binary16 components.
#[must_use]
pub fn encode_f16(vector: &[f32]) -> Vec<u16> {
    vector.iter().copied().map(f32_to_f16).collect()
}

/// Decodes binary16 components back into a full-precision vector.
#[must_use]
pub fn decode_f16(halves: &[u16]) -> Vec<f32> {
    halves.iter().copied().map(f16_to_f32).collect()
}

/// Symmetric per-vector int8 quantization.
///
/// Maps the largest magnitude to +/-127. Returns the quantized components
/// and the scale that reverses the mapping. An all-zero vector gets a scale
/// of 1.0 and quantizes to all zeros.
#[must_use]
pub fn quantize_i8(vector: &[f32]) -> (Vec<i8>, f32) {
    let max_abs = vector.iter().fold(0.0f32, |acc, v| acc.max(v.abs()));

    let (scale, inv_scale) = if max_abs > 0.0 {
        (max_abs / I8_LEVELS, I8_LEVELS / max_abs)
    } else {
        (1.0, 0.0)
    };

    let quantized = vector
        .iter()
        .map(|v| (v * inv_scale).clamp(-I8_LEVELS, I8_LEVELS).round() as i8)
        .collect();

    (quantized, scale)
}

/// Reverses [`quantize_i8`]: `out[i] = q[i] * scale`.
#[must_use]
pub fn dequantize_i8(quantized: &[i8], scale: f32) -> Vec<f32> {
    quantized.iter().map(|&q| f32::from(q) * scale).collect()
}
