//! Compact difficulty bits and the proof-of-work check.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::hash::Hash256;

/// Expand compact bits into the 256-bit target.
///
/// Returns `None` for negative or overflowing encodings. A zero target is
/// returned as-is and rejected by [`check_proof_of_work`].
pub fn compact_to_target(bits: u32) -> Option<BigUint> {
    let exponent = bits >> 24;
    let negative = bits & 0x0080_0000 != 0;
    let mantissa = bits & 0x007f_ffff;

    if negative && mantissa != 0 {
        return None;
    }
    // Overflow: the expanded value would not fit in 256 bits.
    if mantissa != 0
        && (exponent > 34
            || (mantissa > 0xff && exponent > 33)
            || (mantissa > 0xffff && exponent > 32))
    {
        return None;
    }

    let target = if exponent <= 3 {
        BigUint::from(mantissa >> (8 * (3 - exponent)))
    } else {
        BigUint::from(mantissa) << (8 * (exponent - 3))
    };
    Some(target)
}

/// Encode a target back into compact bits.
pub fn target_to_compact(target: &BigUint) -> u32 {
    if target.is_zero() {
        return 0;
    }
    let bytes = target.to_bytes_be();
    let mut size = bytes.len() as u32;
    let mut compact: u32 = if size <= 3 {
        let mut value = 0u32;
        for b in &bytes {
            value = (value << 8) | *b as u32;
        }
        value << (8 * (3 - size))
    } else {
        let shifted = target >> (8 * (size - 3));
        shifted.iter_u32_digits().next().unwrap_or(0)
    };
    // Keep the sign bit clear by shifting the mantissa down a byte.
    if compact & 0x0080_0000 != 0 {
        compact >>= 8;
        size += 1;
    }
    compact | (size << 24)
}

/// Does `hash` satisfy the target encoded in `bits`?
pub fn check_proof_of_work(hash: &Hash256, bits: u32) -> bool {
    let target = match compact_to_target(bits) {
        Some(t) if !t.is_zero() => t,
        _ => return false,
    };
    BigUint::from_bytes_be(hash.as_bytes()) <= target
}
