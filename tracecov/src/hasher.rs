//! Location hashing.
//!
//! A step position is two `u32`s: a coarse one (line or block number) and a
//! fine one (instruction offset inside the unit). Both are folded into one map
//! location with a multiplicative hash that keeps the top `size_bits` bits of
//! the 32-bit product:
//!
//! ```text
//!   coarse = coarse == 0 ? 0xFFFFFFFF : coarse
//!   fine   = fine   == 0 ? 0xFFFFFFFF : fine
//!   loc    = (HASH_PRIME * coarse * fine mod 2^32) >> (32 - size_bits)
//! ```
//!
//! A genuine zero is therefore indistinguishable from a missing value of
//! `0xFFFFFFFF`. Collisions are expected; the map is an approximate signal.

use crate::constants::{HASH_PRIME, ZERO_POSITION_SUBSTITUTE};

#[inline]
fn nonzero(value: u32) -> u32 {
    if value == 0 {
        ZERO_POSITION_SUBSTITUTE
    } else {
        value
    }
}

/// Maps a position pair to a location index in `0 .. 2^size_bits`.
///
/// `size_bits` is expected to be within `1..=31`. A width of zero maps
/// everything to location 0; widths of 32 and above keep the whole product.
#[inline]
pub fn hash_location(coarse: u32, fine: u32, size_bits: u8) -> u32 {
    let state = HASH_PRIME
        .wrapping_mul(nonzero(coarse))
        .wrapping_mul(nonzero(fine));
    state.checked_shr(drop_bits(size_bits)).unwrap_or(0)
}

/// Mask selecting the low `size_bits` bits of a location.
#[inline]
pub fn index_mask(size_bits: u8) -> u32 {
    u32::MAX.checked_shr(drop_bits(size_bits)).unwrap_or(0)
}

#[inline]
fn drop_bits(size_bits: u8) -> u32 {
    32u32.saturating_sub(u32::from(size_bits))
}
