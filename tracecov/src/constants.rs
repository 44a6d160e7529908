//! This module defines constants shared by the hasher, the map configuration
//! and the process-global hook facade.

/// Odd multiplier for the location hash. Only the most significant bits of
/// the 32-bit modular product are kept, so the constant mostly serves to
/// spread low-entropy line numbers into the top of the word.
pub const HASH_PRIME: u32 = 0xEDB6_417B;

/// log2 of the coverage map size used until the harness says otherwise.
/// `1 << 16` bytes is the classic AFL map size.
pub const DEFAULT_MAP_SIZE_BITS: u8 = 16;

/// Largest accepted `size_bits`. The hasher shifts by `32 - size_bits`, so
/// the width must stay strictly inside a `u32`.
pub const MAX_MAP_SIZE_BITS: u8 = 31;

/// Substitute for a zero position component. Multiplying by zero would
/// collapse every such step onto location 0.
pub const ZERO_POSITION_SUBSTITUTE: u32 = u32::MAX;
