//! Configuration of the shared coverage map.
//!
//! The map itself is owned by the fuzzing harness. This module only records
//! where it lives and how large it is, in a form that can be shared by every
//! thread executing traced code and read on each step at the cost of two
//! relaxed loads.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use crate::constants::{DEFAULT_MAP_SIZE_BITS, MAX_MAP_SIZE_BITS};
use crate::error::{Result, TraceError};
use crate::hasher;

/// Base address and log2 size of the shared counter array.
///
/// A `MapConfig` is normally created once per process (or once per test) and
/// handed to a [`crate::dispatcher::Dispatcher`] behind an `Arc`. It must be
/// fully configured before tracing starts; reconfiguring it while a step is in
/// flight is not supported.
#[derive(Debug)]
pub struct MapConfig {
    start: AtomicUsize,
    size_bits: AtomicU8,
}

impl MapConfig {
    /// Creates a configuration with no map installed and the default size.
    pub const fn new() -> Self {
        Self {
            start: AtomicUsize::new(0),
            size_bits: AtomicU8::new(DEFAULT_MAP_SIZE_BITS),
        }
    }

    /// Records the base address of the shared counter array. Last call wins.
    ///
    /// # Safety
    ///
    /// Every later step writes one byte somewhere in
    /// `address .. address + 2^size_bits` without any bounds check. The caller
    /// guarantees that this whole range is writable for as long as tracing
    /// may run against this configuration.
    pub unsafe fn set_map_start(&self, address: u64) -> Result<()> {
        let start = usize::try_from(address).map_err(|_| TraceError::InvalidMapStart(address))?;
        self.start.store(start, Ordering::Relaxed);
        Ok(())
    }

    /// Records log2 of the map size. Last call wins.
    ///
    /// # Safety
    ///
    /// Same contract as [`MapConfig::set_map_start`]: growing the size past
    /// the real allocation makes later steps write out of bounds.
    pub unsafe fn set_map_size_bits(&self, bits: u8) -> Result<()> {
        if bits == 0 || bits > MAX_MAP_SIZE_BITS {
            return Err(TraceError::InvalidMapSizeBits(bits));
        }
        self.size_bits.store(bits, Ordering::Relaxed);
        Ok(())
    }

    /// Forgets the installed map. Later unit entries and steps fail with
    /// [`TraceError::MapNotInstalled`] until a new start is set.
    pub fn uninstall(&self) {
        self.start.store(0, Ordering::Relaxed);
    }

    /// Loads a consistent snapshot for one step.
    #[inline]
    pub fn settings(&self) -> MapSettings {
        MapSettings {
            start: self.start.load(Ordering::Relaxed),
            size_bits: self.size_bits.load(Ordering::Relaxed),
        }
    }

    /// Hashes a position pair against the currently configured map size.
    #[inline]
    pub fn hash_location(&self, coarse: u32, fine: u32) -> u32 {
        hasher::hash_location(coarse, fine, self.settings().size_bits)
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A copy of the map configuration as seen by a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapSettings {
    start: usize,
    size_bits: u8,
}

impl MapSettings {
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn size_bits(&self) -> u8 {
        self.size_bits
    }

    /// Number of counters in the map, `2^size_bits`.
    pub fn map_len(&self) -> usize {
        1usize << self.size_bits
    }

    pub fn is_installed(&self) -> bool {
        self.start != 0
    }

    /// Increments the counter at `index`, wrapping from 255 to 0.
    ///
    /// The load and the store are separate relaxed operations, so two
    /// contexts hitting the same byte at once may lose an increment.
    ///
    /// # Safety
    ///
    /// The map must be installed, `index` must be below [`Self::map_len`], and
    /// the installed region must satisfy the [`MapConfig::set_map_start`]
    /// contract.
    #[inline]
    pub(crate) unsafe fn bump(&self, index: u32) {
        debug_assert!(self.is_installed());
        debug_assert!((index as usize) < self.map_len());
        // `AtomicU8` has the same in-memory representation as `u8`.
        let cell = unsafe { &*(self.start as *const AtomicU8).add(index as usize) };
        cell.store(cell.load(Ordering::Relaxed).wrapping_add(1), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn defaults_to_uninstalled_sixteen_bit_map() {
        let settings = MapConfig::new().settings();
        assert!(!settings.is_installed());
        assert_eq!(settings.size_bits(), 16);
        assert_eq!(settings.map_len(), 65536);
    }

    #[test]
    fn last_configuration_call_wins() {
        let config = MapConfig::new();
        unsafe {
            config.set_map_size_bits(8).unwrap();
            config.set_map_size_bits(12).unwrap();
            config.set_map_start(0x1000).unwrap();
            config.set_map_start(0x2000).unwrap();
        }
        let settings = config.settings();
        assert_eq!(settings.size_bits(), 12);
        assert_eq!(settings.start(), 0x2000);
    }

    #[test]
    fn rejects_out_of_range_size_bits() {
        let config = MapConfig::new();
        assert_matches!(
            unsafe { config.set_map_size_bits(0) },
            Err(TraceError::InvalidMapSizeBits(0))
        );
        assert_matches!(
            unsafe { config.set_map_size_bits(32) },
            Err(TraceError::InvalidMapSizeBits(32))
        );
        // A rejected call leaves the previous value in place.
        assert_eq!(config.settings().size_bits(), 16);
    }

    #[test]
    fn uninstall_clears_start_only() {
        let config = MapConfig::new();
        unsafe {
            config.set_map_start(0x4000).unwrap();
            config.set_map_size_bits(10).unwrap();
        }
        config.uninstall();
        let settings = config.settings();
        assert!(!settings.is_installed());
        assert_eq!(settings.size_bits(), 10);
    }

    #[test]
    fn bump_wraps_at_256() {
        let mut bytes = [0u8; 4];
        bytes[2] = 255;
        let settings = MapSettings {
            start: bytes.as_mut_ptr() as usize,
            size_bits: 2,
        };
        unsafe {
            settings.bump(2);
            settings.bump(1);
        }
        assert_eq!(bytes, [0, 1, 0, 0]);
    }
}
