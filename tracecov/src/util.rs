use std::sync::atomic::{AtomicU8, Ordering};

use crate::constants::MAX_MAP_SIZE_BITS;
use crate::error::{Result, TraceError};
use crate::map::MapConfig;

/// A heap-allocated coverage map for in-process harnesses and tests.
///
/// The allocation is leaked so a map installed into a [`MapConfig`] can
/// never dangle. Counters are `AtomicU8` cells so the harness can read them
/// while traced threads write.
#[derive(Debug, Clone, Copy)]
pub struct CoverageBuffer {
    cells: &'static [AtomicU8],
    size_bits: u8,
}

impl CoverageBuffer {
    /// Allocates a zeroed map of `2^size_bits` counters.
    pub fn new(size_bits: u8) -> Result<Self> {
        if size_bits == 0 || size_bits > MAX_MAP_SIZE_BITS {
            return Err(TraceError::InvalidMapSizeBits(size_bits));
        }
        let cells: Box<[AtomicU8]> = (0..1usize << size_bits).map(|_| AtomicU8::new(0)).collect();
        Ok(Self {
            cells: Box::leak(cells),
            size_bits,
        })
    }

    pub fn start_address(&self) -> u64 {
        self.cells.as_ptr() as usize as u64
    }

    pub fn size_bits(&self) -> u8 {
        self.size_bits
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        self.cells.get(index).map(|cell| cell.load(Ordering::Relaxed))
    }

    /// Copies the current counters out.
    pub fn snapshot(&self) -> Vec<u8> {
        self.cells
            .iter()
            .map(|cell| cell.load(Ordering::Relaxed))
            .collect()
    }

    /// Indices of all non-zero counters, in ascending order.
    pub fn hit_indices(&self) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.load(Ordering::Relaxed) != 0)
            .map(|(index, _)| index)
            .collect()
    }

    pub fn clear(&self) {
        for cell in self.cells {
            cell.store(0, Ordering::Relaxed);
        }
    }

    /// Points `config` at this buffer.
    pub fn install(&self, config: &MapConfig) -> Result<()> {
        // SAFETY: the region is leaked and exactly `2^size_bits` bytes long.
        unsafe {
            config.set_map_size_bits(self.size_bits)?;
            config.set_map_start(self.start_address())
        }
    }

    #[cfg(feature = "libafl")]
    pub(crate) fn as_ptr(&self) -> *const AtomicU8 {
        self.cells.as_ptr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn allocates_zeroed_power_of_two() {
        let buffer = CoverageBuffer::new(10).unwrap();
        assert_eq!(buffer.len(), 1024);
        assert!(buffer.snapshot().iter().all(|&b| b == 0));
        assert_eq!(buffer.get(1024), None);
    }

    #[test]
    fn rejects_invalid_width() {
        assert_matches!(CoverageBuffer::new(0), Err(TraceError::InvalidMapSizeBits(0)));
        assert_matches!(CoverageBuffer::new(40), Err(TraceError::InvalidMapSizeBits(40)));
    }

    #[test]
    fn install_points_config_at_buffer() {
        let buffer = CoverageBuffer::new(12).unwrap();
        let config = MapConfig::new();
        buffer.install(&config).unwrap();
        let settings = config.settings();
        assert_eq!(settings.start() as u64, buffer.start_address());
        assert_eq!(settings.size_bits(), 12);
        assert_eq!(settings.map_len(), buffer.len());
    }

    #[test]
    fn clear_resets_hits() {
        let buffer = CoverageBuffer::new(4).unwrap();
        let config = MapConfig::new();
        buffer.install(&config).unwrap();
        unsafe { config.settings().bump(5) };
        assert_eq!(buffer.hit_indices(), vec![5]);
        buffer.clear();
        assert!(buffer.hit_indices().is_empty());
    }
}
