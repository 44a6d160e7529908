//! `libafl` view of a [`CoverageBuffer`].

use libafl::observers::map::{StdMapObserver, hitcount_map::HitcountsMapObserver};

use crate::util::CoverageBuffer;

/// The observer type an in-process `libafl` harness feeds to its map
/// feedback.
pub type CoverageObserver = HitcountsMapObserver<StdMapObserver<'static, u8, false>>;

impl CoverageBuffer {
    /// Wraps the buffer in a hitcount map observer named `name`.
    pub fn hitcounts_observer(&self, name: &'static str) -> CoverageObserver {
        // SAFETY: the buffer is leaked and `len()` bytes long; `AtomicU8` and
        // `u8` share a layout. The observer only touches the map between
        // executions, never concurrently with a traced step.
        let observer =
            unsafe { StdMapObserver::from_mut_ptr(name, self.as_ptr() as *mut u8, self.len()) };
        HitcountsMapObserver::new(observer)
    }
}
