//! Edge tracking.
//!
//! Each execution context (thread, fiber, coroutine) keeps the location of its
//! previous step. The edge written to the map is
//!
//! ```text
//!   edge     = loc ^ (prev_loc >> 1)
//!   prev_loc = loc
//! ```
//!
//! The shift makes `A -> B` and `B -> A` land on different indices.

use crate::hasher::index_mask;

/// Per-context previous-location register.
///
/// A fresh context starts at location 0. Contexts are never shared: two
/// threads tracing the same code each hold their own `TraceContext`, so one
/// thread's steps never turn into edges of another thread's path.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TraceContext {
    prev_loc: u32,
}

impl TraceContext {
    pub const fn new() -> Self {
        Self { prev_loc: 0 }
    }

    /// Folds `loc` into an edge index and remembers it as the previous
    /// location.
    ///
    /// The stored location is masked to `size_bits` on read, so a context
    /// that outlived a map resize still yields an in-range edge.
    #[inline]
    pub fn record_edge(&mut self, loc: u32, size_bits: u8) -> u32 {
        let prev = self.prev_loc & index_mask(size_bits);
        self.prev_loc = loc;
        loc ^ (prev >> 1)
    }

    /// The raw, unmasked location of the last recorded step.
    pub fn prev_location(&self) -> u32 {
        self.prev_loc
    }

    pub fn reset(&mut self) {
        self.prev_loc = 0;
    }
}
