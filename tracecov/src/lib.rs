//! Edge-coverage core for tracing hooks in coverage-guided fuzzing.
//!
//! A host runtime (an interpreter with a tracing facility, an emulator, ...)
//! reports two kinds of events: a unit (function, code object) is entered,
//! and a step (line, basic block) is taken inside it. This crate turns that
//! event stream into AFL-style edge hit counts in a shared byte map that an
//! external fuzzer reads after each run:
//!
//! ```text
//!   loc          = hash(line, offset) >> (32 - size_bits)
//!   map[loc ^ (prev_loc >> 1)] += 1
//!   prev_loc     = loc
//! ```
//!
//! The map is owned by the harness; this crate only writes into it.
//!
//! ## Getting Started
//!
//! ```
//! use tracecov::dispatcher::{Dispatcher, TraceDecision};
//! use tracecov::edge::TraceContext;
//! use tracecov::position::{PositionInfo, UnitDescriptor};
//! use tracecov::util::CoverageBuffer;
//!
//! // 1. The harness provides the map. Here it is a leaked heap buffer.
//! let buffer = CoverageBuffer::new(16)?;
//! let dispatcher = Dispatcher::builder().with_buffer(&buffer).build()?;
//!
//! // 2. One context per thread of the traced program.
//! let mut ctx = TraceContext::new();
//!
//! // 3. Unit entry decides whether the body is traced.
//! if let TraceDecision::Arm(handler) =
//!     dispatcher.on_unit_enter(&UnitDescriptor::from_line_table_len(4))?
//! {
//!     let handler = handler.step(&mut ctx, &PositionInfo::new(10, 0))?;
//!     handler.step(&mut ctx, &PositionInfo::new(11, 6))?;
//! }
//!
//! assert_eq!(buffer.hit_indices().len(), 2);
//! # Ok::<(), tracecov::TraceError>(())
//! ```
//!
//! Hosts that cannot carry a context through their callbacks use the
//! process-global [`hook`] module instead.
pub mod dispatcher;
pub mod edge;
pub mod error;
pub mod hasher;
pub mod hook;
pub mod map;
pub mod position;
pub mod state;
pub mod util;

mod constants;

#[cfg(feature = "libafl")]
pub mod observer;

pub use constants::{DEFAULT_MAP_SIZE_BITS, HASH_PRIME, MAX_MAP_SIZE_BITS};
pub use error::{Result, TraceError};

// re-export libAFL and libAFL_bolts
#[cfg(feature = "libafl")]
pub use libafl;
#[cfg(feature = "libafl")]
pub use libafl_bolts;
