//! Process-global hook facade.
//!
//! Some hosts register plain callbacks and cannot thread a [`TraceContext`]
//! or a [`Dispatcher`] through them. This module keeps one process-wide
//! configuration and dispatcher, and one previous-location register per OS
//! thread:
//!
//! ```text
//!   harness:  install_buffer(..) / set_map_start(..) + set_map_size_bits(..)
//!   host:     global_trace_hook(unit)  -> None | Some(LineHook)
//!             line_hook.call(position) -> LineHook   (once per step)
//! ```

use std::cell::Cell;
use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use slog::{Discard, Logger, info, o};

use crate::dispatcher::{Dispatcher, TraceDecision};
use crate::edge::TraceContext;
use crate::error::Result;
use crate::map::{MapConfig, MapSettings};
use crate::position::{StepPosition, UnitDescriptor};
use crate::util::CoverageBuffer;

static CONFIG: Lazy<Arc<MapConfig>> = Lazy::new(|| Arc::new(MapConfig::new()));

static LOGGER: OnceCell<Logger> = OnceCell::new();

static DISPATCHER: Lazy<Dispatcher> = Lazy::new(|| Dispatcher::new(Arc::clone(&CONFIG), logger()));

thread_local!(static CONTEXT: Cell<TraceContext> = const { Cell::new(TraceContext::new()) });

fn logger() -> Logger {
    LOGGER
        .get()
        .cloned()
        .unwrap_or_else(|| Logger::root(Discard, o!()))
}

/// Installs the logger used by the facade. Returns whether this call's
/// logger was taken: only the first call counts, and none once a hook has
/// run, because the global dispatcher captures its logger on first use.
pub fn set_logger(logger: Logger) -> bool {
    if Lazy::get(&DISPATCHER).is_some() {
        return false;
    }
    LOGGER.set(logger).is_ok()
}

/// Records the base address of the shared map.
///
/// # Safety
///
/// See [`MapConfig::set_map_start`].
pub unsafe fn set_map_start(address: u64) -> Result<()> {
    unsafe { CONFIG.set_map_start(address) }?;
    info!(logger(), "map start set"; "start" => format!("{address:#x}"));
    Ok(())
}

/// Records log2 of the map size.
///
/// # Safety
///
/// See [`MapConfig::set_map_size_bits`].
pub unsafe fn set_map_size_bits(bits: u8) -> Result<()> {
    unsafe { CONFIG.set_map_size_bits(bits) }?;
    info!(logger(), "map size set"; "size_bits" => bits);
    Ok(())
}

/// Installs a leaked buffer as the process map.
pub fn install_buffer(buffer: &CoverageBuffer) -> Result<()> {
    buffer.install(&CONFIG)?;
    info!(logger(), "map buffer installed";
        "start" => format!("{:#x}", buffer.start_address()),
        "size_bits" => buffer.size_bits());
    Ok(())
}

pub fn map_settings() -> MapSettings {
    CONFIG.settings()
}

/// Unit-entry hook. `None` means the unit is not traced line by line.
pub fn global_trace_hook(unit: &UnitDescriptor) -> Result<Option<LineHook>> {
    match DISPATCHER.on_unit_enter(unit)? {
        TraceDecision::Decline => Ok(None),
        TraceDecision::Arm(_) => Ok(Some(LineHook { _private: () })),
    }
}

/// Step hook handed out by [`global_trace_hook`]. Edges are folded per OS
/// thread.
#[derive(Debug, Clone, Copy)]
pub struct LineHook {
    _private: (),
}

impl LineHook {
    /// Records one step on the calling thread and returns the hook again.
    #[inline]
    pub fn call<P>(self, position: &P) -> Result<LineHook>
    where
        P: StepPosition + ?Sized,
    {
        CONTEXT.with(|cell| {
            let mut ctx = cell.take();
            let result = DISPATCHER.record_step(&mut ctx, position);
            cell.set(ctx);
            result
        })?;
        Ok(self)
    }
}

/// Zeroes the calling thread's previous location.
pub fn reset_thread_context() {
    CONTEXT.with(|cell| cell.set(TraceContext::new()));
}

/// The calling thread's previous location, unmasked.
pub fn thread_prev_location() -> u32 {
    CONTEXT.with(|cell| {
        let ctx = cell.take();
        let prev = ctx.prev_location();
        cell.set(ctx);
        prev
    })
}
