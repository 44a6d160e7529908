//! The trace dispatcher.
//!
//! A host tracing facility delivers two kinds of events:
//!
//! 1. A unit is entered. [`Dispatcher::on_unit_enter`] decides whether the
//!    unit deserves line-level tracing and answers with a [`TraceDecision`].
//! 2. A step is taken inside an armed unit. [`StepHandler::step`] hashes the
//!    position, folds it into an edge with the context's previous location,
//!    bumps the map byte for that edge and hands itself back so the host keeps
//!    delivering steps.
//!
//! Declined units never reach the step path, however many steps they run.

use std::fmt;
use std::sync::Arc;

use slog::{Discard, Logger, info, o, trace, warn};

use crate::edge::TraceContext;
use crate::error::{Result, TraceError};
use crate::hasher::hash_location;
use crate::map::MapConfig;
use crate::position::{StepPosition, UnitDescriptor};
use crate::util::CoverageBuffer;

/// Outcome of a unit entry.
#[derive(Debug, Clone, Copy)]
pub enum TraceDecision<'d> {
    /// Do not trace this unit at line granularity.
    Decline,
    /// Deliver every step of this unit to the handler.
    Arm(StepHandler<'d>),
}

impl TraceDecision<'_> {
    pub fn is_armed(&self) -> bool {
        matches!(self, TraceDecision::Arm(_))
    }
}

/// Step entry point returned when a unit is armed.
#[derive(Debug, Clone, Copy)]
pub struct StepHandler<'d> {
    dispatcher: &'d Dispatcher,
}

impl<'d> StepHandler<'d> {
    /// Records one step and returns the handler to keep tracing the unit.
    ///
    /// On error nothing is written and the host should stop delivering steps
    /// for this context.
    #[inline]
    pub fn step<P>(self, ctx: &mut TraceContext, position: &P) -> Result<StepHandler<'d>>
    where
        P: StepPosition + ?Sized,
    {
        self.dispatcher.record_step(ctx, position)?;
        Ok(self)
    }
}

/// Shared, per-map dispatcher. One instance serves every thread; per-thread
/// state lives in the [`TraceContext`] passed to each step.
pub struct Dispatcher {
    config: Arc<MapConfig>,
    logger: Logger,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("settings", &self.config.settings())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(config: Arc<MapConfig>, logger: Logger) -> Self {
        Self { config, logger }
    }

    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Decides whether a freshly entered unit is traced line by line.
    ///
    /// Fails with [`TraceError::MapNotInstalled`] when there is nowhere to
    /// write yet; in that case tracing is not started.
    pub fn on_unit_enter(&self, unit: &UnitDescriptor) -> Result<TraceDecision<'_>> {
        if !self.config.settings().is_installed() {
            warn!(self.logger, "unit entered before a coverage map was installed");
            return Err(TraceError::MapNotInstalled);
        }
        if !unit.traceable {
            trace!(self.logger, "unit declined"; "traceable" => false);
            return Ok(TraceDecision::Decline);
        }
        trace!(self.logger, "unit armed"; "traceable" => true);
        Ok(TraceDecision::Arm(StepHandler { dispatcher: self }))
    }

    /// Hashes a step, folds it into the context's edge and bumps the map.
    /// Returns the edge index that was written.
    #[inline]
    pub fn record_step<P>(&self, ctx: &mut TraceContext, position: &P) -> Result<u32>
    where
        P: StepPosition + ?Sized,
    {
        let position = position.position().inspect_err(|err| {
            warn!(self.logger, "step aborted"; "error" => %err);
        })?;
        let settings = self.config.settings();
        if !settings.is_installed() {
            return Err(TraceError::MapNotInstalled);
        }
        let size_bits = settings.size_bits();
        let loc = hash_location(position.coarse, position.fine, size_bits);
        let edge = ctx.record_edge(loc, size_bits);
        // SAFETY: `edge` is below `2^size_bits` because both operands of the
        // xor are, and the map region is covered by the `MapConfig` setters'
        // contract.
        unsafe { settings.bump(edge) };
        Ok(edge)
    }
}

/// Builds a [`Dispatcher`], in the manner of the harness-side builders.
#[derive(Default)]
pub struct DispatcherBuilder {
    config: Option<Arc<MapConfig>>,
    buffer: Option<(u64, u8)>,
    logger: Option<Logger>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shares an existing configuration with the dispatcher.
    pub fn with_config(mut self, config: Arc<MapConfig>) -> Self {
        self.config = Some(config);
        self
    }

    /// Installs `buffer` as the map when the dispatcher is built.
    pub fn with_buffer(mut self, buffer: &CoverageBuffer) -> Self {
        self.buffer = Some((buffer.start_address(), buffer.size_bits()));
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn build(self) -> Result<Dispatcher> {
        let config = self.config.unwrap_or_default();
        let logger = self.logger.unwrap_or_else(|| Logger::root(Discard, o!()));
        if let Some((start, size_bits)) = self.buffer {
            // SAFETY: the pair comes from a leaked `CoverageBuffer` of exactly
            // `2^size_bits` bytes, which stays valid for the whole process.
            unsafe {
                config.set_map_size_bits(size_bits)?;
                config.set_map_start(start)?;
            }
        }
        let settings = config.settings();
        if !settings.is_installed() {
            return Err(TraceError::MapNotInstalled);
        }
        info!(logger, "coverage dispatcher ready";
            "start" => format!("{:#x}", settings.start()),
            "size_bits" => settings.size_bits());
        Ok(Dispatcher::new(config, logger))
    }
}
