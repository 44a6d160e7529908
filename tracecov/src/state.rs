//! Per-activation tracing state.
//!
//! Hosts that prefer to feed a single event stream rather than juggle the
//! handler returned by [`Dispatcher::on_unit_enter`] drive a [`UnitTracer`]
//! instead. It holds one of two states:
//!
//! ```text
//!   state  event               next         result
//!   -----  ------------------  -----------  -------------------------------
//!   Idle   Enter(traceable)    Armed(unit)  Continue
//!   Idle   Enter(trivial)      Idle         Stop
//!   Idle   Step                Idle         Stop, map untouched
//!   Armed  Step(position)      Armed        Continue, one map increment
//!   Armed  Step(unavailable)   Idle         Err(PositionUnavailable)
//!   Armed  Enter(unit)         (re-decide as from Idle)
//!   any    Return              Idle         Stop
//! ```
//!
//! An entry while no map is installed fails and leaves the tracer idle.

use crate::dispatcher::{Dispatcher, TraceDecision};
use crate::edge::TraceContext;
use crate::error::Result;
use crate::position::{PositionInfo, StepPosition, UnitDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceState {
    Idle,
    Armed(UnitDescriptor),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent<P = PositionInfo> {
    Enter(UnitDescriptor),
    Step(P),
    Return,
}

/// What the host should do after delivering an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Keep delivering step events for this unit.
    Continue,
    /// No further step events are wanted.
    Stop,
}

#[derive(Debug)]
pub struct UnitTracer<'d> {
    dispatcher: &'d Dispatcher,
    state: TraceState,
}

impl<'d> UnitTracer<'d> {
    pub fn new(dispatcher: &'d Dispatcher) -> Self {
        Self {
            dispatcher,
            state: TraceState::Idle,
        }
    }

    pub fn state(&self) -> TraceState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, TraceState::Armed(_))
    }

    /// Applies one event to the state machine.
    pub fn handle<P>(
        &mut self,
        ctx: &mut TraceContext,
        event: TraceEvent<P>,
    ) -> Result<Continuation>
    where
        P: StepPosition,
    {
        let armed = self.is_armed();
        match event {
            TraceEvent::Enter(unit) => {
                self.state = TraceState::Idle;
                match self.dispatcher.on_unit_enter(&unit)? {
                    TraceDecision::Decline => Ok(Continuation::Stop),
                    TraceDecision::Arm(_) => {
                        self.state = TraceState::Armed(unit);
                        Ok(Continuation::Continue)
                    }
                }
            }
            TraceEvent::Step(_) if !armed => Ok(Continuation::Stop),
            TraceEvent::Step(position) => match self.dispatcher.record_step(ctx, &position) {
                Ok(_) => Ok(Continuation::Continue),
                Err(err) => {
                    self.state = TraceState::Idle;
                    Err(err)
                }
            },
            TraceEvent::Return => {
                self.state = TraceState::Idle;
                Ok(Continuation::Stop)
            }
        }
    }
}
