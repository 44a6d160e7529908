//! Typed views of the host events the dispatcher consumes.
//!
//! Host adapters pull the line-table length and the `(line, offset)` pair out
//! of whatever their runtime hands them and convert it here. Nothing in this
//! module touches the map.

use crate::error::{Result, TraceError};

/// What the dispatcher needs to know about a unit (function, code object) on
/// entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitDescriptor {
    pub traceable: bool,
}

impl UnitDescriptor {
    pub fn new(traceable: bool) -> Self {
        Self { traceable }
    }

    /// A unit is worth line tracing when its line-number table has any
    /// entry past the unit's first line. An empty table means a single point.
    pub fn from_line_table_len(len: usize) -> Self {
        Self::new(len > 0)
    }
}

/// Position of one step: `coarse` is the line (or block) number, `fine` the
/// instruction offset within the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionInfo {
    pub coarse: u32,
    pub fine: u32,
}

impl PositionInfo {
    pub fn new(coarse: u32, fine: u32) -> Self {
        Self { coarse, fine }
    }

    /// Builds a position from raw host values. Only the low 32 bits of each
    /// value are kept.
    pub fn from_raw(line: Option<u64>, offset: Option<u64>) -> Result<Self> {
        let line = line.ok_or(TraceError::PositionUnavailable { field: "line" })?;
        let offset = offset.ok_or(TraceError::PositionUnavailable { field: "offset" })?;
        Ok(Self::new(line as u32, offset as u32))
    }
}

/// Raw step fields as a host adapter found them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawPosition {
    pub line: Option<u64>,
    pub offset: Option<u64>,
}

/// Anything a step event can be read from.
pub trait StepPosition {
    fn position(&self) -> Result<PositionInfo>;
}

impl StepPosition for PositionInfo {
    #[inline]
    fn position(&self) -> Result<PositionInfo> {
        Ok(*self)
    }
}

impl StepPosition for RawPosition {
    #[inline]
    fn position(&self) -> Result<PositionInfo> {
        PositionInfo::from_raw(self.line, self.offset)
    }
}

impl StepPosition for Result<PositionInfo> {
    fn position(&self) -> Result<PositionInfo> {
        self.clone()
    }
}

impl<P: StepPosition> StepPosition for Option<P> {
    fn position(&self) -> Result<PositionInfo> {
        match self {
            Some(inner) => inner.position(),
            None => Err(TraceError::PositionUnavailable { field: "position" }),
        }
    }
}
