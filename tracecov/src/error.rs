use thiserror::Error;

use crate::constants::MAX_MAP_SIZE_BITS;

/// Errors surfaced by map configuration and by the trace dispatcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
    #[error("map size bits must be within 1..={max}, got {0}", max = MAX_MAP_SIZE_BITS)]
    InvalidMapSizeBits(u8),
    #[error("map start address {0:#x} does not fit in a pointer")]
    InvalidMapStart(u64),
    #[error("no coverage map installed")]
    MapNotInstalled,
    #[error("step event carries no usable {field}")]
    PositionUnavailable { field: &'static str },
}

impl TraceError {
    /// Whether the error comes from a configuration call rather than from a
    /// step event.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        !matches!(self, TraceError::PositionUnavailable { .. })
    }
}

pub type Result<T, E = TraceError> = std::result::Result<T, E>;
