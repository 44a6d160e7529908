//! The global facade shares one configuration across the test binary, so
//! everything that touches it lives in a single test.

use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use slog::{Drain, Never, OwnedKVList, Record};
use tracecov::hasher::hash_location;
use tracecov::hook;
use tracecov::position::{PositionInfo, RawPosition, UnitDescriptor};
use tracecov::util::CoverageBuffer;
use tracecov::{DEFAULT_MAP_SIZE_BITS, TraceError};

/// Keeps the message of every record it sees.
#[derive(Clone, Default)]
struct CaptureDrain(Arc<Mutex<Vec<String>>>);

impl CaptureDrain {
    fn messages(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl Drain for CaptureDrain {
    type Ok = ();
    type Err = Never;

    fn log(&self, record: &Record<'_>, _: &OwnedKVList) -> Result<(), Never> {
        self.0.lock().unwrap().push(record.msg().to_string());
        Ok(())
    }
}

#[test]
fn global_hooks_follow_process_configuration() -> anyhow::Result<()> {
    let capture = CaptureDrain::default();
    assert!(hook::set_logger(slog::Logger::root(capture.clone(), slog::o!())));

    let defaults = hook::map_settings();
    assert!(!defaults.is_installed());
    assert_eq!(defaults.size_bits(), DEFAULT_MAP_SIZE_BITS);
    assert_matches!(
        hook::global_trace_hook(&UnitDescriptor::new(true)),
        Err(TraceError::MapNotInstalled)
    );
    assert!(
        capture
            .messages()
            .contains(&"unit entered before a coverage map was installed".to_string())
    );
    // The dispatcher is live now, so a later logger is refused.
    assert!(!hook::set_logger(slog::Logger::root(slog::Discard, slog::o!())));

    let buffer = CoverageBuffer::new(16)?;
    hook::install_buffer(&buffer)?;

    assert!(hook::global_trace_hook(&UnitDescriptor::from_line_table_len(0))?.is_none());
    assert!(buffer.hit_indices().is_empty());

    let line_hook = hook::global_trace_hook(&UnitDescriptor::from_line_table_len(3))?
        .expect("unit with a line table is armed");
    let line_hook = line_hook.call(&PositionInfo::new(10, 0))?;
    line_hook.call(&PositionInfo::new(10, 20))?;
    assert_eq!(buffer.hit_indices(), vec![46817, 60691]);
    assert_eq!(hook::thread_prev_location(), hash_location(10, 20, 16));

    // Another thread starts from a fresh previous location.
    let from_thread = std::thread::spawn(move || -> Result<u32, TraceError> {
        hook::global_trace_hook(&UnitDescriptor::new(true))?
            .expect("armed")
            .call(&PositionInfo::new(10, 0))?;
        Ok(hook::thread_prev_location())
    })
    .join()
    .expect("tracing thread panicked")?;
    assert_eq!(from_thread, hash_location(10, 0, 16));
    assert_eq!(buffer.get(46817), Some(2));

    let failed = line_hook.call(&RawPosition {
        line: Some(1),
        offset: None,
    });
    assert_matches!(failed, Err(TraceError::PositionUnavailable { field: "offset" }));
    assert!(capture.messages().contains(&"step aborted".to_string()));
    assert!(capture.messages().contains(&"map buffer installed".to_string()));

    // Shrinking the map masks the stale previous location.
    let small = CoverageBuffer::new(4)?;
    hook::install_buffer(&small)?;
    line_hook.call(&PositionInfo::new(3, 3))?;
    let expected = hash_location(3, 3, 4) ^ ((hash_location(10, 20, 16) & 0xF) >> 1);
    assert_eq!(small.hit_indices(), vec![expected as usize]);

    hook::reset_thread_context();
    assert_eq!(hook::thread_prev_location(), 0);

    assert_matches!(
        unsafe { hook::set_map_size_bits(0) },
        Err(TraceError::InvalidMapSizeBits(0))
    );
    unsafe {
        hook::set_map_size_bits(small.size_bits())?;
        hook::set_map_start(small.start_address())?;
    }
    assert_eq!(hook::map_settings().start() as u64, small.start_address());
    Ok(())
}
