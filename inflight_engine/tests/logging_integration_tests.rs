//! Integration tests for the logging facade
//!
//! Exercises the exported macros from outside the crate. No GPU required.
//!
//! Run with: cargo test --test logging_integration_tests

use inflight_engine::inflight::{Engine, Error, Result};
use inflight_engine::inflight::log::{LogEntry, LogSeverity, Logger};
use inflight_engine::{engine_bail, engine_debug, engine_err, engine_error, engine_info, engine_trace, engine_warn};
use serial_test::serial;
use std::sync::{Arc, Mutex};

// ============================================================================
// TEST LOGGERS
// ============================================================================

/// Captures every entry
struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl CaptureLogger {
    fn install() -> Arc<Mutex<Vec<LogEntry>>> {
        let entries = Arc::new(Mutex::new(Vec::new()));
        Engine::set_logger(Self { entries: entries.clone() });
        entries
    }
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

/// Keeps entries at or above a minimum severity
struct ThresholdLogger {
    min_severity: LogSeverity,
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Logger for ThresholdLogger {
    fn log(&self, entry: &LogEntry) {
        if entry.severity >= self.min_severity {
            self.entries.lock().unwrap().push(entry.clone());
        }
    }
}

// ============================================================================
// MACROS
// ============================================================================

#[test]
#[serial]
fn test_integration_macros_route_to_custom_logger() {
    let entries = CaptureLogger::install();

    engine_trace!("inflight::test", "trace {}", 1);
    engine_debug!("inflight::test", "debug {}", 2);
    engine_info!("inflight::test", "info {}", 3);
    engine_warn!("inflight::test", "warn {}", 4);
    engine_error!("inflight::test", "error {}", 5);

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 5);
    assert_eq!(captured[0].severity, LogSeverity::Trace);
    assert_eq!(captured[0].message, "trace 1");
    assert_eq!(captured[4].severity, LogSeverity::Error);
    assert_eq!(captured[4].message, "error 5");
    assert!(captured.iter().all(|e| e.source == "inflight::test"));

    // Only errors carry a location
    assert!(captured[2].file.is_none());
    assert_eq!(captured[4].file, Some(file!()));
    assert!(captured[4].line.is_some());

    drop(captured);
    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_engine_err_builds_backend_error() {
    let entries = CaptureLogger::install();

    let err = engine_err!("inflight::test", "pool {} exhausted", 7);

    assert_eq!(err, Error::BackendError("pool 7 exhausted".to_string()));
    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Error);
    assert_eq!(captured[0].message, "pool 7 exhausted");

    drop(captured);
    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_engine_bail_in_fallible_function() {
    fn checked_slot(slot: usize, max: usize) -> Result<usize> {
        if slot >= max {
            engine_bail!("inflight::test", "slot {} out of range (max {})", slot, max);
        }
        Ok(slot)
    }

    let entries = CaptureLogger::install();

    assert_eq!(checked_slot(1, 2), Ok(1));
    assert!(entries.lock().unwrap().is_empty());

    let err = checked_slot(2, 2).unwrap_err();
    assert_eq!(err.to_string(), "Backend error: slot 2 out of range (max 2)");
    assert_eq!(entries.lock().unwrap().len(), 1);

    Engine::reset_logger();
}

// ============================================================================
// LOGGER LIFECYCLE
// ============================================================================

#[test]
#[serial]
fn test_integration_threshold_logger() {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(ThresholdLogger { min_severity: LogSeverity::Warn, entries: entries.clone() });

    engine_trace!("inflight::test", "dropped");
    engine_info!("inflight::test", "dropped");
    engine_warn!("inflight::test", "kept");
    engine_error!("inflight::test", "kept");

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 2);
    assert!(captured.iter().all(|e| e.message == "kept"));

    drop(captured);
    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_logger_reset() {
    let entries = CaptureLogger::install();
    engine_info!("inflight::test", "before reset");

    Engine::reset_logger();
    engine_info!("inflight::test", "after reset");

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].message, "before reset");
}

#[test]
#[serial]
fn test_integration_logging_from_threads() {
    let entries = CaptureLogger::install();

    let handles: Vec<_> = (0..4)
        .map(|i| std::thread::spawn(move || engine_debug!("inflight::test", "thread {}", i)))
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(entries.lock().unwrap().len(), 4);
    Engine::reset_logger();
}
