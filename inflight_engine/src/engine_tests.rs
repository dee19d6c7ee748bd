//! Unit tests for the Engine logging facade and the engine_* macros
//!
//! LOGGER is a process-wide OnceLock shared by every test in the crate, so
//! tests that swap it are #[serial] and only look at entries from their own
//! source string.

use crate::inflight::log::{LogEntry, LogSeverity, Logger};
use crate::inflight::{Engine, Error, Result};
use serial_test::serial;
use std::sync::{Arc, Mutex};

// ============================================================================
// TEST HELPERS
// ============================================================================

struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

fn capture() -> Arc<Mutex<Vec<LogEntry>>> {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(CaptureLogger { entries: entries.clone() });
    entries
}

fn from_source(entries: &Arc<Mutex<Vec<LogEntry>>>, source: &str) -> Vec<LogEntry> {
    entries
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.source == source)
        .cloned()
        .collect()
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

// ============================================================================
// FACADE TESTS
// ============================================================================

#[test]
#[serial]
fn test_log_without_location() {
    let entries = capture();

    Engine::log(LogSeverity::Info, "test::engine::plain", "hello".to_string());

    let captured = from_source(&entries, "test::engine::plain");
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Info);
    assert_eq!(captured[0].message, "hello");
    assert!(captured[0].file.is_none());
    assert!(captured[0].line.is_none());

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_log_detailed_carries_location() {
    let entries = capture();

    Engine::log_detailed(
        LogSeverity::Error,
        "test::engine::detailed",
        "boom".to_string(),
        "device_context.rs",
        12,
    );

    let captured = from_source(&entries, "test::engine::detailed");
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].file, Some("device_context.rs"));
    assert_eq!(captured[0].line, Some(12));

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_reset_logger_stops_capture() {
    let entries = capture();
    Engine::reset_logger();

    Engine::log(LogSeverity::Debug, "test::engine::reset", "not captured".to_string());

    assert!(from_source(&entries, "test::engine::reset").is_empty());
}

// ============================================================================
// MACRO TESTS
// ============================================================================

#[test]
#[serial]
fn test_severity_macros() {
    let entries = capture();

    crate::engine_trace!("test::engine::macros", "trace {}", 1);
    crate::engine_debug!("test::engine::macros", "debug {}", 2);
    crate::engine_info!("test::engine::macros", "info {}", 3);
    crate::engine_warn!("test::engine::macros", "warn {}", 4);
    crate::engine_error!("test::engine::macros", "error {}", 5);

    let captured = from_source(&entries, "test::engine::macros");
    let severities: Vec<_> = captured.iter().map(|e| e.severity).collect();
    assert_eq!(
        severities,
        vec![
            LogSeverity::Trace,
            LogSeverity::Debug,
            LogSeverity::Info,
            LogSeverity::Warn,
            LogSeverity::Error,
        ]
    );
    assert_eq!(captured[4].message, "error 5");
    assert!(captured[4].file.is_some());
    assert!(captured[3].file.is_none());

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_engine_err_logs_and_returns_backend_error() {
    let entries = capture();

    let err = crate::engine_err!("test::engine::err", "vkCreateFence failed: {}", -2);

    assert_eq!(err, Error::BackendError("vkCreateFence failed: -2".to_string()));
    let captured = from_source(&entries, "test::engine::err");
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Error);
    assert_eq!(captured[0].message, "vkCreateFence failed: -2");

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_engine_bail_returns_early() {
    let entries = capture();

    fn fails(flag: bool) -> Result<u32> {
        if flag {
            crate::engine_bail!("test::engine::bail", "bailing with {}", "flag");
        }
        Ok(7)
    }

    assert_eq!(fails(false), Ok(7));
    assert_eq!(fails(true), Err(Error::BackendError("bailing with flag".to_string())));
    assert_eq!(from_source(&entries, "test::engine::bail").len(), 1);

    Engine::reset_logger();
}
