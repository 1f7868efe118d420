//! Wire trace logging.
//!
//! When a log directory is configured, every frame crossing the transport is
//! appended to `{log_dir}/{log_id}.log` as `[timestamp] DIRECTION: frame`.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    sync::{Arc, Mutex},
};

use chrono::{SecondsFormat, Utc};

/// Thread-safe handle to an append-only log file.
pub type LogHandle = Arc<Mutex<Option<File>>>;

/// A handle that discards everything.
pub fn disabled() -> LogHandle {
    Arc::new(Mutex::new(None))
}

/// Current UTC time as ISO 8601 with milliseconds (e.g. 2026-02-04T10:15:30.123Z).
fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Write a timestamped line to the log file (if present).
pub fn log_line(handle: &LogHandle, direction: &str, data: &str) {
    if let Ok(mut guard) = handle.lock() {
        if let Some(ref mut file) = *guard {
            let _ = writeln!(file, "[{}] {}: {}", utc_timestamp(), direction, data);
            let _ = file.flush();
        }
    }
}

/// Open (or create) `{log_dir}/{log_id}.log` and return a shared handle.
///
/// Any failure yields a disabled handle; tracing is best-effort.
pub fn open_log_file(log_dir: Option<&str>, log_id: &str) -> LogHandle {
    let file = log_dir.and_then(|dir| {
        let path = Path::new(dir).join(format!("{}.log", log_id));
        std::fs::create_dir_all(dir).ok()?;
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                log::warn!("Failed to open wire log {}: {}", path.display(), e);
                None
            }
        }
    });
    Arc::new(Mutex::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn utc_timestamp_format() {
        let ts = utc_timestamp();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), 24);
        assert_eq!(&ts[10..11], "T");
        assert_eq!(&ts[19..20], ".");
    }

    #[test]
    fn open_log_file_creates_file() {
        let dir = tempdir().unwrap();
        let log_dir = dir.path().to_str().unwrap();

        let handle = open_log_file(Some(log_dir), "wire");
        assert!(handle.lock().unwrap().is_some());
        assert!(dir.path().join("wire.log").exists());
    }

    #[test]
    fn open_log_file_none_dir() {
        let handle = open_log_file(None, "wire");
        assert!(handle.lock().unwrap().is_none());
    }

    #[test]
    fn log_line_appends() {
        let dir = tempdir().unwrap();
        let log_dir = dir.path().to_str().unwrap();

        let handle = open_log_file(Some(log_dir), "wire");
        log_line(&handle, "SEND", r#"{"event":"join_session"}"#);
        log_line(&handle, "RECV", r#"{"event":"tool_call"}"#);

        let contents = std::fs::read_to_string(dir.path().join("wire.log")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("SEND: {\"event\":\"join_session\"}"));
        assert!(lines[1].contains("RECV: "));
    }

    #[test]
    fn disabled_handle_ignores_writes() {
        let handle = disabled();
        log_line(&handle, "SEND", "ignored");
        assert!(handle.lock().unwrap().is_none());
    }
}
