//! File-backed application logger.
//!
//! Every entry is formatted as `[timestamp] LEVEL: message | {json meta}`,
//! mirrored to the console through `tracing`, and appended to daily files
//! under the log directory:
//!
//! ```text
//! logs/
//! ├── 2024-01-15.log            ← every entry
//! ├── 2024-01-15-error.log      ← ERROR entries only
//! └── 2024-01-15-security.log   ← security events only
//! ```
//!
//! The logger is constructed once at startup and shared through
//! [`AppState`](crate::state::AppState). Writing never fails from the
//! caller's point of view: I/O errors are reported on the console and
//! dropped.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the three daily log files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFile {
    General,
    Error,
    Security,
}

impl LogFile {
    fn suffix(self) -> &'static str {
        match self {
            LogFile::General => "",
            LogFile::Error => "-error",
            LogFile::Security => "-security",
        }
    }
}

/// Open append handles for a single calendar day.
struct DailyFiles {
    day: NaiveDate,
    general: Option<File>,
    error: Option<File>,
    security: Option<File>,
}

impl DailyFiles {
    fn new(day: NaiveDate) -> Self {
        Self {
            day,
            general: None,
            error: None,
            security: None,
        }
    }

    fn slot(&mut self, file: LogFile) -> &mut Option<File> {
        match file {
            LogFile::General => &mut self.general,
            LogFile::Error => &mut self.error,
            LogFile::Security => &mut self.security,
        }
    }

    fn handles(&mut self) -> impl Iterator<Item = &mut File> {
        [&mut self.general, &mut self.error, &mut self.security]
            .into_iter()
            .filter_map(Option::as_mut)
    }
}

/// Application logger writing to the console and to daily log files.
pub struct Logger {
    log_dir: PathBuf,
    debug_enabled: bool,
    files: Mutex<Option<DailyFiles>>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("log_dir", &self.log_dir)
            .field("debug_enabled", &self.debug_enabled)
            .finish_non_exhaustive()
    }
}

impl Logger {
    /// Create a logger writing under `log_dir`.
    ///
    /// Debug entries are only written when `debug_enabled` is set (the
    /// `development` environment). The directory is created if missing; a
    /// failure to do so is reported and later writes will fail quietly.
    pub fn new(log_dir: impl Into<PathBuf>, debug_enabled: bool) -> Self {
        let log_dir = log_dir.into();
        if let Err(e) = fs::create_dir_all(&log_dir) {
            tracing::error!(path = %log_dir.display(), error = %e, "Failed to create log directory");
        }

        Self {
            log_dir,
            debug_enabled,
            files: Mutex::new(None),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Path of a given log file for a given day.
    pub fn file_path(&self, file: LogFile, day: NaiveDate) -> PathBuf {
        self.log_dir
            .join(format!("{}{}.log", day.format("%Y-%m-%d"), file.suffix()))
    }

    pub fn debug(&self, message: &str, meta: Option<&Value>) {
        if !self.debug_enabled {
            return;
        }
        self.write(LogLevel::Debug, message, meta, false);
    }

    pub fn info(&self, message: &str, meta: Option<&Value>) {
        self.write(LogLevel::Info, message, meta, false);
    }

    pub fn warn(&self, message: &str, meta: Option<&Value>) {
        self.write(LogLevel::Warn, message, meta, false);
    }

    pub fn error(&self, message: &str, meta: Option<&Value>) {
        self.write(LogLevel::Error, message, meta, false);
    }

    /// Log an error value, attaching its source chain to the metadata.
    pub fn log_error(&self, error: &(dyn std::error::Error + 'static), meta: Option<&Value>) {
        let mut fields = object_fields(meta);

        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(Value::String(cause.to_string()));
            source = cause.source();
        }
        if !causes.is_empty() {
            fields.insert("causes".to_string(), Value::Array(causes));
        }

        self.error(&error.to_string(), Some(&Value::Object(fields)));
    }

    /// Log a security event to the general and security files.
    pub fn log_security_event(&self, event: &str, details: Option<&Value>) {
        let message = format!("Security event: {event}");
        self.write(LogLevel::Warn, &message, details, true);
    }

    /// Log an operation duration at debug level.
    pub fn log_performance(&self, operation: &str, duration: Duration, details: Option<&Value>) {
        let message = format!("Performance: {operation} took {}ms", duration.as_millis());
        self.debug(&message, details);
    }

    /// Sync every open handle to disk.
    pub fn flush(&self) {
        let mut guard = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(files) = guard.as_mut() {
            for handle in files.handles() {
                if let Err(e) = handle.flush().and_then(|()| handle.sync_all()) {
                    tracing::error!(error = %e, "Failed to flush log file");
                }
            }
        }
    }

    fn write(&self, level: LogLevel, message: &str, meta: Option<&Value>, security: bool) {
        let line = format_line(level, message, meta);
        echo_to_console(level, message, meta);

        let mut targets = vec![LogFile::General];
        if level == LogLevel::Error {
            targets.push(LogFile::Error);
        }
        if security {
            targets.push(LogFile::Security);
        }

        let today = Utc::now().date_naive();
        let mut guard = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.as_ref().is_none_or(|files| files.day != today) {
            *guard = Some(DailyFiles::new(today));
        }
        let Some(files) = guard.as_mut() else {
            return;
        };

        for target in targets {
            if let Err(e) = self.append(files, target, &line) {
                tracing::error!(
                    path = %self.file_path(target, today).display(),
                    error = %e,
                    "Failed to write to log file"
                );
            }
        }
    }

    fn append(&self, files: &mut DailyFiles, target: LogFile, line: &str) -> io::Result<()> {
        let path = self.file_path(target, files.day);
        let slot = files.slot(target);
        if slot.is_none() {
            *slot = Some(OpenOptions::new().create(true).append(true).open(path)?);
        }
        let Some(handle) = slot.as_mut() else {
            return Ok(());
        };

        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        handle.write_all(buf.as_bytes())
    }
}

/// Format a single log line: `[timestamp] LEVEL: message | {meta}`.
pub fn format_line(level: LogLevel, message: &str, meta: Option<&Value>) -> String {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    match meta {
        Some(meta) => format!("[{timestamp}] {level}: {message} | {meta}"),
        None => format!("[{timestamp}] {level}: {message}"),
    }
}

/// Copy the fields of a metadata object, wrapping non-object metadata.
fn object_fields(meta: Option<&Value>) -> Map<String, Value> {
    match meta {
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            let mut map = Map::new();
            map.insert("meta".to_string(), other.clone());
            map
        }
        None => Map::new(),
    }
}

fn echo_to_console(level: LogLevel, message: &str, meta: Option<&Value>) {
    let meta = meta.map(Value::to_string).unwrap_or_default();
    match level {
        LogLevel::Debug => tracing::debug!(meta = %meta, "{message}"),
        LogLevel::Info => tracing::info!(meta = %meta, "{message}"),
        LogLevel::Warn => tracing::warn!(meta = %meta, "{message}"),
        LogLevel::Error => tracing::error!(meta = %meta, "{message}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn read(logger: &Logger, file: LogFile) -> String {
        let path = logger.file_path(file, Utc::now().date_naive());
        fs::read_to_string(path).unwrap_or_default()
    }

    #[test]
    fn test_format_line_with_meta() {
        let line = format_line(LogLevel::Info, "hello", Some(&json!({"a": 1})));

        assert!(line.starts_with('['));
        assert!(line.ends_with("] INFO: hello | {\"a\":1}"));
    }

    #[test]
    fn test_format_line_without_meta() {
        let line = format_line(LogLevel::Warn, "careful", None);

        assert!(line.ends_with("] WARN: careful"));
        assert!(!line.contains(" | "));
    }

    #[test]
    fn test_file_path_naming() {
        let dir = TempDir::new().unwrap();
        let logger = Logger::new(dir.path(), true);
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();

        assert_eq!(
            logger.file_path(LogFile::General, day),
            dir.path().join("2024-01-15.log")
        );
        assert_eq!(
            logger.file_path(LogFile::Error, day),
            dir.path().join("2024-01-15-error.log")
        );
        assert_eq!(
            logger.file_path(LogFile::Security, day),
            dir.path().join("2024-01-15-security.log")
        );
    }

    #[test]
    fn test_info_goes_to_general_only() {
        let dir = TempDir::new().unwrap();
        let logger = Logger::new(dir.path(), true);

        logger.info("server started", None);

        assert!(read(&logger, LogFile::General).contains("INFO: server started"));
        assert!(read(&logger, LogFile::Error).is_empty());
        assert!(read(&logger, LogFile::Security).is_empty());
    }

    #[test]
    fn test_error_is_mirrored_to_error_file() {
        let dir = TempDir::new().unwrap();
        let logger = Logger::new(dir.path(), true);

        logger.error("disk on fire", Some(&json!({"disk": "sda"})));

        assert!(read(&logger, LogFile::General).contains("ERROR: disk on fire"));
        assert!(read(&logger, LogFile::Error).contains("{\"disk\":\"sda\"}"));
    }

    #[test]
    fn test_security_event_goes_to_security_file() {
        let dir = TempDir::new().unwrap();
        let logger = Logger::new(dir.path(), false);

        logger.log_security_event("probe", Some(&json!({"severity": "HIGH"})));

        let security = read(&logger, LogFile::Security);
        assert!(security.contains("WARN: Security event: probe"));
        assert!(security.contains("HIGH"));
        assert!(read(&logger, LogFile::General).contains("Security event: probe"));
    }

    #[test]
    fn test_debug_suppressed_outside_development() {
        let dir = TempDir::new().unwrap();
        let logger = Logger::new(dir.path(), false);

        logger.debug("noisy", None);
        logger.log_performance("HTTP request", Duration::from_millis(1500), None);

        assert!(read(&logger, LogFile::General).is_empty());
    }

    #[test]
    fn test_performance_written_in_development() {
        let dir = TempDir::new().unwrap();
        let logger = Logger::new(dir.path(), true);

        logger.log_performance("HTTP request", Duration::from_millis(1500), None);

        assert!(read(&logger, LogFile::General).contains("DEBUG: Performance: HTTP request took 1500ms"));
    }

    #[test]
    fn test_log_error_includes_message_and_context() {
        let dir = TempDir::new().unwrap();
        let logger = Logger::new(dir.path(), true);
        let err = io::Error::other("Request timeout");

        logger.log_error(&err, Some(&json!({"requestId": "req_1"})));

        let errors = read(&logger, LogFile::Error);
        assert!(errors.contains("ERROR: Request timeout"));
        assert!(errors.contains("req_1"));
    }

    #[test]
    fn test_entries_are_appended() {
        let dir = TempDir::new().unwrap();
        let logger = Logger::new(dir.path(), true);

        logger.info("one", None);
        logger.info("two", None);
        logger.flush();

        let general = read(&logger, LogFile::General);
        assert_eq!(general.lines().count(), 2);
        assert!(general.lines().next().unwrap().contains("one"));
    }

    #[test]
    fn test_write_failure_does_not_panic() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"file").unwrap();

        let logger = Logger::new(&blocker, true);
        logger.info("goes nowhere", None);
        logger.error("also nowhere", None);
        logger.flush();
    }
}
