//! Logging infrastructure for eventdeck
//!
//! Logs to ~/.eventdeck/logs/ with date-based files and automatic cleanup.
//! The TUI owns the terminal, so nothing is ever written to stdout/stderr.

#![allow(dead_code)]

use chrono::Local;
use std::cell::RefCell;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

/// Per-thread logging context (set after login)
#[derive(Default, Clone)]
pub struct LogContext {
    pub user: Option<String>,
    pub role: Option<String>,
}

thread_local! {
    static LOG_CONTEXT: RefCell<LogContext> = RefCell::new(LogContext::default());
}

/// Set the logging context for the current thread
pub fn set_context(ctx: LogContext) {
    LOG_CONTEXT.with(|c| {
        *c.borrow_mut() = ctx;
    });
}

/// Clear the logging context (on logout)
pub fn clear_context() {
    LOG_CONTEXT.with(|c| {
        *c.borrow_mut() = LogContext::default();
    });
}

fn context_prefix() -> String {
    LOG_CONTEXT.with(|c| {
        let ctx = c.borrow();
        let mut parts = Vec::new();
        if let Some(ref user) = ctx.user {
            parts.push(format!("usr:{}", user));
        }
        if let Some(ref role) = ctx.role {
            parts.push(format!("role:{}", role));
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!("[{}] ", parts.join("|"))
        }
    })
}

pub struct Logger {
    file: File,
    path: PathBuf,
}

impl Logger {
    fn new() -> Option<Self> {
        let log_dir = crate::storage::eventdeck_dir().ok()?.join("logs");
        fs::create_dir_all(&log_dir).ok()?;

        // Use date-based log file
        let date = Local::now().format("%Y-%m-%d");
        let path = log_dir.join(format!("eventdeck-{}.log", date));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .ok()?;

        Some(Self { file, path })
    }

    fn write(&mut self, level: &str, message: &str) {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let ctx = context_prefix();
        let line = format!("[{}] [{}] {}{}\n", timestamp, level, ctx, message);
        let _ = self.file.write_all(line.as_bytes());
        let _ = self.file.flush();
    }
}

/// Initialize the logger (call once at startup)
pub fn init() {
    let mut guard = LOGGER.lock().unwrap();
    if guard.is_none() {
        *guard = Logger::new();
    }
}

/// Log an info message
pub fn info(message: &str) {
    if let Ok(mut guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_mut() {
            logger.write("INFO", message);
        }
    }
}

/// Log an error message
pub fn error(message: &str) {
    if let Ok(mut guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_mut() {
            logger.write("ERROR", message);
        }
    }
}

/// Log a warning message
pub fn warn(message: &str) {
    if let Ok(mut guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_mut() {
            logger.write("WARN", message);
        }
    }
}

/// Log a debug message (only if EVENTDECK_TRACE is set)
pub fn debug(message: &str) {
    if std::env::var("EVENTDECK_TRACE").is_ok() {
        if let Ok(mut guard) = LOGGER.lock() {
            if let Some(logger) = guard.as_mut() {
                logger.write("DEBUG", message);
            }
        }
    }
}

/// Get path to today's log file
pub fn log_path() -> Option<PathBuf> {
    let log_dir = crate::storage::eventdeck_dir().ok()?.join("logs");
    let date = Local::now().format("%Y-%m-%d");
    Some(log_dir.join(format!("eventdeck-{}.log", date)))
}

/// Clean up old logs (keep last 7 days)
pub fn cleanup_old_logs() {
    if let Ok(log_dir) = crate::storage::eventdeck_dir().map(|h| h.join("logs")) {
        if let Ok(entries) = fs::read_dir(&log_dir) {
            let cutoff = Local::now() - chrono::Duration::days(7);
            for entry in entries.flatten() {
                if let Ok(metadata) = entry.metadata() {
                    if let Ok(modified) = metadata.modified() {
                        let modified: chrono::DateTime<Local> = modified.into();
                        if modified < cutoff {
                            let _ = fs::remove_file(entry.path());
                        }
                    }
                }
            }
        }
    }
}
