//! Logging for the nsroot binaries.
//!
//! These tools log sparingly: one-line warnings from the best-effort paths
//! and debug traces of the launch sequence. Records go to stderr by
//! default, next to the launcher's own protocol messages, or to a file
//! when one is given. The level comes from `NSROOT_LOG_LEVEL` and defaults
//! to `warn`.

use std::env;
use std::fs::{File, OpenOptions};
use std::io::{stderr, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use anyhow::{Context, Result};
use log::{Level, LevelFilter, Log, Metadata, Record};
use once_cell::sync::OnceCell;

static LOGGER: OnceCell<NsrootLogger> = OnceCell::new();

pub struct NsrootLogger {
    level: LevelFilter,
    file: Option<Mutex<File>>,
}

/// Wires up the `log` macros. Safe to call more than once; only the first
/// call's destination wins.
pub fn init(log_file: Option<PathBuf>) -> Result<()> {
    let level = env::var("NSROOT_LOG_LEVEL")
        .ok()
        .and_then(|value| LevelFilter::from_str(&value).ok())
        .unwrap_or(LevelFilter::Warn);

    let file = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Some(Mutex::new(file))
        }
        None => None,
    };

    let logger = LOGGER.get_or_init(|| NsrootLogger { level, file });
    if log::set_logger(logger).is_ok() {
        log::set_max_level(level);
    }
    Ok(())
}

impl Log for NsrootLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Module target only at debug and below.
        let level = record.level().to_string().to_lowercase();
        let line = if record.level() >= Level::Debug {
            format!("{}: {}: {}", level, record.target(), record.args())
        } else {
            format!("{}: {}", level, record.args())
        };

        match &self.file {
            Some(file) => {
                if let Ok(mut file) = file.lock() {
                    // Only file records carry a timestamp.
                    let stamp = chrono::Local::now().format("%b %e %H:%M:%S");
                    let _ = writeln!(file, "{} {}", stamp, line);
                }
            }
            None => {
                let _ = writeln!(stderr(), "{}", line);
            }
        }
    }

    fn flush(&self) {
        match &self.file {
            Some(file) => {
                if let Ok(mut file) = file.lock() {
                    let _ = file.flush();
                }
            }
            None => {
                let _ = stderr().flush();
            }
        }
    }
}
