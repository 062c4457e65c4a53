//! Leveled logging for the server: colored console output plus an optional
//! append-mode file sink. One `Logger` is built at startup and handed down
//! by reference.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn label(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO ",
            LogLevel::Warn => "WARN ",
            LogLevel::Error => "ERROR",
        }
    }

    fn color(self) -> &'static str {
        match self {
            LogLevel::Debug => "36",
            LogLevel::Info => "32",
            LogLevel::Warn => "33",
            LogLevel::Error => "31",
        }
    }
}

pub struct Logger {
    min_level: LogLevel,
    console: bool,
    file: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(min_level: LogLevel) -> Self {
        Logger {
            min_level,
            console: true,
            file: None,
        }
    }

    /// Attach a log file, creating its parent directory if needed.
    pub fn with_file(mut self, path: &Path) -> std::io::Result<Self> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        self.file = Some(Mutex::new(file));
        Ok(self)
    }

    pub fn quiet(mut self) -> Self {
        self.console = false;
        self
    }

    pub fn debug(&self, msg: &str) {
        self.log(LogLevel::Debug, msg);
    }

    pub fn info(&self, msg: &str) {
        self.log(LogLevel::Info, msg);
    }

    pub fn warn(&self, msg: &str) {
        self.log(LogLevel::Warn, msg);
    }

    pub fn error(&self, msg: &str) {
        self.log(LogLevel::Error, msg);
    }

    fn log(&self, level: LogLevel, msg: &str) {
        if level < self.min_level {
            return;
        }
        let ts = format_time(SystemTime::now());
        if self.console {
            println!(
                "[{}] \x1b[{}m{}\x1b[0m {}",
                ts,
                level.color(),
                level.label(),
                msg
            );
        }
        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                let _ = writeln!(f, "[{}] {} {}", ts, level.label(), msg);
            }
        }
    }
}

/// Local-time `YYYY-MM-DD HH:MM:SS`, also used for directory listings.
pub fn format_time(t: SystemTime) -> String {
    let secs = t
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as libc::time_t;
    let mut tm: libc::tm = unsafe { std::mem::zeroed() };
    unsafe {
        libc::localtime_r(&secs, &mut tm);
    }
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        tm.tm_year + 1900,
        tm.tm_mon + 1,
        tm.tm_mday,
        tm.tm_hour,
        tm.tm_min,
        tm.tm_sec
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_format_time_epoch_fields() {
        // 2021-01-01T12:30:05Z; only check the shape since the zone is local.
        let t = UNIX_EPOCH + Duration::from_secs(1_609_504_205);
        let s = format_time(t);
        assert_eq!(s.len(), 19);
        assert_eq!(&s[4..5], "-");
        assert_eq!(&s[13..14], ":");
    }
}
