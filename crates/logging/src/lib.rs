use chrono::Local;
use once_cell::sync::Lazy;
use std::sync::Mutex;
use uuid::Uuid;

// In-process log buffer plus console output. The buffer keeps everything
// regardless of level so status queries can show full judging history; the
// level only gates what reaches the console.
static LOGGER: Lazy<Mutex<Logger>> = Lazy::new(|| Mutex::new(Logger::new()));

const MAX_BUFFERED_LINES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

struct Logger {
    level: LogLevel,
    lines: Vec<String>,
}

impl Logger {
    fn new() -> Self {
        Logger {
            level: LogLevel::Info,
            lines: Vec::new(),
        }
    }

    fn write(&mut self, level: LogLevel, message: &str) {
        let timestamp = Local::now().format("%H:%M:%S");
        let formatted = format!("[{}] {:5} {}", timestamp, level.prefix(), message);

        if self.lines.len() >= MAX_BUFFERED_LINES {
            self.lines.remove(0);
        }
        self.lines.push(formatted.clone());

        if level >= self.level {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", formatted),
                _ => println!("{}", formatted),
            }
        }
    }
}

pub fn set_log_level(level: LogLevel) {
    if let Ok(mut logger) = LOGGER.lock() {
        logger.level = level;
    }
}

pub fn get_log_level() -> LogLevel {
    LOGGER
        .lock()
        .map(|logger| logger.level)
        .unwrap_or(LogLevel::Info)
}

pub fn log(level: LogLevel, message: &str) {
    if let Ok(mut logger) = LOGGER.lock() {
        logger.write(level, message);
    }
}

/// Snapshot of everything logged so far.
pub fn get_logs() -> Vec<String> {
    LOGGER
        .lock()
        .map(|logger| logger.lines.clone())
        .unwrap_or_default()
}

pub fn clear_logs() {
    if let Ok(mut logger) = LOGGER.lock() {
        logger.lines.clear();
    }
}

pub fn debug(message: &str) {
    log(LogLevel::Debug, message);
}

pub fn info(message: &str) {
    log(LogLevel::Info, message);
}

pub fn warning(message: &str) {
    log(LogLevel::Warning, message);
}

pub fn error(message: &str) {
    log(LogLevel::Error, message);
}

/// Log a line tied to one submission, so interleaved judging runs stay
/// attributable.
pub fn submission(id: Uuid, message: &str) {
    log(LogLevel::Info, &format!("[{}] {}", id, message));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_records_below_console_level() {
        let marker = format!("buffered-{}", Uuid::new_v4());
        set_log_level(LogLevel::Error);
        debug(&marker);
        set_log_level(LogLevel::Info);
        let logs = get_logs();
        assert!(logs
            .iter()
            .any(|line| line.contains(&marker) && line.contains("DEBUG")));
    }

    #[test]
    fn submission_lines_carry_the_id() {
        let id = Uuid::new_v4();
        submission(id, "compiling");
        let logs = get_logs();
        assert!(logs.iter().any(|line| line.contains(&id.to_string())));
    }
}
