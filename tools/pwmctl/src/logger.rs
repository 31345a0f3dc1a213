//! Coloured, level-tagged log lines on stderr.

use colored::{ColoredString, Colorize};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

pub struct ConsoleLogger {
    level: LevelFilter,
}

impl ConsoleLogger {
    pub fn new(level: LevelFilter) -> Self {
        Self { level }
    }

    /// One rendered log line, without the trailing newline.
    pub fn render(&self, record: &Record<'_>) -> String {
        format!(
            "{} {} {}",
            level_tag(record.level()),
            record.target().dimmed(),
            record.args()
        )
    }
}

fn level_tag(level: Level) -> ColoredString {
    match level {
        Level::Error => "ERROR".bright_red().bold(),
        Level::Warn => "WARN ".bright_yellow(),
        Level::Info => "INFO ".bright_green(),
        Level::Debug => "DEBUG".bright_blue(),
        Level::Trace => "TRACE".dimmed(),
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("{}", self.render(record));
        }
    }

    fn flush(&self) {}
}

/// Installs the console logger as the process-wide `log` backend.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    let logger: &'static ConsoleLogger = Box::leak(Box::new(ConsoleLogger::new(level)));
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}
