// src/utils/logger.rs

use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::sync::OnceLock;

static LOGGER: OnceLock<ConsoleLogger> = OnceLock::new();

struct ConsoleLogger {
  level: LevelFilter,
}

/// Installs the stderr logger. Fails if a logger is already set.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
  let logger = LOGGER.get_or_init(|| ConsoleLogger { level });
  log::set_logger(logger).map(|()| log::set_max_level(level))
}

/// Parses a level name from the config, falling back to `Warn`.
pub fn level_from_str(name: &str) -> LevelFilter {
  name.parse().unwrap_or(LevelFilter::Warn)
}

fn tag(level: Level) -> &'static str {
  match level {
    Level::Error => "ERROR",
    Level::Warn => "WARN ",
    Level::Info => "INFO ",
    Level::Debug => "DEBUG",
    Level::Trace => "TRACE",
  }
}

impl log::Log for ConsoleLogger {
  fn enabled(&self, metadata: &Metadata) -> bool {
    metadata.level() <= self.level
  }

  fn log(&self, record: &Record) {
    if self.enabled(record.metadata()) {
      // Format: "WARN  [cifvis::io::cif::repair] label C1A is ambiguous"
      let _ = writeln!(
        std::io::stderr().lock(),
        "{} [{}] {}",
        tag(record.level()),
        record.target(),
        record.args()
      );
    }
  }

  fn flush(&self) {
    let _ = std::io::stderr().flush();
  }
}
