//! Minimal stderr logger for `--verbose`.

use log::{Level, LevelFilter, Log, Metadata, Record};

struct StderrLogger {
    level: Level,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.target().starts_with("tensorlens")
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Install the logger. Without `verbose` only errors get through; the
/// commands report rejected operations themselves.
pub fn init(verbose: bool) {
    let level = if verbose { Level::Debug } else { Level::Error };
    let logger = Box::new(StderrLogger { level });
    // A second init (e.g. in tests) keeps the first logger.
    if log::set_boxed_logger(logger).is_ok() {
        log::set_max_level(if verbose { LevelFilter::Debug } else { LevelFilter::Error });
    }
}
