//! A `log` sink for tests that check what a build said.
//!
//! Tests run in parallel and share this logger, so each one should look only
//! at lines mentioning a name it owns.

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::{Mutex, Once};

static INSTALL: Once = Once::new();
static LINES: Mutex<Vec<String>> = Mutex::new(Vec::new());
static LOGGER: Capture = Capture;

struct Capture;

impl Log for Capture {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Ok(mut lines) = LINES.lock() {
            lines.push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

pub fn install() {
    INSTALL.call_once(|| {
        log::set_logger(&LOGGER).unwrap();
        log::set_max_level(LevelFilter::Info);
    });
}

pub fn lines_mentioning(needle: &str) -> Vec<String> {
    LINES
        .lock()
        .unwrap()
        .iter()
        .filter(|line| line.contains(needle))
        .cloned()
        .collect()
}
