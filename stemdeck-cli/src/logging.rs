use log::{LevelFilter, Log, Metadata, Record};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};

const DEFAULT_HISTORY: usize = 500;

pub type LogHistory = Arc<Mutex<VecDeque<String>>>;

struct SharedLogger {
    level: LevelFilter,
    history: LogHistory,
    capacity: usize,
    echo_stderr: bool,
}

impl Log for SharedLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format!("[{}] {}", record.level(), record.args());
        if self.echo_stderr {
            eprintln!("{}", line);
        }

        let mut history = self.history.lock().unwrap();
        if history.len() >= self.capacity {
            history.pop_front();
        }
        history.push_back(line);
    }

    fn flush(&self) {}
}

static HISTORY: OnceLock<LogHistory> = OnceLock::new();
static LOGGER: OnceLock<SharedLogger> = OnceLock::new();

fn level_from_env() -> LevelFilter {
    match std::env::var("RUST_LOG") {
        Ok(level) => parse_level(&level),
        Err(_) => LevelFilter::Info,
    }
}

fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn history_capacity() -> usize {
    std::env::var("STEMDECK_LOG_HISTORY")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|capacity| *capacity > 0)
        .unwrap_or(DEFAULT_HISTORY)
}

/// Install the process logger. Log lines are echoed to stderr unless
/// `quiet`, and the most recent ones are always kept in memory.
pub fn init(quiet: bool) -> LogHistory {
    let capacity = history_capacity();
    let history = HISTORY
        .get_or_init(|| Arc::new(Mutex::new(VecDeque::with_capacity(capacity))))
        .clone();

    let level = level_from_env();
    let logger = SharedLogger {
        level,
        history: history.clone(),
        capacity,
        echo_stderr: !quiet,
    };

    let logger_ref = LOGGER.get_or_init(|| logger);
    if log::set_logger(logger_ref).is_ok() {
        log::set_max_level(level);
    }

    history
}

pub fn snapshot(history: &LogHistory) -> Vec<String> {
    history.lock().unwrap().iter().cloned().collect()
}
