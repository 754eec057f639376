/// Logger that prints through `env_logger` and keeps the most recent
/// records in memory, so a dashboard can show its own diagnostics.
use env_logger::Logger;
use log::{Log, Metadata, Record, SetLoggerError};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{LazyLock, Mutex};
use tokio::sync::broadcast;

const MAX_LOG_ENTRIES: usize = 1000;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp_ms: u64,
    pub level: String,
    pub target: String,
    pub message: String,
}

impl LogEntry {
    fn now(level: log::Level, target: &str, message: String) -> Self {
        Self {
            timestamp_ms: std::time::SystemTime::now()
                .duration_since(std::time::SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            level: level.to_string().to_lowercase(),
            target: target.to_string(),
            message,
        }
    }
}

struct LogRing {
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
    tx: broadcast::Sender<LogEntry>,
}

impl LogRing {
    fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            tx,
        }
    }

    fn push(&self, entry: LogEntry) {
        {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.push_back(entry.clone());
            while entries.len() > self.capacity {
                entries.pop_front();
            }
        }
        // No subscribers is fine.
        let _ = self.tx.send(entry);
    }

    fn snapshot(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

static LOG_RING: LazyLock<LogRing> = LazyLock::new(|| LogRing::new(MAX_LOG_ENTRIES));

struct RingLogger {
    inner: Logger,
}

impl Log for RingLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if !self.inner.matches(record) {
            return;
        }
        LOG_RING.push(LogEntry::now(
            record.level(),
            record.target(),
            record.args().to_string(),
        ));
        self.inner.log(record);
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Install the logger. Default filter is `warn`; `RUST_LOG` overrides it,
/// e.g. `RUST_LOG=leadboard.search=debug`.
pub fn init() -> Result<(), SetLoggerError> {
    let inner = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .build();
    let max_level = inner.filter();
    let logger = Box::leak(Box::new(RingLogger { inner }));
    log::set_logger(logger)?;
    log::set_max_level(max_level);
    Ok(())
}

pub fn recent_entries() -> Vec<LogEntry> {
    LOG_RING.snapshot()
}

pub fn subscribe() -> broadcast::Receiver<LogEntry> {
    LOG_RING.tx.subscribe()
}

/// Record a line without going through the `log` facade, for failures that
/// happen before (or instead of) logger installation.
pub fn write_fallback_line(message: &str) {
    eprintln!("[leadboard.log_bridge] {}", message);
    LOG_RING.push(LogEntry::now(
        log::Level::Error,
        "leadboard.log_bridge",
        message.to_string(),
    ));
}
