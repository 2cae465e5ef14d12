//! Logging setup and the in-app debug log

use std::collections::VecDeque;

use chrono::Local;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "glorp_core=info";

/// Install the global `tracing` subscriber. Later calls are no-ops.
pub fn init_logging(filter: Option<&str>) {
    let filter = filter
        .map(str::to_string)
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string());

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Most recent events, shown on the settings screen.
#[derive(Debug, Clone)]
pub struct DebugLog {
    entries: VecDeque<String>,
    capacity: usize,
}

impl DebugLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::debug!(target: "glorp_core::debug_log", "{message}");

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries
            .push_back(format!("[{}] {}", Local::now().format("%H:%M:%S"), message));
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for DebugLog {
    fn default() -> Self {
        Self::new(10)
    }
}
