//! Append-only destination for the human-readable progress lines of a run.

use std::sync::{Mutex, MutexGuard};

/// Receives progress and summary lines from the organizer.
///
/// Implementations are shared with worker threads when classification runs in
/// parallel, so they must be `Send + Sync`.
pub trait LogSink: Send + Sync {
    /// Appends one line.
    fn log(&self, message: &str);

    /// Called after each file is handled during a run. Ignored by default.
    fn progress(&self, _done: usize, _total: usize) {}
}

/// Keeps every line in memory, for previews and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<String>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// A copy of the transcript so far.
    pub fn lines(&self) -> Vec<String> {
        self.guard().clone()
    }

    pub fn clear(&self) {
        self.guard().clear();
    }

    /// Returns true if any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.guard().iter().any(|line| line.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn log(&self, message: &str) {
        self.guard().push(message.to_string());
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _message: &str) {}
}
