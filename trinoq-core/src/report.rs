//! Status reporting for cache activity
//!
//! The cache decides what to say and when; a [`ReportSink`] decides where it
//! goes. Sinks must drop messages when `quiet` is set.

use std::io::Write;
use std::sync::Mutex;

/// Receiver of user-facing status messages
pub trait ReportSink: Send + Sync {
    /// Forward `message` for display unless `quiet` is set
    fn notify(&self, message: &str, quiet: bool);
}

/// Prints status messages to standard output
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl ReportSink for StdoutSink {
    fn notify(&self, message: &str, quiet: bool) {
        if quiet {
            return;
        }

        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        // A closed stdout is not worth failing the query over
        let _ = writeln!(handle, "{}", message);
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn notify(&self, _message: &str, _quiet: bool) {}
}

/// Keeps delivered messages in memory, mainly for tests and embedding
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far, oldest first
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

impl ReportSink for MemorySink {
    fn notify(&self, message: &str, quiet: bool) {
        if quiet {
            return;
        }

        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
    }
}

impl<S: ReportSink + ?Sized> ReportSink for std::sync::Arc<S> {
    fn notify(&self, message: &str, quiet: bool) {
        (**self).notify(message, quiet)
    }
}
