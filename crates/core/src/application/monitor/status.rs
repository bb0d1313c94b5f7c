// Monitor Status Reporting

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::MonitorMessage;

/// Status message tagged with the monitor that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorEvent {
    pub monitor: &'static str,
    pub message: MonitorMessage,
    pub at: DateTime<Utc>,
}

/// Per-monitor handle for emitting status messages.
///
/// Sends never block; messages are dropped once the receiver is gone.
#[derive(Clone, Debug)]
pub struct StatusReporter {
    monitor: &'static str,
    tx: mpsc::UnboundedSender<MonitorEvent>,
}

impl StatusReporter {
    pub fn new(monitor: &'static str, tx: mpsc::UnboundedSender<MonitorEvent>) -> Self {
        Self { monitor, tx }
    }

    /// Reporter plus the receiving end, for running a monitor standalone
    pub fn channel(monitor: &'static str) -> (Self, mpsc::UnboundedReceiver<MonitorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(monitor, tx), rx)
    }

    pub fn monitor(&self) -> &'static str {
        self.monitor
    }

    pub fn report(&self, message: MonitorMessage) {
        debug!(monitor = self.monitor, status = %message.status, "{}", message.text);
        let _ = self.tx.send(MonitorEvent {
            monitor: self.monitor,
            message,
            at: Utc::now(),
        });
    }

    pub fn info(&self, text: impl Into<String>) {
        self.report(MonitorMessage::info(text));
    }

    pub fn ok(&self, text: impl Into<String>) {
        self.report(MonitorMessage::ok(text));
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.report(MonitorMessage::warning(text));
    }

    pub fn error(&self, text: impl Into<String>) {
        self.report(MonitorMessage::error(text));
    }
}
