// Monitor Status Model

use serde::{Deserialize, Serialize};

/// Severity of a monitor status message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorStatus {
    /// Progress notice with no bearing on health
    #[default]
    Undefined,
    Ok,
    Warning,
    Error,
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorStatus::Undefined => write!(f, "UNDEFINED"),
            MonitorStatus::Ok => write!(f, "OK"),
            MonitorStatus::Warning => write!(f, "WARNING"),
            MonitorStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Human-readable message paired with a severity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorMessage {
    pub text: String,
    pub status: MonitorStatus,
}

impl MonitorMessage {
    pub fn new(text: impl Into<String>, status: MonitorStatus) -> Self {
        Self {
            text: text.into(),
            status,
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(text, MonitorStatus::Undefined)
    }

    pub fn ok(text: impl Into<String>) -> Self {
        Self::new(text, MonitorStatus::Ok)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(text, MonitorStatus::Warning)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(text, MonitorStatus::Error)
    }
}

/// Aggregate health shown by the shell
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Health {
    #[default]
    Green,
    Red,
}
