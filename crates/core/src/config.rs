// Agent Configuration
//
// Loaded by the daemon (file + environment) and handed to the monitors on
// every (re)start.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::domain::{DeviceIdentity, DomainError, PrintQueue, QueueTable};

pub const DEFAULT_PRINTER_POLLING_MS: u64 = 5_000;
pub const DEFAULT_ERROR_WAIT_MS: u64 = 10_000;
pub const DEFAULT_SCALE_READ_MS: u64 = 1_000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceHubConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub queues: Vec<PrintQueue>,
    #[serde(default)]
    pub scale: Option<ScaleConfig>,
    #[serde(default)]
    pub intervals: Intervals,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub url: String,
    /// `user` or `user@Company`
    pub login: String,
    #[serde(default)]
    pub password: String,
}

impl BackendConfig {
    /// Company (tenant) segment of the login, if any
    pub fn company(&self) -> Option<&str> {
        let (_, company) = self.login.rsplit_once('@')?;
        (!company.is_empty()).then_some(company)
    }

    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleConfig {
    /// Backend identifier of the scale record
    pub scale_id: String,
    pub vendor_id: u16,
    pub product_id: u16,
}

impl ScaleConfig {
    pub fn device(&self) -> DeviceIdentity {
        DeviceIdentity::new(self.vendor_id, self.product_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Intervals {
    pub printer_polling_ms: u64,
    pub error_wait_ms: u64,
    pub scale_read_ms: u64,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            printer_polling_ms: DEFAULT_PRINTER_POLLING_MS,
            error_wait_ms: DEFAULT_ERROR_WAIT_MS,
            scale_read_ms: DEFAULT_SCALE_READ_MS,
        }
    }
}

impl Intervals {
    pub fn printer_polling(&self) -> Duration {
        Duration::from_millis(self.printer_polling_ms)
    }

    pub fn error_wait(&self) -> Duration {
        Duration::from_millis(self.error_wait_ms)
    }

    pub fn scale_read(&self) -> Duration {
        Duration::from_millis(self.scale_read_ms)
    }
}

impl DeviceHubConfig {
    pub fn queue_table(&self) -> QueueTable {
        QueueTable::new(self.queues.iter().cloned())
    }

    /// Reject configurations the monitors cannot run with
    pub fn validate(&self) -> Result<(), DomainError> {
        let url = self.backend.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(DomainError::ValidationError(format!(
                "backend.url must be an http(s) address, got '{}'",
                self.backend.url
            )));
        }
        if self.backend.login.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "backend.login must not be empty".to_string(),
            ));
        }
        if self.backend.password.is_empty() {
            return Err(DomainError::ValidationError(
                "backend.password must not be empty".to_string(),
            ));
        }
        if self.queues.is_empty() && self.scale.is_none() {
            return Err(DomainError::ValidationError(
                "nothing to monitor: configure at least one print queue or a scale".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for queue in &self.queues {
            if queue.name.trim().is_empty() {
                return Err(DomainError::ValidationError(
                    "queue name must not be empty".to_string(),
                ));
            }
            if queue.printer_name.trim().is_empty() {
                return Err(DomainError::ValidationError(format!(
                    "queue '{}' has no printer",
                    queue.name
                )));
            }
            if !seen.insert(queue.name.as_str()) {
                return Err(DomainError::ValidationError(format!(
                    "queue '{}' is configured twice",
                    queue.name
                )));
            }
        }

        if let Some(scale) = &self.scale {
            if scale.scale_id.trim().is_empty() {
                return Err(DomainError::ValidationError(
                    "scale.scale_id must not be empty".to_string(),
                ));
            }
        }

        let intervals = [
            ("printer_polling_ms", self.intervals.printer_polling_ms),
            ("error_wait_ms", self.intervals.error_wait_ms),
            ("scale_read_ms", self.intervals.scale_read_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(DomainError::ValidationError(format!(
                    "intervals.{} must be positive",
                    name
                )));
            }
        }
        Ok(())
    }
}
