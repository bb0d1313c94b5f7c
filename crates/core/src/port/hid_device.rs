// HID Device Port
// Enumeration and report reads for USB HID scales

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::domain::DeviceIdentity;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Device not connected: {0}")]
    NotConnected(String),

    #[error("Device IO error: {0}")]
    Io(String),

    #[error("Enumeration failed: {0}")]
    Enumeration(String),
}

/// Outcome of a single report read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadStatus {
    Success,
    TimedOut,
    NoData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HidReport {
    pub report_id: u8,
    /// Payload without the report ID byte
    pub data: Vec<u8>,
    pub status: ReadStatus,
    pub timestamp: DateTime<Utc>,
}

impl HidReport {
    pub fn success(report_id: u8, data: Vec<u8>) -> Self {
        Self {
            report_id,
            data,
            status: ReadStatus::Success,
            timestamp: Utc::now(),
        }
    }

    pub fn empty(status: ReadStatus) -> Self {
        Self {
            report_id: 0,
            data: Vec::new(),
            status,
            timestamp: Utc::now(),
        }
    }
}

/// Attached HID device as seen by the enumerator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HidDeviceInfo {
    pub identity: DeviceIdentity,
    pub path: String,
    pub product: String,
    pub manufacturer: String,
    /// Device advertises the POS scale usage page
    pub is_scale: bool,
}

#[async_trait]
pub trait HidEnumerator: Send + Sync {
    /// All attached HID devices
    async fn enumerate(&self) -> Result<Vec<HidDeviceInfo>, DeviceError>;

    /// First attached device matching the identity, or `None` when absent
    async fn find(&self, identity: DeviceIdentity)
        -> Result<Option<Box<dyn HidDevice>>, DeviceError>;
}

/// An attached device handle; `close` must be called on every path
#[async_trait]
pub trait HidDevice: Send {
    async fn open(&mut self) -> Result<(), DeviceError>;

    fn is_connected(&self) -> bool;

    async fn read_report(&mut self, timeout: Duration) -> Result<HidReport, DeviceError>;

    async fn close(&mut self);
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// What the scale does on one polling cycle
    #[derive(Debug, Clone)]
    pub enum ScaleCycle {
        Absent,
        Report(HidReport),
        NeverConnects,
        ReadFails,
    }

    #[derive(Default)]
    struct State {
        script: VecDeque<ScaleCycle>,
        repeat_last: Option<ScaleCycle>,
        finds: usize,
        opens: usize,
        closes: usize,
    }

    /// Scripted scale; once the script is exhausted the last cycle repeats
    #[derive(Clone, Default)]
    pub struct MockScale {
        state: Arc<Mutex<State>>,
    }

    impl MockScale {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn script(cycles: impl IntoIterator<Item = ScaleCycle>) -> Self {
            let scale = Self::default();
            scale.state.lock().unwrap().script = cycles.into_iter().collect();
            scale
        }

        /// Scale data report with the given status and weight bytes
        pub fn reading(status: u8, unit: u8, exponent: i8, raw: u16) -> ScaleCycle {
            let [lsb, msb] = raw.to_le_bytes();
            ScaleCycle::Report(HidReport::success(
                0x03,
                vec![status, unit, exponent as u8, lsb, msb],
            ))
        }

        pub fn finds(&self) -> usize {
            self.state.lock().unwrap().finds
        }

        pub fn opens(&self) -> usize {
            self.state.lock().unwrap().opens
        }

        pub fn closes(&self) -> usize {
            self.state.lock().unwrap().closes
        }
    }

    #[async_trait]
    impl HidEnumerator for MockScale {
        async fn enumerate(&self) -> Result<Vec<HidDeviceInfo>, DeviceError> {
            Ok(vec![HidDeviceInfo {
                identity: DeviceIdentity::new(0x0922, 0x8003),
                path: "/dev/hidraw0".to_string(),
                product: "Mock Scale".to_string(),
                manufacturer: "Mock".to_string(),
                is_scale: true,
            }])
        }

        async fn find(
            &self,
            _identity: DeviceIdentity,
        ) -> Result<Option<Box<dyn HidDevice>>, DeviceError> {
            let mut state = self.state.lock().unwrap();
            state.finds += 1;
            let cycle = match state.script.pop_front() {
                Some(cycle) => {
                    state.repeat_last = Some(cycle.clone());
                    cycle
                }
                None => state.repeat_last.clone().unwrap_or(ScaleCycle::Absent),
            };
            if matches!(cycle, ScaleCycle::Absent) {
                return Ok(None);
            }
            Ok(Some(Box::new(MockDevice {
                cycle,
                open: false,
                state: self.state.clone(),
            })))
        }
    }

    struct MockDevice {
        cycle: ScaleCycle,
        open: bool,
        state: Arc<Mutex<State>>,
    }

    #[async_trait]
    impl HidDevice for MockDevice {
        async fn open(&mut self) -> Result<(), DeviceError> {
            self.state.lock().unwrap().opens += 1;
            self.open = !matches!(self.cycle, ScaleCycle::NeverConnects);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.open
        }

        async fn read_report(&mut self, _timeout: Duration) -> Result<HidReport, DeviceError> {
            match &self.cycle {
                ScaleCycle::Report(report) => Ok(report.clone()),
                ScaleCycle::ReadFails => Err(DeviceError::Io("broken pipe".to_string())),
                _ => Ok(HidReport::empty(ReadStatus::NoData)),
            }
        }

        async fn close(&mut self) {
            self.open = false;
            self.state.lock().unwrap().closes += 1;
        }
    }
}
