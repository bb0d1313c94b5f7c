// Scale Monitor
//
// Poll the configured USB scale once per read interval and push the stable
// weight to the backend whenever it changes.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::application::monitor::constants::{
    CONNECTION_RETRY_INTERVAL, CONNECTION_RETRY_LIMIT, REPORT_READ_TIMEOUT,
};
use crate::application::monitor::{Monitor, ShutdownToken, StatusReporter};
use crate::application::screens;
use crate::config::{DeviceHubConfig, ScaleConfig};
use crate::domain::ScaleReading;
use crate::error::Result;
use crate::port::{
    DeviceError, HidDevice, HidEnumerator, ReadStatus, RemoteSession, SessionConnector,
};

pub const SCALE_MONITOR_NAME: &str = "scale";

pub struct ScaleMonitor {
    scale: Option<ScaleConfig>,
    read_interval: Duration,
    error_wait: Duration,
    connector: Arc<dyn SessionConnector>,
    devices: Arc<dyn HidEnumerator>,
    session: Option<Box<dyn RemoteSession>>,
    last_acknowledged: Option<Decimal>,
}

impl ScaleMonitor {
    pub fn new(
        config: &DeviceHubConfig,
        connector: Arc<dyn SessionConnector>,
        devices: Arc<dyn HidEnumerator>,
    ) -> Self {
        Self {
            scale: config.scale.clone(),
            read_interval: config.intervals.scale_read(),
            error_wait: config.intervals.error_wait(),
            connector,
            devices,
            session: None,
            last_acknowledged: None,
        }
    }

    /// One polling cycle: read the device, forward a changed stable weight
    async fn cycle(&mut self, scale: &ScaleConfig, status: &StatusReporter) -> Result<()> {
        let Some(mut device) = self.devices.find(scale.device()).await? else {
            debug!(device = %scale.device(), "Scale not attached");
            return Ok(());
        };
        let reading = read_weight(device.as_mut()).await;
        device.close().await;

        let Some(reading) = reading? else {
            return Ok(());
        };
        status.info(format!("Scale weight: {}", reading));

        if self.last_acknowledged == Some(reading.weight) {
            return Ok(());
        }

        let session = match self.session.take() {
            Some(session) => session,
            None => {
                status.info(format!("Logging in to {}", self.connector.endpoint()));
                self.connector.login().await?
            }
        };
        let sent = session
            .submit(
                screens::SCALES_SCREEN,
                &screens::update_weight_commands(&scale.scale_id, reading.weight),
            )
            .await;
        self.session = Some(session);
        sent?;

        info!(scale = %scale.scale_id, weight = %reading.weight, "Scale weight sent");
        status.ok(format!(
            "Weight {} sent for scale {}",
            reading, scale.scale_id
        ));
        self.last_acknowledged = Some(reading.weight);
        Ok(())
    }

    async fn logout(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.logout().await {
                debug!(error = %e, "Logout failed");
            }
        }
    }
}

/// Open, wait for connection and read one report.
///
/// The caller closes the device on every path.
pub async fn read_weight(device: &mut dyn HidDevice) -> Result<Option<ScaleReading>> {
    device.open().await?;

    let mut retries = 0;
    while !device.is_connected() {
        if retries == CONNECTION_RETRY_LIMIT {
            return Err(DeviceError::NotConnected(
                "scale did not connect after opening".to_string(),
            )
            .into());
        }
        tokio::time::sleep(CONNECTION_RETRY_INTERVAL).await;
        retries += 1;
    }

    let report = device.read_report(REPORT_READ_TIMEOUT).await?;
    if report.status != ReadStatus::Success {
        debug!(status = ?report.status, "No scale data");
        return Ok(None);
    }
    Ok(ScaleReading::decode(report.report_id, &report.data)?)
}

#[async_trait]
impl Monitor for ScaleMonitor {
    fn name(&self) -> &'static str {
        SCALE_MONITOR_NAME
    }

    async fn run(
        mut self: Box<Self>,
        status: StatusReporter,
        mut shutdown: ShutdownToken,
    ) -> Result<()> {
        let Some(scale) = self.scale.clone() else {
            status.warning("No scale is configured; weight monitoring is disabled");
            return Ok(());
        };
        info!(scale = %scale.scale_id, device = %scale.device(), "Scale monitor started");

        loop {
            if shutdown.is_shutdown() {
                break;
            }
            let wait = match self.cycle(&scale, &status).await {
                Ok(()) => self.read_interval,
                Err(e) => {
                    warn!(error = %e, "Scale cycle failed");
                    status.error(format!("Scale weight error: {}", e));
                    self.logout().await;
                    self.error_wait
                }
            };
            if shutdown.sleep(wait).await {
                break;
            }
        }

        self.logout().await;
        info!("Scale monitor stopped");
        Ok(())
    }
}
